// Main entry point for the Pressline API server.

use anyhow::{Context, Result};
use server_core::server::{build_app, build_state};
use server_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,composer=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Pressline content automation server");

    let config = Config::from_env().context("Failed to load configuration")?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let state = build_state(&config, pool)?;

    // The scheduler owns the tick loop for the process lifetime.
    let scheduler = state.scheduler.clone();
    tokio::spawn(async move {
        if let Err(e) = scheduler.run_until_shutdown().await {
            tracing::error!(error = %e, "scheduler exited with error");
        }
    });

    let app = build_app(state);
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
