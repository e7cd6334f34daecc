//! Application wiring and router setup.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use composer::clients::publishers::{select, PublisherAccounts, RestAccount};
use composer::clients::publishers::OauthAccount;
use composer::clients::{HttpAssetStore, OpenAiImage, OpenAiText, TavilySearch};
use composer::limiter::RetryExecutor;
use composer::pipeline::{ComposeDeps, ContentPipeline};
use composer::{ComposeConfig, ImageStrategy, RenderMode};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::kernel::jobs::{
    JobStore, JobTargetType, PostgresJobStore, ProcessorRegistry, Scheduler, SchedulerConfig,
    StoreLogSink,
};
use crate::processors::{BlogPostProcessor, TopicDiscoveryProcessor};
use crate::server::routes::{
    create_job, delete_job, delete_jobs, get_job, get_job_logs, health_handler, list_jobs,
    patch_job, retry_failed_jobs, retry_job,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub store: Arc<dyn JobStore>,
    pub scheduler: Arc<Scheduler>,
}

/// Build the store, pipelines, processor registry, and scheduler from
/// configuration. Pipelines are created once per configured platform;
/// the admission gates are process-lifetime singletons shared by all of
/// them.
pub fn build_state(config: &Config, pool: PgPool) -> Result<AppState> {
    let store: Arc<dyn JobStore> = Arc::new(PostgresJobStore::new(pool.clone()));

    let text = Arc::new(OpenAiText::new(config.openai_api_key.clone()));
    let image = Arc::new(OpenAiImage::new(config.openai_api_key.clone()));
    let search = Arc::new(TavilySearch::new(config.tavily_api_key.clone()));
    let assets = Arc::new(HttpAssetStore::new(
        config.asset_store_url.clone(),
        config.asset_store_public_url.clone(),
        config.asset_store_token.clone(),
    ));
    let logs = Arc::new(StoreLogSink::new(store.clone()));

    let gen_gate = Arc::new(RetryExecutor::new("generation", 3, Duration::from_millis(1000)));
    let search_gate = Arc::new(RetryExecutor::new("search", 3, Duration::from_millis(500)));

    let deps_for = |publisher| ComposeDeps {
        text: text.clone(),
        image: image.clone(),
        search: search.clone(),
        assets: assets.clone(),
        publisher,
        logs: logs.clone(),
        gen_gate: gen_gate.clone(),
        search_gate: search_gate.clone(),
    };

    let mut registry = ProcessorRegistry::new();

    if let Some(rest) = &config.rest_blog {
        let publisher = select(PublisherAccounts {
            rest: Some(RestAccount::new(rest.base_url.clone(), rest.token.clone())),
            ..Default::default()
        })?;
        let pipeline =
            ContentPipeline::new(deps_for(publisher), blog_config(RenderMode::GenericTags));
        registry.register(
            JobTargetType::RestBlog,
            Arc::new(BlogPostProcessor::new(pipeline)),
        );
    }

    if let Some(oauth) = &config.oauth_blog {
        let publisher = select(PublisherAccounts {
            oauth: Some(OauthAccount {
                token_url: oauth.token_url.clone(),
                api_base_url: oauth.api_base_url.clone(),
                blog_id: oauth.blog_id.clone(),
                client_id: oauth.client_id.clone(),
                client_secret: oauth.client_secret.clone().into(),
                refresh_token: oauth.refresh_token.clone().into(),
            }),
            ..Default::default()
        })?;
        let pipeline =
            ContentPipeline::new(deps_for(publisher), blog_config(RenderMode::GenericTags));
        registry.register(
            JobTargetType::OauthBlog,
            Arc::new(BlogPostProcessor::new(pipeline)),
        );
    }

    registry.register(
        JobTargetType::TopicDiscovery,
        Arc::new(TopicDiscoveryProcessor::new(text, gen_gate, store.clone())),
    );

    let scheduler = Arc::new(Scheduler::with_config(
        store.clone(),
        Arc::new(registry),
        SchedulerConfig {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        },
    ));

    Ok(AppState {
        db_pool: pool,
        store,
        scheduler,
    })
}

fn blog_config(render_mode: RenderMode) -> ComposeConfig {
    ComposeConfig::default()
        .with_image_strategy(ImageStrategy::Generate)
        .with_render_mode(render_mode)
}

/// Build the operator API router.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/jobs", post(create_job).get(list_jobs))
        .route("/jobs/delete", post(delete_jobs))
        .route("/jobs/retry-failed", post(retry_failed_jobs))
        .route(
            "/jobs/:id",
            get(get_job).patch(patch_job).delete(delete_job),
        )
        .route("/jobs/:id/retry", post(retry_job))
        .route("/jobs/:id/logs", get(get_job_logs))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
