use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Scheduler tick interval in seconds.
    pub poll_interval_secs: u64,
    pub openai_api_key: String,
    pub tavily_api_key: String,
    pub asset_store_url: String,
    pub asset_store_public_url: String,
    pub asset_store_token: String,
    pub rest_blog: Option<RestBlogConfig>,
    pub oauth_blog: Option<OauthBlogConfig>,
}

#[derive(Debug, Clone)]
pub struct RestBlogConfig {
    pub base_url: String,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct OauthBlogConfig {
    pub token_url: String,
    pub api_base_url: String,
    pub blog_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let asset_store_url =
            env::var("ASSET_STORE_URL").context("ASSET_STORE_URL must be set")?;

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            poll_interval_secs: env::var("POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("POLL_INTERVAL_SECS must be a valid number")?,
            openai_api_key: env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?,
            tavily_api_key: env::var("TAVILY_API_KEY").context("TAVILY_API_KEY must be set")?,
            asset_store_public_url: env::var("ASSET_STORE_PUBLIC_URL")
                .unwrap_or_else(|_| asset_store_url.clone()),
            asset_store_token: env::var("ASSET_STORE_TOKEN")
                .context("ASSET_STORE_TOKEN must be set")?,
            asset_store_url,
            rest_blog: Self::rest_blog_from_env()?,
            oauth_blog: Self::oauth_blog_from_env()?,
        })
    }

    /// REST platform credentials are optional as a pair: either both
    /// variables are set or the platform is unconfigured.
    fn rest_blog_from_env() -> Result<Option<RestBlogConfig>> {
        match (env::var("REST_BLOG_URL"), env::var("REST_BLOG_TOKEN")) {
            (Ok(base_url), Ok(token)) => Ok(Some(RestBlogConfig { base_url, token })),
            (Err(_), Err(_)) => Ok(None),
            _ => anyhow::bail!("REST_BLOG_URL and REST_BLOG_TOKEN must be set together"),
        }
    }

    fn oauth_blog_from_env() -> Result<Option<OauthBlogConfig>> {
        let vars = [
            "OAUTH_BLOG_TOKEN_URL",
            "OAUTH_BLOG_API_URL",
            "OAUTH_BLOG_ID",
            "OAUTH_BLOG_CLIENT_ID",
            "OAUTH_BLOG_CLIENT_SECRET",
            "OAUTH_BLOG_REFRESH_TOKEN",
        ];
        let set = vars.iter().filter(|v| env::var(v).is_ok()).count();
        if set == 0 {
            return Ok(None);
        }
        if set != vars.len() {
            anyhow::bail!("all OAUTH_BLOG_* variables must be set together");
        }
        Ok(Some(OauthBlogConfig {
            token_url: env::var("OAUTH_BLOG_TOKEN_URL")?,
            api_base_url: env::var("OAUTH_BLOG_API_URL")?,
            blog_id: env::var("OAUTH_BLOG_ID")?,
            client_id: env::var("OAUTH_BLOG_CLIENT_ID")?,
            client_secret: env::var("OAUTH_BLOG_CLIENT_SECRET")?,
            refresh_token: env::var("OAUTH_BLOG_REFRESH_TOKEN")?,
        }))
    }
}
