//! CLI helper functions

use crate::{
    Table,
    client::{Auth, FetchOptions, HttpFetcher, RetryPolicy},
    source::{ApiEndpoint, DEFAULT_QUERY, ExtractionRequest, SourceKind, Sources, SqlxConnection},
    storage::{CacheGate, CacheNaming},
};
use eyre::{Context, Result, eyre};
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

/// Run configuration read from the environment
#[derive(Clone, Debug)]
pub struct Settings {
    /// API endpoint template, `{entity}` and `{date}` are substituted
    pub api_url: Option<String>,
    pub auth: Auth,
    pub fetch: FetchOptions,
    /// SQL template for the warehouse and database sources
    pub query: String,
    pub warehouse_dsn: Option<String>,
    pub cache_naming: CacheNaming,
}

/// Load settings from environment variables
///
/// Expected environment variables (all optional):
/// - EXTRACT_API_URL: API endpoint template, required for the API source
/// - EXTRACT_API_APIKEY: API key for auth (takes precedence over username/password)
/// - EXTRACT_API_USERNAME / EXTRACT_API_PASSWORD: Basic auth
/// - EXTRACT_API_DATA_FIELD: top-level field holding the records (default `data`)
/// - EXTRACT_VERIFY_TLS: verify API certificates (default `false`)
/// - EXTRACT_MAX_RETRIES: retries after the first attempt (default 5)
/// - EXTRACT_RETRY_DELAY: seconds between attempts (default 60)
/// - EXTRACT_QUERY: SQL template for the AWS and DB sources
/// - EXTRACT_WAREHOUSE_DSN: warehouse connection string, required for the AWS source
/// - EXTRACT_CACHE_NAMING: `dated` (default) or `plain`
pub fn load_settings() -> Result<Settings> {
    let auth = Auth::new(
        env_var("EXTRACT_API_USERNAME"),
        env_var("EXTRACT_API_PASSWORD"),
        env_var("EXTRACT_API_APIKEY"),
    );

    let retry = RetryPolicy::new(
        parse_env("EXTRACT_MAX_RETRIES", 5)?,
        Duration::from_secs(parse_env("EXTRACT_RETRY_DELAY", 60)?),
    );

    let fetch = FetchOptions {
        verify_tls: parse_env("EXTRACT_VERIFY_TLS", false)?,
        retry,
        data_field: env_var("EXTRACT_API_DATA_FIELD").unwrap_or_else(|| "data".to_string()),
        ..FetchOptions::default()
    };

    Ok(Settings {
        api_url: env_var("EXTRACT_API_URL"),
        auth,
        fetch,
        query: env_var("EXTRACT_QUERY").unwrap_or_else(|| DEFAULT_QUERY.to_string()),
        warehouse_dsn: env_var("EXTRACT_WAREHOUSE_DSN"),
        cache_naming: parse_env("EXTRACT_CACHE_NAMING", CacheNaming::default())?,
    })
}

/// Open the collaborators the request's source needs, then extract
pub async fn run_extraction(request: &ExtractionRequest, settings: &Settings) -> Result<Table> {
    let cache = CacheGate::new(settings.cache_naming);
    let mut sources: Sources<SqlxConnection> = Sources::new(cache).with_query(&settings.query);

    match request.source() {
        SourceKind::Aws => {
            let dsn = settings
                .warehouse_dsn
                .as_deref()
                .ok_or_else(|| eyre!("EXTRACT_WAREHOUSE_DSN environment variable not set"))?;
            log::info!("Connecting to the warehouse...");
            let conn = SqlxConnection::connect(dsn)
                .await
                .with_context(|| format!("Cannot reach the warehouse for {}", request))?;
            sources = sources.with_warehouse(conn);
        }
        SourceKind::Db => {
            let dsn = request
                .dsn()
                .ok_or_else(|| eyre!("The DB source needs a connection string (--dsn)"))?;
            log::info!("Connecting to the database...");
            let conn = SqlxConnection::connect(dsn)
                .await
                .with_context(|| format!("Cannot reach the database for {}", request))?;
            sources = sources.with_database(conn);
        }
        SourceKind::Api => {
            let template = settings
                .api_url
                .as_deref()
                .ok_or_else(|| eyre!("EXTRACT_API_URL environment variable not set"))?;
            log::debug!("Using {} auth for API requests", settings.auth);
            let fetcher = HttpFetcher::try_new(&settings.auth, settings.fetch.clone())?;
            sources = sources.with_api(ApiEndpoint::new(fetcher, template));
        }
        SourceKind::Csv => {}
    }

    sources.extract(request).await
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env_var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| eyre!("Invalid {} '{}': {}", name, raw, e)),
        None => Ok(default),
    }
}
