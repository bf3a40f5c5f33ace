//! Extraction sources and dispatch
//!
//! A request names one of four fixed [`SourceKind`]s; [`Sources::extract`]
//! runs exactly the strategy for that kind:
//! - `AWS`: warehouse query, cache-gated
//! - `DB`: database query, cache-gated
//! - `API`: HTTP fetch with retries, cache-gated
//! - `CSV`: direct file read, never cached

mod api;
mod file;
mod query;
mod sql;

pub use api::{ApiEndpoint, ApiExtractor};
pub use file::FileExtractor;
pub use query::{QueryExtractor, SqlConnection};
pub use sql::SqlxConnection;

use crate::Table;
use crate::client::{Sleeper, TokioSleeper};
use crate::etl::Extractor;
use crate::storage::{CacheGate, CacheKey};

use chrono::NaiveDate;
use clap::ValueEnum;
use eyre::{Result, eyre};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default SQL template for warehouse and database sources
pub const DEFAULT_QUERY: &str = "select * from {entity} where as_of_date = '{date}'";

/// The four extraction channels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum)]
pub enum SourceKind {
    /// Cloud data warehouse
    Aws,
    /// Generic relational database, reached through the request's DSN
    Db,
    /// HTTP API
    Api,
    /// Local CSV file
    Csv,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aws => write!(f, "AWS"),
            Self::Db => write!(f, "DB"),
            Self::Api => write!(f, "API"),
            Self::Csv => write!(f, "CSV"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "AWS" => Ok(Self::Aws),
            "DB" => Ok(Self::Db),
            "API" => Ok(Self::Api),
            "CSV" => Ok(Self::Csv),
            other => Err(eyre!(
                "Unknown source '{}', expected one of AWS, DB, API, CSV",
                other
            )),
        }
    }
}

/// What to extract and where to put it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractionRequest {
    source: SourceKind,
    entity: String,
    date: NaiveDate,
    dsn: Option<String>,
    file_name: Option<String>,
    file_path: Option<PathBuf>,
}

impl ExtractionRequest {
    pub fn new(source: SourceKind, entity: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            source,
            entity: entity.into(),
            date,
            dsn: None,
            file_name: None,
            file_path: None,
        }
    }

    /// Connection string for the `DB` source
    pub fn with_dsn(mut self, dsn: impl Into<String>) -> Self {
        self.dsn = Some(dsn.into());
        self
    }

    /// Base name of the cache file (without `.csv`)
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Cache directory, or the file to read for the `CSV` source
    pub fn with_file_path(mut self, file_path: impl AsRef<Path>) -> Self {
        self.file_path = Some(file_path.as_ref().to_path_buf());
        self
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn dsn(&self) -> Option<&str> {
        self.dsn.as_deref()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Cache key for this request.
    ///
    /// Falls back to the entity name and the current directory.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(
            self.file_path.as_deref().unwrap_or(Path::new(".")),
            self.file_name.as_deref().unwrap_or(&self.entity),
        )
    }

    /// Fill `{entity}` and `{date}` (as `YYYY-MM-DD`) into a template
    pub fn render(&self, template: &str) -> String {
        self.render_with(template, str::to_string)
    }

    /// Like [`render`](Self::render), passing each value through `escape` first
    pub fn render_with(&self, template: &str, escape: impl Fn(&str) -> String) -> String {
        template
            .replace("{entity}", &escape(&self.entity))
            .replace("{date}", &escape(&self.date.format("%Y-%m-%d").to_string()))
    }
}

impl std::fmt::Display for ExtractionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} on {} through {}", self.entity, self.date, self.source)
    }
}

/// Collaborators available to a run: connections, API endpoint and cache.
///
/// The caller opens and owns the connections; a source whose collaborator is
/// missing fails when requested.
pub struct Sources<C, S = TokioSleeper> {
    warehouse: Option<C>,
    database: Option<C>,
    api: Option<ApiEndpoint<S>>,
    query: String,
    cache: CacheGate,
}

impl<C, S> Sources<C, S>
where
    C: SqlConnection,
    S: Sleeper,
{
    pub fn new(cache: CacheGate) -> Self {
        Self {
            warehouse: None,
            database: None,
            api: None,
            query: DEFAULT_QUERY.to_string(),
            cache,
        }
    }

    pub fn with_warehouse(mut self, conn: C) -> Self {
        self.warehouse = Some(conn);
        self
    }

    pub fn with_database(mut self, conn: C) -> Self {
        self.database = Some(conn);
        self
    }

    pub fn with_api(mut self, endpoint: ApiEndpoint<S>) -> Self {
        self.api = Some(endpoint);
        self
    }

    /// SQL template used by the `AWS` and `DB` sources
    pub fn with_query(mut self, template: impl Into<String>) -> Self {
        self.query = template.into();
        self
    }

    /// Run the strategy matching the request's source kind.
    ///
    /// Failures are logged with the entity, date and source, then returned as-is.
    pub async fn extract(&self, request: &ExtractionRequest) -> Result<Table> {
        log::info!(
            "Extracting data through {} for {} on {}",
            request.source(),
            request.entity(),
            request.date()
        );

        let result = match request.source() {
            kind @ (SourceKind::Aws | SourceKind::Db) => {
                let conn = match kind {
                    SourceKind::Aws => self.warehouse.as_ref(),
                    _ => self.database.as_ref(),
                };
                match conn {
                    Some(conn) => {
                        QueryExtractor::new(kind, request, conn, &self.cache, &self.query)
                            .extract()
                            .await
                    }
                    None => Err(eyre!("No {} connection configured", kind)),
                }
            }
            SourceKind::Api => match &self.api {
                Some(endpoint) => ApiExtractor::new(request, endpoint, &self.cache).extract().await,
                None => Err(eyre!("No API endpoint configured")),
            },
            SourceKind::Csv => FileExtractor::new(request).extract().await,
        };

        match &result {
            Ok(table) => log::info!(
                "Extracted {} row(s) x {} column(s) of {}",
                table.len(),
                table.width(),
                request
            ),
            Err(e) => log::error!(
                "Having trouble extracting {} data on {} through {}: {:#}",
                request.entity(),
                request.date(),
                request.source(),
                e
            ),
        }
        result
    }
}
