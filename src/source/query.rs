//! Warehouse and database extraction through a SQL connection

use super::{ExtractionRequest, SourceKind};
use crate::Table;
use crate::etl::Extractor;
use crate::storage::CacheGate;

use eyre::{Context, Result};
use std::future::Future;

/// Executes SQL and returns the result set as a table.
///
/// Connections are opened and owned by the caller; extractors only borrow them.
pub trait SqlConnection: Send + Sync {
    fn query(&self, sql: &str) -> impl Future<Output = Result<Table>> + Send;
}

/// Cache-gated extractor running one query against a warehouse or database
pub struct QueryExtractor<'a, C> {
    kind: SourceKind,
    request: &'a ExtractionRequest,
    conn: &'a C,
    cache: &'a CacheGate,
    sql: String,
}

impl<'a, C: SqlConnection> QueryExtractor<'a, C> {
    /// Render `template` for `request` and bind it to `conn`
    pub fn new(
        kind: SourceKind,
        request: &'a ExtractionRequest,
        conn: &'a C,
        cache: &'a CacheGate,
        template: &str,
    ) -> Self {
        Self {
            kind,
            request,
            conn,
            cache,
            sql: request.render(template),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

impl<C: SqlConnection> Extractor for QueryExtractor<'_, C> {
    async fn extract(&self) -> Result<Table> {
        let key = self.request.cache_key();
        self.cache
            .get_or_fetch(&key, || async {
                log::debug!("Running {} query: {}", self.kind, self.sql);
                self.conn
                    .query(&self.sql)
                    .await
                    .with_context(|| format!("{} query for {} failed", self.kind, self.request.entity()))
            })
            .await
    }
}
