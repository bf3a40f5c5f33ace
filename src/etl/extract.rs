//! Extractor trait for pulling a table out of a source

use crate::Table;
use eyre::Result;

/// Extractor trait for extracting a table from a source
///
/// Implementors define how to pull data from sources like:
/// - Data warehouses and relational databases
/// - HTTP APIs
/// - Local CSV files
///
/// # Example
/// ```no_run
/// use entity_extractor::etl::Extractor;
/// use entity_extractor::Table;
/// use eyre::Result;
///
/// struct StaticExtractor;
///
/// impl Extractor for StaticExtractor {
///     async fn extract(&self) -> Result<Table> {
///         let mut table = Table::new(["desk", "pnl"]);
///         table.push_row(["rates", "12.5"])?;
///         Ok(table)
///     }
/// }
/// ```
pub trait Extractor: Send + Sync {
    /// Extract a table from the source
    ///
    /// # Errors
    /// Returns an error if extraction fails (network, I/O, parsing, query, etc.)
    fn extract(&self) -> impl std::future::Future<Output = Result<Table>> + Send;
}
