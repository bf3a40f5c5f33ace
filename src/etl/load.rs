//! Loader trait for persisting a table to a destination

use crate::Table;
use eyre::Result;

/// Loader trait for writing a table to a destination
///
/// # Example
/// ```no_run
/// use entity_extractor::etl::Loader;
/// use entity_extractor::Table;
/// use eyre::Result;
///
/// struct CountingLoader;
///
/// impl Loader for CountingLoader {
///     async fn load(&self, table: &Table) -> Result<usize> {
///         Ok(table.len())
///     }
/// }
/// ```
pub trait Loader: Send + Sync {
    /// Load the table to the destination
    ///
    /// Returns the number of rows written
    ///
    /// # Errors
    /// Returns an error if writing fails (I/O, serialization, etc.)
    fn load(&self, table: &Table) -> impl std::future::Future<Output = Result<usize>> + Send;
}
