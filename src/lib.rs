//! Entity Extractor
//!
//! Pull a named entity for a given date out of a warehouse, a database, an
//! HTTP API or a CSV file into a uniform [`Table`], with a file cache in front
//! of the expensive sources and bounded retries for the API.

pub mod cli;
pub mod client;
pub mod error;
pub mod etl;
pub mod source;
pub mod storage;
mod table;

// Re-exports for convenience
pub use client::{Auth, FetchOptions, HttpFetcher, RetryPolicy, Sleeper, TokioSleeper};
pub use error::FetchError;
pub use etl::{Extractor, Loader};
pub use source::{ExtractionRequest, SourceKind, Sources, SqlConnection, SqlxConnection};
pub use storage::{CacheGate, CacheKey, CacheNaming, CsvTableReader, CsvTableWriter};
pub use table::Table;
