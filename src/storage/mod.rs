//! File system storage operations
//!
//! This module handles all file I/O operations including:
//! - CSV table reading/writing
//! - The file-existence extraction cache

mod cache;
mod csv_file;

pub use cache::{CacheGate, CacheKey, CacheNaming};
pub use csv_file::{CsvTableReader, CsvTableWriter, read_table, write_table};
