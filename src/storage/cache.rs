//! File-existence cache in front of expensive extractions
//!
//! A cache entry is a CSV file. If it exists at the lookup path it is
//! returned as-is, with no TTL, checksum or staleness check.

use super::{CsvTableReader, CsvTableWriter};
use crate::Table;
use crate::etl::Loader;

use chrono::NaiveDate;
use clap::ValueEnum;
use eyre::{Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Directory and base file name identifying a cache entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheKey {
    dir: PathBuf,
    name: String,
}

impl CacheKey {
    pub fn new(dir: impl AsRef<Path>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            name: name.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `<dir>/<name>.csv`, the only path checked for a hit
    pub fn lookup_path(&self) -> PathBuf {
        self.dir.join(format!("{}.csv", self.name))
    }
}

/// Where a freshly fetched table is written.
///
/// `Dated` writes `<dir>/<YYYY-MM-DD>_<name>.csv`, which is never the lookup
/// path, so a fetched entry is only hit once someone renames or pre-seeds
/// `<name>.csv`. `Plain` writes to the lookup path itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum CacheNaming {
    #[default]
    Dated,
    Plain,
}

impl FromStr for CacheNaming {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "dated" => Ok(Self::Dated),
            "plain" => Ok(Self::Plain),
            other => eyre::bail!("Unknown cache naming '{}', expected 'dated' or 'plain'", other),
        }
    }
}

/// Decides between returning a persisted table and invoking a producer
#[derive(Clone, Debug)]
pub struct CacheGate {
    naming: CacheNaming,
    stamp: NaiveDate,
}

impl Default for CacheGate {
    fn default() -> Self {
        Self::new(CacheNaming::default())
    }
}

impl CacheGate {
    /// Create a gate stamping dated writes with today's local date
    pub fn new(naming: CacheNaming) -> Self {
        Self {
            naming,
            stamp: chrono::Local::now().date_naive(),
        }
    }

    /// Override the date used for `Dated` write paths
    pub fn with_stamp(mut self, stamp: NaiveDate) -> Self {
        self.stamp = stamp;
        self
    }

    /// Path a freshly produced table for `key` is written to
    pub fn write_path(&self, key: &CacheKey) -> PathBuf {
        match self.naming {
            CacheNaming::Dated => key.dir.join(format!(
                "{}_{}.csv",
                self.stamp.format("%Y-%m-%d"),
                key.name
            )),
            CacheNaming::Plain => key.lookup_path(),
        }
    }

    /// Return the cached table for `key`, or run `producer` and persist its result.
    ///
    /// The producer is not invoked on a hit. On a miss it is invoked exactly
    /// once; if it fails nothing is written and the error is returned.
    ///
    /// # Errors
    /// - The cached file exists but cannot be parsed (no fallback to the producer)
    /// - The producer fails
    /// - The produced table cannot be written
    pub async fn get_or_fetch<F, Fut>(&self, key: &CacheKey, producer: F) -> Result<Table>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Table>>,
    {
        let lookup = key.lookup_path();
        if lookup.is_file() {
            log::debug!("Cache hit: {}", lookup.display());
            return CsvTableReader::new(&lookup)
                .read()
                .with_context(|| format!("Failed to read cached table {}", lookup.display()));
        }

        log::debug!("Cache miss: {}", lookup.display());
        let table = producer().await?;

        let output = self.write_path(key);
        let count = CsvTableWriter::new(&output).load(&table).await?;
        log::info!("Cached {} row(s) to {}", count, output.display());

        Ok(table)
    }
}
