//! Direct CSV file extraction; never cached

use super::ExtractionRequest;
use crate::Table;
use crate::etl::Extractor;
use crate::storage::CsvTableReader;

use eyre::{Result, eyre};

/// Reads the request's `file_path` as a CSV table
pub struct FileExtractor<'a> {
    request: &'a ExtractionRequest,
}

impl<'a> FileExtractor<'a> {
    pub fn new(request: &'a ExtractionRequest) -> Self {
        Self { request }
    }
}

impl Extractor for FileExtractor<'_> {
    async fn extract(&self) -> Result<Table> {
        let path = self
            .request
            .file_path()
            .ok_or_else(|| eyre!("The CSV source needs a file path to read from"))?;
        log::debug!("Reading {}", path.display());
        CsvTableReader::new(path).read()
    }
}
