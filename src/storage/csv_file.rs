//! CSV table file operations
//!
//! Tables are written with a header row whose first field is empty, followed
//! by a synthetic `0..n` row index column. When reading, a leading column with
//! an empty header is treated as that index and dropped.

use crate::Table;
use crate::etl::{Extractor, Loader};

use eyre::{Context, Result};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Read a table from a CSV file
pub struct CsvTableReader {
    path: PathBuf,
}

impl CsvTableReader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read the whole file into a table
    pub fn read(&self) -> Result<Table> {
        let file = std::fs::File::open(&self.path)
            .with_context(|| format!("Failed to open CSV file: {}", self.path.display()))?;

        read_table(file)
            .with_context(|| format!("Failed to parse CSV file: {}", self.path.display()))
    }
}

impl Extractor for CsvTableReader {
    async fn extract(&self) -> Result<Table> {
        self.read()
    }
}

/// Parse CSV content into a table, dropping an unnamed leading index column
pub fn read_table<R: Read>(input: R) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(input);

    let headers = reader.headers()?.clone();
    let skip = usize::from(headers.get(0) == Some(""));

    let mut table = Table::new(headers.iter().skip(skip));
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Invalid record at row {}", line + 1))?;
        table.push_row(record.iter().skip(skip))?;
    }

    log::trace!("Parsed {} row(s) x {} column(s)", table.len(), table.width());
    Ok(table)
}

/// Write a table to a CSV file
pub struct CsvTableWriter {
    path: PathBuf,
}

impl CsvTableWriter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Write the table, with index column, creating parent directories as needed
    ///
    /// The table goes to a sibling `.tmp` file first and is renamed into place,
    /// so a failed write never leaves a partial file at the target path.
    pub fn write(&self, table: &Table) -> Result<()> {
        self.replace_with(|file| write_table(table, file, true))
    }

    fn replace_with<F>(&self, fill: F) -> Result<()>
    where
        F: FnOnce(&mut std::fs::File) -> Result<()>,
    {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);

        let result = std::fs::File::create(&tmp_path)
            .with_context(|| format!("Failed to create CSV file: {}", tmp_path.display()))
            .and_then(|mut file| {
                fill(&mut file)
                    .with_context(|| format!("Failed to write CSV file: {}", self.path.display()))
            })
            .and_then(|()| {
                std::fs::rename(&tmp_path, &self.path).with_context(|| {
                    format!(
                        "Failed to rename {} to {}",
                        tmp_path.display(),
                        self.path.display()
                    )
                })
            });

        if result.is_err() && tmp_path.exists() {
            if let Err(e) = std::fs::remove_file(&tmp_path) {
                log::warn!("Could not remove {}: {}", tmp_path.display(), e);
            }
        }
        result
    }
}

impl Loader for CsvTableWriter {
    async fn load(&self, table: &Table) -> Result<usize> {
        self.write(table)?;
        Ok(table.len())
    }
}

/// Serialize a table as CSV, optionally prefixed with an unnamed row index
pub fn write_table<W: Write>(table: &Table, output: W, index: bool) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().from_writer(output);

    if index {
        writer.write_record(std::iter::once("").chain(table.columns().iter().map(String::as_str)))?;
        for (i, row) in table.rows().iter().enumerate() {
            writer.write_record(std::iter::once(i.to_string()).chain(row.iter().cloned()))?;
        }
    } else {
        writer.write_record(table.columns())?;
        for row in table.rows() {
            writer.write_record(row)?;
        }
    }

    writer.flush()?;
    Ok(())
}
