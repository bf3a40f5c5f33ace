//! Uniform in-memory table returned by every extraction path

use eyre::{Result, bail, eyre};
use serde_json::{Map, Value};

/// Ordered named columns with rows of string cells.
///
/// Every source produces a `Table` and the cache persists it verbatim, so
/// cells are kept as their textual representation. `NULL`/`null` values are
/// stored as empty strings, matching how they are written to CSV.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Create an empty table with the given column names
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row
    ///
    /// # Errors
    /// Returns an error if the row width doesn't match the number of columns
    pub fn push_row<I, S>(&mut self, row: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let row: Vec<String> = row.into_iter().map(Into::into).collect();
        if row.len() != self.columns.len() {
            bail!(
                "Row has {} value(s) but the table has {} column(s)",
                row.len(),
                self.columns.len()
            );
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// All values of a column, by name
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    /// Build a table from a JSON array of record objects.
    ///
    /// Columns are the union of all record keys in order of first appearance.
    /// A record missing a key gets an empty cell for it.
    ///
    /// # Errors
    /// Returns an error if `records` is not an array of objects
    pub fn from_json_records(records: &Value) -> Result<Self> {
        let records = records
            .as_array()
            .ok_or_else(|| eyre!("Expected a list of records, got {}", kind_of(records)))?;

        let objects = records
            .iter()
            .enumerate()
            .map(|(i, r)| {
                r.as_object()
                    .ok_or_else(|| eyre!("Record {} is {}, not an object", i, kind_of(r)))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut columns: Vec<String> = Vec::new();
        for object in &objects {
            for key in object.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }

        let mut table = Table::new(columns);
        for object in objects {
            let row: Vec<String> = table
                .columns
                .iter()
                .map(|c| object.get(c).map(cell_text).unwrap_or_default())
                .collect();
            table.rows.push(row);
        }
        Ok(table)
    }

    /// Render the table as a JSON array of record objects
    pub fn to_json_records(&self) -> Value {
        Value::Array(
            self.rows
                .iter()
                .map(|row| {
                    let object: Map<String, Value> = self
                        .columns
                        .iter()
                        .cloned()
                        .zip(row.iter().map(|v| Value::String(v.clone())))
                        .collect();
                    Value::Object(object)
                })
                .collect(),
        )
    }
}

/// Textual form of a JSON cell; strings are taken verbatim
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
