//! `sqlx`-backed [`SqlConnection`] for warehouses and databases
//!
//! The driver is picked from the DSN scheme (`postgres://`, `mysql://`,
//! `sqlite:`). Redshift speaks the Postgres protocol.

use super::SqlConnection;
use crate::Table;

use base64::Engine;
use eyre::{Context, Result, bail, eyre};
use sqlx::mysql::{MySqlPoolOptions, MySqlRow};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{BigDecimal, JsonValue, Uuid};
use sqlx::{Column, ColumnIndex, Decode, MySqlPool, PgPool, Row, SqlitePool, Type, TypeInfo};

#[derive(Clone, Debug)]
enum Backend {
    Postgres(PgPool),
    MySql(MySqlPool),
    Sqlite(SqlitePool),
}

/// A single-connection pool opened from a DSN
#[derive(Clone, Debug)]
pub struct SqlxConnection {
    backend: Backend,
}

impl SqlxConnection {
    /// Connect to the database at `dsn`
    ///
    /// # Errors
    /// Returns an error if the scheme is unsupported or the connection fails
    pub async fn connect(dsn: &str) -> Result<Self> {
        let scheme = dsn.split_once(':').map(|(s, _)| s).unwrap_or(dsn);
        let backend = match scheme {
            "postgres" | "postgresql" => Backend::Postgres(
                PgPoolOptions::new()
                    .max_connections(1)
                    .connect(dsn)
                    .await
                    .context("Failed to connect to database")?,
            ),
            "mysql" | "mariadb" => Backend::MySql(
                MySqlPoolOptions::new()
                    .max_connections(1)
                    .connect(dsn)
                    .await
                    .context("Failed to connect to database")?,
            ),
            "sqlite" => Backend::Sqlite(
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .connect(dsn)
                    .await
                    .context("Failed to connect to database")?,
            ),
            other => bail!("Unsupported database scheme '{}'", other),
        };
        log::debug!("Connected to {} database", scheme);
        Ok(Self { backend })
    }
}

impl SqlConnection for SqlxConnection {
    async fn query(&self, sql: &str) -> Result<Table> {
        let table = match &self.backend {
            Backend::Postgres(pool) => {
                rows_to_table(&sqlx::query(sql).fetch_all(pool).await?, pg_cell)?
            }
            Backend::MySql(pool) => {
                rows_to_table(&sqlx::query(sql).fetch_all(pool).await?, mysql_cell)?
            }
            Backend::Sqlite(pool) => {
                rows_to_table(&sqlx::query(sql).fetch_all(pool).await?, sqlite_cell)?
            }
        };
        log::debug!("Query returned {} row(s)", table.len());
        Ok(table)
    }
}

fn rows_to_table<R: Row>(rows: &[R], cell: fn(&R, usize) -> Result<String>) -> Result<Table> {
    // Column names come from the rows, so an empty result has no columns
    let Some(first) = rows.first() else {
        return Ok(Table::default());
    };

    let mut table = Table::new(first.columns().iter().map(|c| c.name().to_string()));
    for row in rows {
        let cells = (0..row.len())
            .map(|i| cell(row, i))
            .collect::<Result<Vec<_>>>()?;
        table.push_row(cells)?;
    }
    Ok(table)
}

/// Decode a cell as `T` and render it, if the column type is compatible
fn text<'r, R, T>(row: &'r R, idx: usize) -> Option<String>
where
    R: Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database> + ToString,
{
    row.try_get::<Option<T>, _>(idx)
        .ok()
        .map(|v| v.map(|v| v.to_string()).unwrap_or_default())
}

/// Binary values are written as standard base64
fn bytes<'r, R>(row: &'r R, idx: usize) -> Option<String>
where
    R: Row,
    usize: ColumnIndex<R>,
    Vec<u8>: Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get::<Option<Vec<u8>>, _>(idx).ok().map(|v| {
        v.map(|v| base64::engine::general_purpose::STANDARD.encode(v))
            .unwrap_or_default()
    })
}

fn undecodable<R: Row>(row: &R, idx: usize) -> eyre::Report {
    let column = &row.columns()[idx];
    eyre!(
        "Cannot decode column '{}' of type {}",
        column.name(),
        column.type_info().name()
    )
}

fn pg_cell(row: &PgRow, idx: usize) -> Result<String> {
    text::<_, String>(row, idx)
        .or_else(|| text::<_, i64>(row, idx))
        .or_else(|| text::<_, i32>(row, idx))
        .or_else(|| text::<_, i16>(row, idx))
        .or_else(|| text::<_, f64>(row, idx))
        .or_else(|| text::<_, f32>(row, idx))
        .or_else(|| text::<_, bool>(row, idx))
        .or_else(|| text::<_, BigDecimal>(row, idx))
        .or_else(|| text::<_, NaiveDate>(row, idx))
        .or_else(|| text::<_, NaiveDateTime>(row, idx))
        .or_else(|| text::<_, DateTime<Utc>>(row, idx))
        .or_else(|| text::<_, NaiveTime>(row, idx))
        .or_else(|| text::<_, Uuid>(row, idx))
        .or_else(|| text::<_, JsonValue>(row, idx))
        .or_else(|| bytes(row, idx))
        .ok_or_else(|| undecodable(row, idx))
}

fn mysql_cell(row: &MySqlRow, idx: usize) -> Result<String> {
    text::<_, String>(row, idx)
        .or_else(|| text::<_, i64>(row, idx))
        .or_else(|| text::<_, u64>(row, idx))
        .or_else(|| text::<_, f64>(row, idx))
        .or_else(|| text::<_, f32>(row, idx))
        .or_else(|| text::<_, BigDecimal>(row, idx))
        .or_else(|| text::<_, NaiveDate>(row, idx))
        .or_else(|| text::<_, NaiveDateTime>(row, idx))
        .or_else(|| text::<_, DateTime<Utc>>(row, idx))
        .or_else(|| text::<_, NaiveTime>(row, idx))
        .or_else(|| text::<_, JsonValue>(row, idx))
        .or_else(|| text::<_, bool>(row, idx))
        .or_else(|| bytes(row, idx))
        .ok_or_else(|| undecodable(row, idx))
}

fn sqlite_cell(row: &SqliteRow, idx: usize) -> Result<String> {
    text::<_, String>(row, idx)
        .or_else(|| text::<_, i64>(row, idx))
        .or_else(|| text::<_, f64>(row, idx))
        .or_else(|| text::<_, bool>(row, idx))
        .or_else(|| bytes(row, idx))
        .ok_or_else(|| undecodable(row, idx))
}
