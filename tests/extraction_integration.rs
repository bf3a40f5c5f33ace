//! Integration tests for end-to-end extraction
//!
//! These tests drive `Sources::extract` against real files and a mock HTTP
//! server, checking what ends up on disk as well as the returned table.

use chrono::NaiveDate;
use entity_extractor::source::ApiEndpoint;
use entity_extractor::{
    Auth, CacheGate, CacheNaming, CsvTableReader, CsvTableWriter, ExtractionRequest, FetchError,
    FetchOptions, HttpFetcher, RetryPolicy, Sleeper, SourceKind, Sources, SqlConnection, Table,
};
use eyre::{Result, eyre};
use httpmock::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

/// Stand-in for runs that never touch a database
struct NoConnection;

impl SqlConnection for NoConnection {
    async fn query(&self, _sql: &str) -> Result<Table> {
        Err(eyre!("no database in this test"))
    }
}

/// Counts waits instead of sleeping
#[derive(Clone, Default)]
struct CountingSleeper(Arc<AtomicUsize>);

impl Sleeper for CountingSleeper {
    async fn sleep(&self, _duration: Duration) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 4, 2).unwrap()
}

fn api_sources(
    template: String,
    max_retries: u32,
    naming: CacheNaming,
    sleeper: CountingSleeper,
) -> Sources<NoConnection, CountingSleeper> {
    let options = FetchOptions {
        retry: RetryPolicy::new(max_retries, Duration::from_secs(60)),
        ..FetchOptions::default()
    };
    let fetcher = HttpFetcher::try_new(&Auth::None, options)
        .unwrap()
        .with_sleeper(sleeper);

    Sources::new(CacheGate::new(naming).with_stamp(date()))
        .with_api(ApiEndpoint::new(fetcher, template))
}

#[tokio::test]
async fn test_csv_source_reads_file_without_caching() -> Result<()> {
    let temp = TempDir::new()?;
    let input = temp.path().join("in.csv");
    std::fs::write(&input, "desk,pnl\nrates,10.5\nfx,-3\ncredit,0\n")?;

    let sources: Sources<NoConnection> = Sources::new(CacheGate::default());
    let request = ExtractionRequest::new(SourceKind::Csv, "X", date()).with_file_path(&input);

    let table = sources.extract(&request).await?;

    assert_eq!(table.len(), 3);
    assert_eq!(table.width(), 2);
    assert_eq!(table.columns(), &["desk", "pnl"]);
    assert_eq!(table.rows()[0], vec!["rates", "10.5"]);
    assert_eq!(table.rows()[1], vec!["fx", "-3"]);
    assert_eq!(table.rows()[2], vec!["credit", "0"]);

    // Only the input file is present
    assert_eq!(std::fs::read_dir(temp.path())?.count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_api_source_fetches_and_writes_dated_cache_file() -> Result<()> {
    let temp = TempDir::new()?;
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/desks/GLOBAL_TRADING_DESK")
                .query_param("date", "2022-04-02");
            then.status(200).json_body(json!({
                "data": [
                    {"trade_id": 1, "notional": 1000000, "ccy": "USD"},
                    {"trade_id": 2, "notional": 250.5, "ccy": "EUR"}
                ]
            }));
        })
        .await;

    let sleeper = CountingSleeper::default();
    let sources = api_sources(
        server.url("/desks/{entity}?date={date}"),
        5,
        CacheNaming::Dated,
        sleeper.clone(),
    );
    let request = ExtractionRequest::new(SourceKind::Api, "GLOBAL_TRADING_DESK", date())
        .with_file_path(temp.path())
        .with_file_name("desk");

    let table = sources.extract(&request).await?;
    assert_eq!(table.columns(), &["trade_id", "notional", "ccy"]);
    assert_eq!(table.column("notional"), Some(vec!["1000000", "250.5"]));
    assert_eq!(mock.hits_async().await, 1);
    assert_eq!(sleeper.0.load(Ordering::SeqCst), 0);

    let written = temp.path().join("2022-04-02_desk.csv");
    assert_eq!(CsvTableReader::new(&written).read()?, table);

    // The dated file is not the lookup path, so the next run fetches again
    sources.extract(&request).await?;
    assert_eq!(mock.hits_async().await, 2);
    Ok(())
}

#[tokio::test]
async fn test_api_source_served_from_plain_cache() -> Result<()> {
    let temp = TempDir::new()?;
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/data/index");
            then.status(200)
                .json_body(json!({"data": [{"id": "a"}, {"id": "b"}]}));
        })
        .await;

    let sources = api_sources(
        server.url("/data/index"),
        5,
        CacheNaming::Plain,
        CountingSleeper::default(),
    );
    let request = ExtractionRequest::new(SourceKind::Api, "ids", date())
        .with_file_path(temp.path());

    let first = sources.extract(&request).await?;
    let second = sources.extract(&request).await?;

    assert_eq!(first, second);
    assert_eq!(mock.hits_async().await, 1);
    assert!(temp.path().join("ids.csv").is_file());
    Ok(())
}

#[tokio::test]
async fn test_preseeded_cache_wins_over_api() -> Result<()> {
    let temp = TempDir::new()?;
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/data/index");
            then.status(500);
        })
        .await;

    let mut seeded = Table::new(["desk", "pnl"]);
    seeded.push_row(["rates", "1"])?;
    CsvTableWriter::new(temp.path().join("desk.csv")).write(&seeded)?;

    let sources = api_sources(
        server.url("/data/index"),
        5,
        CacheNaming::Dated,
        CountingSleeper::default(),
    );
    let request = ExtractionRequest::new(SourceKind::Api, "desk", date())
        .with_file_path(temp.path());

    assert_eq!(sources.extract(&request).await?, seeded);
    assert_eq!(mock.hits_async().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_api_exhausts_retries_and_caches_nothing() -> Result<()> {
    let temp = TempDir::new()?;
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/data/index");
            then.status(502);
        })
        .await;

    let sleeper = CountingSleeper::default();
    let sources = api_sources(
        server.url("/data/index"),
        2,
        CacheNaming::Plain,
        sleeper.clone(),
    );
    let request = ExtractionRequest::new(SourceKind::Api, "desk", date())
        .with_file_path(temp.path());

    let err = sources.extract(&request).await.unwrap_err();
    let fetch_error = err.downcast_ref::<FetchError>().expect("a fetch error");
    assert!(matches!(fetch_error, FetchError::Status { .. }));

    assert_eq!(mock.hits_async().await, 3);
    assert_eq!(sleeper.0.load(Ordering::SeqCst), 2);
    assert_eq!(std::fs::read_dir(temp.path())?.count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_api_empty_payload_is_not_retried() -> Result<()> {
    let temp = TempDir::new()?;
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/data/index");
            then.status(200).json_body(json!({"status": "ok"}));
        })
        .await;

    let sleeper = CountingSleeper::default();
    let sources = api_sources(
        server.url("/data/index"),
        5,
        CacheNaming::Plain,
        sleeper.clone(),
    );
    let request = ExtractionRequest::new(SourceKind::Api, "desk", date())
        .with_file_path(temp.path());

    let err = sources.extract(&request).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FetchError>(),
        Some(FetchError::Empty { .. })
    ));
    assert_eq!(mock.hits_async().await, 1);
    assert_eq!(sleeper.0.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn test_cache_file_round_trip() -> Result<()> {
    let temp = TempDir::new()?;
    let path = temp.path().join("round_trip.csv");

    let mut table = Table::new(["entity", "as_of", "note", "value"]);
    table.push_row(["GLOBAL_TRADING_DESK", "2022-04-02", "line\nbreak", "1e-3"])?;
    table.push_row(["EMEA", "2022-04-02", "", "-0"])?;
    table.push_row(["APAC", "2022-04-01", "\"quoted\", comma", "42"])?;

    CsvTableWriter::new(&path).write(&table)?;

    let raw = std::fs::read_to_string(&path)?;
    assert!(raw.starts_with(",entity,as_of,note,value\n0,"));

    assert_eq!(CsvTableReader::new(&path).read()?, table);
    Ok(())
}
