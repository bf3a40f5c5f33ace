//! Resilient HTTP fetcher
//!
//! Issues a GET, expects a JSON body carrying a list of records under a
//! top-level field, and retries transient failures with a fixed delay.

use super::Auth;
use super::retry::{RetryPolicy, Sleeper, TokioSleeper, with_retries};
use crate::error::FetchError;

use eyre::{Context, Result};
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::collections::HashMap;
use url::Url;

/// Settings for [`HttpFetcher`]
#[derive(Clone, Debug)]
pub struct FetchOptions {
    /// Extra headers sent with every request
    pub headers: HashMap<String, String>,
    /// Verify server certificates. Off by default.
    pub verify_tls: bool,
    pub retry: RetryPolicy,
    /// Top-level JSON field holding the records
    pub data_field: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            headers: HashMap::new(),
            verify_tls: false,
            retry: RetryPolicy::default(),
            data_field: "data".to_string(),
        }
    }
}

/// HTTP client that retries failed GETs.
///
/// # Example
/// ```no_run
/// use entity_extractor::client::{Auth, FetchOptions, HttpFetcher};
/// use url::Url;
///
/// # async fn example() -> eyre::Result<()> {
/// let fetcher = HttpFetcher::try_new(&Auth::None, FetchOptions::default())?;
/// let records = fetcher
///     .fetch(&Url::parse("https://example.com/data/index")?)
///     .await?;
/// println!("{}", records);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct HttpFetcher<S = TokioSleeper> {
    client: Client,
    retry: RetryPolicy,
    data_field: String,
    sleeper: S,
}

impl HttpFetcher<TokioSleeper> {
    /// Build the underlying client with default headers and TLS settings
    ///
    /// # Errors
    /// Returns an error if a header name or value is invalid or the client cannot be built
    pub fn try_new(auth: &Auth, options: FetchOptions) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &options.headers {
            let name: HeaderName = name
                .parse()
                .with_context(|| format!("Invalid header name: {}", name))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("Invalid value for header {}", name))?;
            headers.insert(name, value);
        }
        auth.apply(&mut headers)?;

        if !options.verify_tls {
            log::warn!("TLS certificate verification is disabled for API requests");
        }

        let client = Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(!options.verify_tls)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            retry: options.retry,
            data_field: options.data_field,
            sleeper: TokioSleeper,
        })
    }
}

impl<S: Sleeper> HttpFetcher<S> {
    /// Swap the wait used between attempts
    pub fn with_sleeper<T: Sleeper>(self, sleeper: T) -> HttpFetcher<T> {
        HttpFetcher {
            client: self.client,
            retry: self.retry,
            data_field: self.data_field,
            sleeper,
        }
    }

    /// GET `url` and return the records payload.
    ///
    /// # Errors
    /// - [`FetchError::Transport`], [`FetchError::Status`] or [`FetchError::Malformed`]
    ///   from the last attempt once retries are exhausted
    /// - [`FetchError::Empty`] straight away if the response carries no data
    pub async fn fetch(&self, url: &Url) -> Result<Value, FetchError> {
        log::info!("Making GET request to {}", url);
        with_retries(&self.retry, &self.sleeper, || self.attempt(url)).await
    }

    async fn attempt(&self, url: &Url) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
        let body: Value = serde_json::from_slice(&bytes).map_err(|source| FetchError::Malformed {
            url: url.to_string(),
            source,
        })?;

        self.payload(url, body)
    }

    /// Pull the records out of a parsed body; a falsy body or a missing/null field is empty
    fn payload(&self, url: &Url, mut body: Value) -> Result<Value, FetchError> {
        let empty = || FetchError::Empty {
            url: url.to_string(),
        };
        if is_falsy(&body) {
            return Err(empty());
        }
        match body.get_mut(&self.data_field).map(Value::take) {
            None | Some(Value::Null) => Err(empty()),
            Some(records) => Ok(records),
        }
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}
