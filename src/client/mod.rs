//! HTTP API client, authentication and retry handling.
//!
//! This module provides the [`HttpFetcher`] for pulling records from an API
//! endpoint, along with [`Auth`] and the retry primitives it is built on.

mod auth;
mod fetcher;
mod retry;

pub use auth::Auth;
pub use fetcher::{FetchOptions, HttpFetcher};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper, with_retries};
