//! API extraction through the resilient fetcher

use super::ExtractionRequest;
use crate::Table;
use crate::client::{HttpFetcher, Sleeper, TokioSleeper};
use crate::etl::Extractor;
use crate::storage::CacheGate;

use eyre::{Context, Result};
use url::Url;

/// An HTTP endpoint and the fetcher used to call it.
///
/// The endpoint is a template; `{entity}` and `{date}` are filled in per request.
#[derive(Clone, Debug)]
pub struct ApiEndpoint<S = TokioSleeper> {
    fetcher: HttpFetcher<S>,
    template: String,
}

impl<S: Sleeper> ApiEndpoint<S> {
    pub fn new(fetcher: HttpFetcher<S>, template: impl Into<String>) -> Self {
        Self {
            fetcher,
            template: template.into(),
        }
    }

    /// Resolve the endpoint for a request.
    ///
    /// Substituted values are percent-encoded, so an entity like `R&D/EU`
    /// stays one path segment or one query value.
    pub fn url(&self, request: &ExtractionRequest) -> Result<Url> {
        let rendered = request.render_with(&self.template, encode_component);
        Url::parse(&rendered).with_context(|| format!("Invalid API URL: {}", rendered))
    }
}

/// Percent-encode a value for use in a URL path segment or query value
fn encode_component(value: &str) -> String {
    // byte_serialize encodes a literal `+` as %2B, so any `+` left is a space
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Cache-gated extractor for the API source
pub struct ApiExtractor<'a, S> {
    request: &'a ExtractionRequest,
    endpoint: &'a ApiEndpoint<S>,
    cache: &'a CacheGate,
}

impl<'a, S: Sleeper> ApiExtractor<'a, S> {
    pub fn new(
        request: &'a ExtractionRequest,
        endpoint: &'a ApiEndpoint<S>,
        cache: &'a CacheGate,
    ) -> Self {
        Self {
            request,
            endpoint,
            cache,
        }
    }
}

impl<S: Sleeper> Extractor for ApiExtractor<'_, S> {
    async fn extract(&self) -> Result<Table> {
        let key = self.request.cache_key();
        self.cache
            .get_or_fetch(&key, || async {
                let url = self.endpoint.url(self.request)?;
                let records = self.endpoint.fetcher.fetch(&url).await?;
                Table::from_json_records(&records)
                    .with_context(|| format!("Unexpected payload from {}", url))
            })
            .await
    }
}
