//! The remote fetch client.
//!
//! All network I/O of the layer goes through [`CatalogClient`]: plain HTTP
//! GETs with JSON bodies, a fixed per-request deadline, and bounded automatic
//! retry with exponential backoff on transient failures. The client knows
//! nothing about caches or request coalescing; those live a layer above.

use std::error::Error;
use std::time::Duration;

use serde::de::DeserializeOwned;
use url::Url;

use crate::caching::{CacheContents, CacheError};
use crate::config::Config;
use crate::types::{CatalogEntry, IndexPage, IndexReference};

impl CacheError {
    fn fetch_error(mut error: &dyn Error) -> Self {
        // the innermost source is usually the actionable one (connection
        // refused, dns failure, ...), not reqwest's wrapper
        while let Some(source) = error.source() {
            error = source;
        }
        Self::Fetch(error.to_string())
    }
}

impl From<reqwest::Error> for CacheError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Malformed(error.to_string())
        } else {
            Self::fetch_error(&error)
        }
    }
}

/// Runs a fallible task up to `max_retries` times, backing off exponentially.
///
/// Attempt `n` (1-based) sleeps `backoff * 2^n` before the next try. Only
/// transient errors are retried; `NotFound` and `Malformed` surface
/// immediately, as a retry cannot change their outcome.
pub(crate) async fn retry<G, F, T>(max_retries: usize, backoff: Duration, task_gen: G) -> CacheContents<T>
where
    G: Fn() -> F,
    F: Future<Output = CacheContents<T>>,
{
    let mut tries = 0;
    loop {
        tries += 1;
        let result = task_gen().await;

        let should_retry = matches!(&result, Err(err) if err.is_transient());
        if !should_retry || tries >= max_retries.max(1) {
            break result;
        }

        let delay = backoff * (1u32 << tries.min(16));
        tracing::debug!(attempt = tries, ?delay, "transient fetch failure, retrying");
        tokio::time::sleep(delay).await;
    }
}

/// A client for the remote read-only catalog.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: reqwest::Client,
    base_url: Url,
    request_timeout: Duration,
    max_retries: usize,
    retry_backoff: Duration,
}

impl CatalogClient {
    /// Creates a client for the catalog configured in `config`.
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(config.fetch.connect_timeout)
            .build()
            .expect("failed to construct the http client");

        Self {
            client,
            base_url: config.catalog_url.clone(),
            request_timeout: config.fetch.request_timeout,
            max_retries: config.fetch.max_retries,
            retry_backoff: config.fetch.retry_backoff,
        }
    }

    /// Fetches one page of the catalog index, in catalog order.
    pub async fn fetch_index(&self, limit: usize) -> CacheContents<Vec<IndexReference>> {
        let mut url = self
            .base_url
            .join("creatures")
            .map_err(|e| CacheError::Malformed(e.to_string()))?;
        url.query_pairs_mut().append_pair("limit", &limit.to_string());

        let page: IndexPage = self.get_json_with_retry(url).await?;
        Ok(page.results)
    }

    /// Fetches a detail record by numeric id or display name.
    pub async fn fetch_entry(&self, name_or_id: &str) -> CacheContents<CatalogEntry> {
        let url = self
            .base_url
            .join(&format!("creatures/{name_or_id}"))
            .map_err(|e| CacheError::Malformed(e.to_string()))?;
        self.fetch_entry_by_url(&url).await
    }

    /// Fetches a detail record through an absolute locator from the index.
    pub async fn fetch_entry_by_url(&self, url: &Url) -> CacheContents<CatalogEntry> {
        let entry: CatalogEntry = self.get_json_with_retry(url.clone()).await?;
        Ok(entry.normalize())
    }

    async fn get_json_with_retry<T: DeserializeOwned>(&self, url: Url) -> CacheContents<T> {
        let result = retry(self.max_retries, self.retry_backoff, || {
            self.get_json(url.clone())
        })
        .await;

        if let Err(err) = &result {
            tracing::debug!(%url, error = err as &dyn Error, "catalog fetch failed");
        }
        result
    }

    /// One GET request under the fixed deadline, no retries.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> CacheContents<T> {
        let deadline = self.request_timeout;
        let request = async {
            let response = self.client.get(url.clone()).send().await?;
            let status = response.status();
            if status.is_success() {
                Ok(response.json().await?)
            } else if status.is_client_error() {
                // chances are it's a 404; either way the remote will not
                // produce this record for us
                Err(CacheError::NotFound)
            } else {
                Err(CacheError::Fetch(status.to_string()))
            }
        };

        tokio::time::timeout(deadline, request)
            .await
            .unwrap_or(Err(CacheError::Timeout(deadline)))
    }
}
