//! The shared data-access context and its downstream surface.
//!
//! [`CatalogService`] owns every piece of shared mutable state in the layer:
//! the bounded caches, the in-flight registries, and the fetch client. It is
//! constructed once by the application root and handed (behind an [`Arc`]) to
//! every collaborator that needs it — there is no process-wide singleton.
//!
//! Every read follows the same path: consult the cache, then join or start
//! the in-flight operation, then perform network I/O, then populate the cache
//! before the result reaches any waiter.

use std::sync::Arc;

use futures::FutureExt;
use url::Url;

use crate::caching::{BoundedCache, CacheContents, CacheKey, InFlightRegistry};
use crate::config::Config;
use crate::fetch::CatalogClient;
use crate::types::{CacheStats, CatalogEntry, CatalogSummary, IndexReference};

/// The bounded in-memory caches, one per value shape.
#[derive(Debug)]
pub struct Caches {
    /// Full detail records, keyed by `entry:` or `url:` logical keys.
    pub entries: BoundedCache<Arc<CatalogEntry>>,
    /// Derived summaries, keyed by `summary:` logical keys.
    pub summaries: BoundedCache<CatalogSummary>,
    /// Index pages, keyed by `index:` logical keys.
    pub index_pages: BoundedCache<Arc<[IndexReference]>>,
}

impl Caches {
    pub fn from_config(config: &Config) -> Self {
        Self {
            entries: BoundedCache::new("entries", config.caches.entries),
            summaries: BoundedCache::new("summaries", config.caches.summaries),
            index_pages: BoundedCache::new("index_pages", config.caches.index_pages),
        }
    }
}

/// The data-access layer's context object.
pub struct CatalogService {
    config: Config,
    pub(crate) caches: Caches,
    client: CatalogClient,
    entry_requests: Arc<InFlightRegistry<Arc<CatalogEntry>>>,
    index_requests: Arc<InFlightRegistry<Arc<[IndexReference]>>>,
}

impl std::fmt::Debug for CatalogService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogService")
            .field("caches", &self.caches)
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl CatalogService {
    /// Creates the service from a config.
    pub fn new(config: Config) -> Arc<Self> {
        let caches = Caches::from_config(&config);
        let client = CatalogClient::new(&config);
        Arc::new(Self {
            config,
            caches,
            client,
            entry_requests: Arc::new(Default::default()),
            index_requests: Arc::new(Default::default()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetches the full name index, the authoritative enumeration of all
    /// valid names and locators.
    ///
    /// Meant to be called once at startup; the result is cached for the
    /// process lifetime under normal capacity settings.
    pub async fn preload(self: &Arc<Self>) -> CacheContents<Arc<[IndexReference]>> {
        self.fetch_index(self.config.index_limit).await
    }

    /// Fetches one index page at the given limit, cache-first.
    pub async fn fetch_index(self: &Arc<Self>, limit: usize) -> CacheContents<Arc<[IndexReference]>> {
        let cache_key = CacheKey::for_index(limit);
        if let Some(page) = self.caches.index_pages.get(&cache_key) {
            return Ok(page);
        }

        let this = Arc::clone(self);
        let key = cache_key.clone();
        let operation = self.index_requests.join_or_start(cache_key, move || {
            async move {
                let references = this.client.fetch_index(limit).await?;
                tracing::debug!(limit, count = references.len(), "fetched catalog index");
                let page: Arc<[IndexReference]> = references.into();
                this.caches.index_pages.insert(key, Arc::clone(&page));
                Ok(page)
            }
            .boxed()
        });
        operation.await
    }

    /// Fetches a detail record by numeric id or display name, cache-first.
    pub async fn fetch_details(self: &Arc<Self>, name_or_id: &str) -> CacheContents<Arc<CatalogEntry>> {
        let lookup = name_or_id.trim().to_ascii_lowercase();
        let cache_key = CacheKey::for_entry(&lookup);

        let this = Arc::clone(self);
        self.fetch_entry_inner(cache_key, move || {
            async move { this.client.fetch_entry(&lookup).await }.boxed()
        })
        .await
    }

    /// Fetches a detail record through an absolute locator, cache-first.
    pub async fn fetch_by_url(self: &Arc<Self>, url: &Url) -> CacheContents<Arc<CatalogEntry>> {
        let cache_key = CacheKey::for_url(url);

        let this = Arc::clone(self);
        let url = url.clone();
        self.fetch_entry_inner(cache_key, move || {
            async move { this.client.fetch_entry_by_url(&url).await }.boxed()
        })
        .await
    }

    /// The shared cache → registry → client → cache path for detail records.
    async fn fetch_entry_inner<F>(
        self: &Arc<Self>,
        cache_key: CacheKey,
        fetch: F,
    ) -> CacheContents<Arc<CatalogEntry>>
    where
        F: FnOnce() -> futures::future::BoxFuture<'static, CacheContents<CatalogEntry>>
            + Send
            + 'static,
    {
        if let Some(entry) = self.caches.entries.get(&cache_key) {
            tracing::trace!(key = %cache_key, "entry cache hit");
            return Ok(entry);
        }

        let this = Arc::clone(self);
        let key = cache_key.clone();
        let operation = self.entry_requests.join_or_start(cache_key, move || {
            async move {
                let entry = Arc::new(fetch().await?);
                // populate the cache before any waiter sees the value
                this.caches.entries.insert(key, Arc::clone(&entry));
                Ok(entry)
            }
            .boxed()
        });
        operation.await
    }

    /// A snapshot of cache and registry occupancy.
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            entries: self.caches.entries.len(),
            summaries: self.caches.summaries.len(),
            index_pages: self.caches.index_pages.len(),
            pending: self.pending_count(),
        }
    }

    /// Drops all cached values. In-flight operations are unaffected.
    ///
    /// Used for tests and explicit resets; there is no finer-grained
    /// invalidation because the backing data is immutable.
    pub fn clear_all(&self) {
        self.caches.entries.clear();
        self.caches.summaries.clear();
        self.caches.index_pages.clear();
    }

    fn pending_count(&self) -> usize {
        self.entry_requests.len() + self.index_requests.len()
    }
}
