//! The debounced incremental search pipeline.
//!
//! A search session moves through Idle → Debouncing → Filtering → Resolving →
//! Settled, and restarts at Debouncing on every new keystroke. Cancellation
//! is logical only: a superseded call keeps running, but its output is
//! discarded the moment a newer query has taken over. In-flight network
//! operations from a superseded query are never aborted — their results still
//! land in the caches, where the newer query can pick them up for free.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::caching::CacheKey;
use crate::services::CatalogService;
use crate::types::{CatalogSummary, IndexReference};

/// One UI search box worth of state.
///
/// The debounce timer and the "is this still the active query" bookkeeping
/// live here, per session, not in any global.
#[derive(Debug)]
pub struct SearchSession {
    service: Arc<CatalogService>,
    debounce: Duration,
    max_results: usize,
    generation: AtomicU64,
}

impl SearchSession {
    pub fn new(service: Arc<CatalogService>) -> Self {
        let search = service.config().search;
        Self {
            service,
            debounce: search.debounce,
            max_results: search.max_results,
            generation: AtomicU64::new(0),
        }
    }

    /// Runs one (re)keyed search over the given name index.
    ///
    /// Returns `None` when the call was superseded by a newer query before it
    /// settled; the caller must then keep whatever it is currently showing.
    /// `Some(vec![])` is a real answer: the query matched nothing.
    ///
    /// An empty or whitespace-only query settles immediately to no results,
    /// skipping the debounce delay.
    pub async fn search(
        &self,
        query: &str,
        index: &[IndexReference],
        max_results: Option<usize>,
    ) -> Option<Vec<CatalogSummary>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let max_results = max_results.unwrap_or(self.max_results);

        let query = query.trim().to_ascii_lowercase();
        if query.is_empty() {
            return Some(Vec::new());
        }

        tokio::time::sleep(self.debounce).await;
        if self.is_superseded(generation) {
            tracing::trace!(%query, "query superseded while debouncing");
            return None;
        }

        let matches = filter_index(&query, index, max_results);
        let summaries = self.resolve(&matches).await;

        if self.is_superseded(generation) {
            tracing::trace!(%query, "query superseded while resolving, discarding");
            return None;
        }
        tracing::debug!(%query, results = summaries.len(), "search settled");
        Some(summaries)
    }

    fn is_superseded(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    /// Resolves matches to summaries, cache-first, preserving match order.
    ///
    /// Uncached matches are fetched concurrently; an individual fetch failure
    /// degrades to a minimal placeholder summary instead of failing the
    /// search.
    async fn resolve(&self, matches: &[&IndexReference]) -> Vec<CatalogSummary> {
        let mut resolved: Vec<Option<CatalogSummary>> = Vec::with_capacity(matches.len());
        let mut missing = Vec::new();

        for (position, reference) in matches.iter().enumerate() {
            let key = CacheKey::for_summary(&reference.name);
            match self.service.caches.summaries.get(&key) {
                Some(summary) => resolved.push(Some(summary)),
                None => {
                    resolved.push(None);
                    missing.push((position, *reference));
                }
            }
        }

        let fetched = futures::future::join_all(
            missing
                .iter()
                .map(|(_, reference)| self.resolve_uncached(reference)),
        )
        .await;

        for ((position, _), summary) in missing.into_iter().zip(fetched) {
            resolved[position] = Some(summary);
        }

        // filter-match order first, ascending id as the tie-break
        let mut ordered: Vec<(usize, CatalogSummary)> =
            resolved.into_iter().flatten().enumerate().collect();
        ordered.sort_by_key(|(position, summary)| (*position, summary.id));
        ordered.into_iter().map(|(_, summary)| summary).collect()
    }

    async fn resolve_uncached(&self, reference: &IndexReference) -> CatalogSummary {
        match self.service.fetch_by_url(&reference.url).await {
            Ok(entry) => {
                let summary = CatalogSummary::from(entry.as_ref());
                self.service
                    .caches
                    .summaries
                    .insert(CacheKey::for_summary(&reference.name), summary.clone());
                summary
            }
            Err(err) => {
                tracing::debug!(
                    name = %reference.name,
                    error = &err as &dyn std::error::Error,
                    "detail fetch failed, degrading to placeholder summary"
                );
                // The placeholder is for this search only. Caching it would
                // keep serving a degraded summary long after the remote has
                // recovered; the next search re-fetches instead.
                CatalogSummary::placeholder(reference)
            }
        }
    }
}

/// Case-insensitive substring filter over the index, capped to the first
/// `max_results` matches in index order.
fn filter_index<'a>(
    query: &str,
    index: &'a [IndexReference],
    max_results: usize,
) -> Vec<&'a IndexReference> {
    index
        .iter()
        .filter(|reference| reference.name.to_ascii_lowercase().contains(query))
        .take(max_results)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::types::IndexReference;

    fn index() -> Vec<IndexReference> {
        ["basilisk", "cockatrice", "griffin", "grindylow", "kelpie"]
            .iter()
            .enumerate()
            .map(|(n, name)| IndexReference {
                name: (*name).into(),
                url: format!("http://catalog.test/api/creatures/{}/", n + 1)
                    .parse()
                    .unwrap(),
            })
            .collect()
    }

    fn session() -> SearchSession {
        let service = CatalogService::new(Config::default());
        // every name resolvable from the summary cache, so no network is
        // touched in these tests
        for reference in index() {
            service.caches.summaries.insert(
                CacheKey::for_summary(&reference.name),
                CatalogSummary {
                    id: reference.id().unwrap(),
                    name: reference.name.clone(),
                    image: Some(format!("http://img.test/{}.png", reference.name)),
                    categories: vec!["beast".into()],
                },
            );
        }
        SearchSession::new(service)
    }

    #[test]
    fn test_filter() {
        let index = index();
        let matches = filter_index("gri", &index, 20);
        let names: Vec<_> = matches.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["griffin", "grindylow"]);

        // capped in index order
        let matches = filter_index("i", &index, 2);
        let names: Vec<_> = matches.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["basilisk", "cockatrice"]);

        assert!(filter_index("wyvern", &index, 20).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_query_settles_immediately() {
        let session = session();
        let index = index();

        let before = tokio::time::Instant::now();
        let results = session.search("   ", &index, None).await;
        assert_eq!(results, Some(Vec::new()));
        // no debounce timer ran; in paused mode any sleep would have moved
        // the clock
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keystrokes_coalesce_into_one_query() {
        let session = session();
        let index = index();

        // three keystrokes, 100ms apart, all within the 300ms debounce
        let (first, second, third) = tokio::join!(
            session.search("gri", &index, None),
            async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                session.search("grif", &index, None).await
            },
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                session.search("griff", &index, None).await
            },
        );

        assert_eq!(first, None);
        assert_eq!(second, None);
        let results = third.expect("latest query must settle");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "griffin");
        assert_eq!(results[0].id, 3);
        // resolved from the summary cache, not a placeholder
        assert!(results[0].image.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_keystrokes_each_settle() {
        let session = session();
        let index = index();

        let results = session.search("kelpie", &index, None).await;
        assert_eq!(results.unwrap().len(), 1);

        tokio::time::sleep(Duration::from_millis(500)).await;

        let results = session.search("basilisk", &index, None).await;
        assert_eq!(results.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_matches_is_a_real_answer() {
        let session = session();
        let index = index();

        let results = session.search("wyvern", &index, None).await;
        assert_eq!(results, Some(Vec::new()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_results_cap() {
        let session = session();
        let index = index();

        let results = session.search("i", &index, Some(3)).await.unwrap();
        assert_eq!(results.len(), 3);
        let names: Vec<_> = results.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["basilisk", "cockatrice", "griffin"]);
    }
}
