//! The concurrency-limited batch fetcher.

use std::sync::Arc;

use crate::caching::CacheContents;
use crate::services::CatalogService;
use crate::types::{CatalogEntry, IndexReference};

/// Runs `operation` over `items` in consecutive chunks of `concurrency`.
///
/// Within a chunk all operations run concurrently; the next chunk starts only
/// after the previous one has fully settled, so at most `concurrency`
/// operations are unsettled at any instant. Every operation in a chunk runs
/// to completion even when one of them fails; the first error (in item order)
/// then fails the whole call.
pub(crate) async fn fetch_chunked<I, T, F, Fut>(
    items: &[I],
    concurrency: usize,
    operation: F,
) -> CacheContents<Vec<T>>
where
    F: Fn(&I) -> Fut,
    Fut: Future<Output = CacheContents<T>>,
{
    let concurrency = concurrency.max(1);
    let mut output = Vec::with_capacity(items.len());

    for chunk in items.chunks(concurrency) {
        let settled = futures::future::join_all(chunk.iter().map(&operation)).await;
        for result in settled {
            output.push(result?);
        }
    }

    Ok(output)
}

impl CatalogService {
    /// Fetches the detail records for `references` under a fixed concurrency
    /// ceiling.
    ///
    /// Results are returned in canonical ascending-id order, independent of
    /// input order and network completion order. One unrecoverable item
    /// failure fails the whole batch.
    pub async fn batch_fetch(
        self: &Arc<Self>,
        references: &[IndexReference],
        concurrency: usize,
    ) -> CacheContents<Vec<Arc<CatalogEntry>>> {
        let mut entries = fetch_chunked(references, concurrency, |reference| {
            let this = Arc::clone(self);
            let url = reference.url.clone();
            async move { this.fetch_by_url(&url).await }
        })
        .await?;

        entries.sort_by_key(|entry| entry.id);
        tracing::debug!(
            requested = references.len(),
            fetched = entries.len(),
            concurrency,
            "batch fetch settled"
        );
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::caching::CacheError;

    /// Tracks how many operations are unsettled at once.
    #[derive(Default)]
    struct Watermark {
        current: AtomicUsize,
        max: AtomicUsize,
    }

    impl Watermark {
        fn enter(&self) {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.max.fetch_max(now, Ordering::SeqCst);
        }

        fn exit(&self) {
            self.current.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_ceiling() {
        let items: Vec<u32> = (0..10).collect();
        let watermark = Watermark::default();

        let result = fetch_chunked(&items, 3, |&n| {
            let watermark = &watermark;
            async move {
                watermark.enter();
                tokio::time::sleep(std::time::Duration::from_millis(10 + u64::from(n))).await;
                watermark.exit();
                Ok(n)
            }
        })
        .await
        .unwrap();

        assert_eq!(result, items);
        assert_eq!(watermark.max.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_chunk_settles_fully_on_failure() {
        let items: Vec<u32> = (0..4).collect();
        let completed = AtomicUsize::new(0);

        let result = fetch_chunked(&items, 4, |&n| {
            let completed = &completed;
            async move {
                tokio::task::yield_now().await;
                completed.fetch_add(1, Ordering::SeqCst);
                if n == 1 {
                    Err(CacheError::Fetch("boom".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Err(CacheError::Fetch("boom".into())));
        // the failing chunk still ran every operation to completion
        assert_eq!(completed.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_zero_concurrency_is_clamped() {
        let items = [1u32, 2];
        let result = fetch_chunked(&items, 0, |&n| async move { Ok(n) })
            .await
            .unwrap();
        assert_eq!(result, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let items: [u32; 0] = [];
        let result = fetch_chunked(&items, 3, |&n| async move { Ok(n) })
            .await
            .unwrap();
        assert!(result.is_empty());
    }
}
