use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use super::{CacheContents, CacheKey};

type SharedOperation<T> = Shared<BoxFuture<'static, CacheContents<T>>>;

/// Tracks one pending asynchronous operation per logical key.
///
/// Concurrent callers for the same key share a single underlying operation
/// and all observe the same settled value or the same error. The registration
/// is removed inside the shared future itself, after the inner operation has
/// settled but before the result reaches any waiter — so a finished operation
/// can never be joined, and the registry never leaks entries on any exit path.
///
/// Cancellation is cooperative: dropping all waiters merely leaves the
/// operation parked until the next caller for that key polls it forward.
pub struct InFlightRegistry<T> {
    operations: Mutex<HashMap<CacheKey, SharedOperation<T>>>,
}

impl<T> std::fmt::Debug for InFlightRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self.operations.lock().map(|o| o.len()).unwrap_or_default();
        f.debug_struct("InFlightRegistry")
            .field("pending", &pending)
            .finish()
    }
}

impl<T> Default for InFlightRegistry<T> {
    fn default() -> Self {
        Self {
            operations: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> InFlightRegistry<T> {
    /// Joins the pending operation for `key`, or starts a new one.
    ///
    /// The factory is only invoked when no operation is registered for the
    /// key. The returned future is shared; awaiting it yields the operation's
    /// settled result.
    pub fn join_or_start<F>(self: &Arc<Self>, key: CacheKey, factory: F) -> SharedOperation<T>
    where
        F: FnOnce() -> BoxFuture<'static, CacheContents<T>>,
    {
        let mut operations = self.operations.lock().unwrap();
        if let Some(pending) = operations.get(&key) {
            tracing::trace!(%key, "joining in-flight operation");
            return pending.clone();
        }

        let registry = Arc::clone(self);
        let done_key = key.clone();
        let inner = factory();
        let operation = async move {
            let result = inner.await;
            // Deregister before resolving: once any waiter sees the result,
            // a new request for this key must start a fresh operation.
            registry.operations.lock().unwrap().remove(&done_key);
            result
        }
        .boxed()
        .shared();

        operations.insert(key, operation.clone());
        operation
    }

    /// The number of operations currently in flight.
    pub fn len(&self) -> usize {
        self.operations.lock().unwrap().len()
    }

    /// Whether no operation is in flight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::caching::CacheError;

    #[tokio::test]
    async fn test_single_execution() {
        let registry: Arc<InFlightRegistry<u32>> = Arc::new(Default::default());
        let executions = Arc::new(AtomicUsize::new(0));

        let key = CacheKey::for_entry("25");
        let mut waiters = Vec::new();
        for _ in 0..5 {
            let executions = Arc::clone(&executions);
            waiters.push(registry.join_or_start(key.clone(), move || {
                async move {
                    executions.fetch_add(1, Ordering::Relaxed);
                    tokio::task::yield_now().await;
                    Ok(42)
                }
                .boxed()
            }));
        }
        assert_eq!(registry.len(), 1);

        let results = futures::future::join_all(waiters).await;
        assert!(results.iter().all(|r| *r == Ok(42)));
        assert_eq!(executions.load(Ordering::Relaxed), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_error_fans_out() {
        let registry: Arc<InFlightRegistry<u32>> = Arc::new(Default::default());
        let key = CacheKey::for_entry("7");

        let first = registry.join_or_start(key.clone(), || {
            async { Err(CacheError::Fetch("boom".into())) }.boxed()
        });
        let second = registry.join_or_start(key.clone(), || {
            unreachable!("second caller must join, not start")
        });

        let (a, b) = futures::join!(first, second);
        assert_eq!(a, Err(CacheError::Fetch("boom".into())));
        assert_eq!(a, b);

        // after failure the slot is free again
        assert!(registry.is_empty());
        let retry = registry.join_or_start(key, || async { Ok(1) }.boxed());
        assert_eq!(retry.await, Ok(1));
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_coalesce() {
        let registry: Arc<InFlightRegistry<u32>> = Arc::new(Default::default());
        let executions = Arc::new(AtomicUsize::new(0));

        for key in [CacheKey::for_entry("25"), CacheKey::for_index(25)] {
            let executions = Arc::clone(&executions);
            registry
                .join_or_start(key, move || {
                    async move {
                        executions.fetch_add(1, Ordering::Relaxed);
                        Ok(0)
                    }
                    .boxed()
                })
                .await
                .unwrap();
        }
        assert_eq!(executions.load(Ordering::Relaxed), 2);
    }
}
