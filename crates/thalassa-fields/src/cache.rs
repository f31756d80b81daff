//! Day-bundle cache.
//!
//! Holds the N most recently activated day bundles. The day fetched most
//! recently is at the head of the LRU order and is therefore never the
//! eviction victim while it is the step's pinned day. Concurrent
//! requests for the same day share one in-flight future; a failed load
//! is reported to every waiter and leaves no cache residue.

use chrono::NaiveDate;
use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use thalassa_core::EngineError;

/// Default residency for both archives.
pub const DEFAULT_DAY_CAPACITY: usize = 3;

type SharedLoad<T> = Shared<BoxFuture<'static, Result<Arc<T>, EngineError>>>;

pub struct DayCache<T: Send + Sync + 'static> {
    archive: &'static str,
    capacity: usize,
    inner: Mutex<Inner<T>>,
}

struct Inner<T: Send + Sync + 'static> {
    resident: LruCache<NaiveDate, Arc<T>>,
    in_flight: HashMap<NaiveDate, SharedLoad<T>>,
}

impl<T: Send + Sync + 'static> DayCache<T> {
    pub fn new(archive: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let cap = NonZeroUsize::new(capacity).expect("capacity clamped to >= 1");
        Self {
            archive,
            capacity,
            inner: Mutex::new(Inner {
                resident: LruCache::new(cap),
                in_flight: HashMap::new(),
            }),
        }
    }

    /// Return the resident bundle for `date`, loading it if necessary.
    ///
    /// The loader future runs at most once per date regardless of how
    /// many callers race; all of them receive the same result.
    pub async fn get_or_load<F>(&self, date: NaiveDate, load: F) -> Result<Arc<T>, EngineError>
    where
        F: FnOnce() -> BoxFuture<'static, Result<T, EngineError>>,
    {
        let shared = {
            let mut inner = self.inner.lock().await;
            if let Some(hit) = inner.resident.get(&date) {
                return Ok(hit.clone());
            }
            if let Some(existing) = inner.in_flight.get(&date) {
                existing.clone()
            } else {
                debug!(archive = self.archive, %date, "loading day bundle");
                let fut: SharedLoad<T> = load().map(|r| r.map(Arc::new)).boxed().shared();
                inner.in_flight.insert(date, fut.clone());
                fut
            }
        };

        let result = shared.await;

        let mut inner = self.inner.lock().await;
        inner.in_flight.remove(&date);
        match result {
            Ok(bundle) => {
                let evicting =
                    inner.resident.len() == self.capacity && !inner.resident.contains(&date);
                if evicting {
                    metrics::counter!(
                        "thalassa_day_cache_evictions_total",
                        "archive" => self.archive
                    )
                    .increment(1);
                }
                if inner.resident.put(date, bundle.clone()).is_none() {
                    metrics::counter!(
                        "thalassa_days_loaded_total",
                        "archive" => self.archive
                    )
                    .increment(1);
                }
                Ok(bundle)
            }
            Err(e) => {
                warn!(archive = self.archive, %date, error = %e, "day load failed");
                Err(e)
            }
        }
    }

    /// Resident-day count, for diagnostics and tests.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.resident.len()
    }

    pub async fn contains(&self, date: NaiveDate) -> bool {
        self.inner.lock().await.resident.contains(&date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2011, 3, d).expect("valid literal date")
    }

    #[tokio::test]
    async fn loads_once_and_serves_hits() {
        let cache: DayCache<u64> = DayCache::new("test", 3);
        let loads = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let loads = loads.clone();
            let value = cache
                .get_or_load(day(11), move || {
                    async move {
                        loads.fetch_add(1, Ordering::SeqCst);
                        Ok(42u64)
                    }
                    .boxed()
                })
                .await
                .expect("load");
            assert_eq!(*value, 42);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_load() {
        let cache: Arc<DayCache<u64>> = Arc::new(DayCache::new("test", 3));
        let loads = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let loads = loads.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_load(day(12), move || {
                        async move {
                            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                            loads.fetch_add(1, Ordering::SeqCst);
                            Ok(7u64)
                        }
                        .boxed()
                    })
                    .await
            }));
        }
        for h in handles {
            let v = h.await.expect("join").expect("load");
            assert_eq!(*v, 7);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn evicts_least_recently_activated() {
        let cache: DayCache<u32> = DayCache::new("test", 2);
        for d in 11..=13 {
            cache
                .get_or_load(day(d), move || async move { Ok(d) }.boxed())
                .await
                .expect("load");
        }
        assert_eq!(cache.len().await, 2);
        assert!(!cache.contains(day(11)).await);
        assert!(cache.contains(day(12)).await);
        assert!(cache.contains(day(13)).await);
    }

    #[tokio::test]
    async fn most_recently_used_survives_eviction() {
        let cache: DayCache<u32> = DayCache::new("test", 2);
        for d in 11..=12 {
            cache
                .get_or_load(day(d), move || async move { Ok(d) }.boxed())
                .await
                .expect("load");
        }
        // touch day 11 so day 12 becomes the victim
        cache
            .get_or_load(day(11), move || async move { Ok(11) }.boxed())
            .await
            .expect("hit");
        cache
            .get_or_load(day(13), move || async move { Ok(13) }.boxed())
            .await
            .expect("load");
        assert!(cache.contains(day(11)).await);
        assert!(!cache.contains(day(12)).await);
    }

    #[tokio::test]
    async fn failed_load_leaves_no_residue() {
        let cache: DayCache<u32> = DayCache::new("test", 2);
        let result = cache
            .get_or_load(day(14), || {
                async { Err(EngineError::DataUnavailable("no file".into())) }.boxed()
            })
            .await;
        assert!(result.is_err());
        assert_eq!(cache.len().await, 0);

        // the date can be retried and succeed
        let v = cache
            .get_or_load(day(14), || async { Ok(5u32) }.boxed())
            .await
            .expect("retry");
        assert_eq!(*v, 5);
    }
}
