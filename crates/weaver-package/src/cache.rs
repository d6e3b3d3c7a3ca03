use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, OnceCell};

use crate::model::{PackageDescription, PackageError};

struct Entry {
    cell: Arc<OnceCell<Result<PackageDescription, String>>>,
    fetched_at: Instant,
}

/// A read-mostly, single-flight package description cache keyed by URL.
///
/// At most one concurrent fetch happens per URL: concurrent callers for the
/// same key await the same in-flight `OnceCell`. Entries older than `ttl` are
/// refetched on next access rather than served stale.
pub struct PackageCache {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
}

impl PackageCache {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: Mutex::new(HashMap::new()), ttl }
    }

    pub async fn get_or_fetch<F, Fut>(&self, url: &str, fetch: F) -> Result<PackageDescription, PackageError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<PackageDescription, PackageError>>,
    {
        let cell = {
            let mut entries = self.entries.lock().await;
            let needs_refresh = entries
                .get(url)
                .map(|e| e.fetched_at.elapsed() > self.ttl)
                .unwrap_or(true);
            if needs_refresh {
                entries.insert(
                    url.to_string(),
                    Entry { cell: Arc::new(OnceCell::new()), fetched_at: Instant::now() },
                );
            }
            entries.get(url).unwrap().cell.clone()
        };

        let result = cell
            .get_or_init(|| async { fetch().await.map_err(|e| e.to_string()) })
            .await;
        result.clone().map_err(PackageError::ParseError)
    }

    pub async fn invalidate(&self, url: &str) {
        self.entries.lock().await.remove(url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn single_flight_only_fetches_once_per_key() {
        let cache = PackageCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        let make_fetch = |calls: Arc<AtomicUsize>| {
            move || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    crate::model::parse_package(Some("json"), r#"{"class":"CommandLineTool"}"#)
                }
            }
        };

        let a = cache.get_or_fetch("http://x/package", make_fetch(calls.clone()));
        let b = cache.get_or_fetch("http://x/package", make_fetch(calls.clone()));
        let (r1, r2) = tokio::join!(a, b);
        r1.unwrap();
        r2.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let cache = PackageCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));
        let make_fetch = |calls: Arc<AtomicUsize>| {
            move || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    crate::model::parse_package(Some("json"), r#"{"class":"CommandLineTool"}"#)
                }
            }
        };
        cache.get_or_fetch("http://x/package", make_fetch(calls.clone())).await.unwrap();
        cache.invalidate("http://x/package").await;
        cache.get_or_fetch("http://x/package", make_fetch(calls.clone())).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
