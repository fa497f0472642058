use super::{Index, IndexError};
use crate::storage::{DataFile, IndexFile};
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Identity of one version of a data file and its index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub path: PathBuf,
    pub data_modified: Option<SystemTime>,
    pub index_path: PathBuf,
    pub index_modified: Option<SystemTime>,
}

impl CacheKey {
    pub fn new(file: &DataFile, index: &IndexFile) -> Self {
        Self {
            path: file.path.clone(),
            data_modified: file.modified,
            index_path: index.path.clone(),
            index_modified: index.modified,
        }
    }

    fn version(&self) -> (Option<SystemTime>, Option<SystemTime>) {
        (self.data_modified, self.index_modified)
    }
}

/// Bounded LRU cache of parsed indexes.
///
/// Concurrent requests for the same key share one build. A build abandoned
/// by its caller is picked up by the next waiter. Failed builds are
/// remembered for `failure_ttl` so a broken index is not re-parsed on every
/// request. When a file's modification time changes, the entry for the
/// previous version is dropped.
pub struct IndexCache {
    ready: Cache<CacheKey, Arc<Index>>,
    failures: Cache<CacheKey, IndexError>,
    current: Mutex<HashMap<PathBuf, CacheKey>>,
    builds: AtomicU64,
}

impl IndexCache {
    pub fn new(capacity: u64, failure_ttl: Duration) -> Self {
        let ready = Cache::builder()
            .max_capacity(capacity)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        let failures = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(failure_ttl)
            .build();

        Self {
            ready,
            failures,
            current: Mutex::new(HashMap::new()),
            builds: AtomicU64::new(0),
        }
    }

    /// Number of builds started since creation.
    pub fn build_count(&self) -> u64 {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.ready.contains_key(key)
    }

    pub async fn get_or_build<F, Fut>(
        &self,
        key: CacheKey,
        build: F,
    ) -> Result<Arc<Index>, IndexError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Index, IndexError>>,
    {
        if let Some(index) = self.ready.get(&key).await {
            debug!(path = %key.path.display(), "index cache hit");
            return Ok(index);
        }
        if let Some(err) = self.failures.get(&key).await {
            debug!(path = %key.path.display(), error = %err, "index failure cached");
            return Err(err);
        }

        let result = self
            .ready
            .try_get_with(key.clone(), async {
                self.builds.fetch_add(1, Ordering::SeqCst);
                info!(path = %key.path.display(), index = %key.index_path.display(), "building index");
                build().await.map(Arc::new)
            })
            .await;

        match result {
            Ok(index) => {
                self.retire_previous(&key).await;
                Ok(index)
            }
            Err(err) => {
                let err = IndexError::clone(&err);
                warn!(path = %key.path.display(), error = %err, "index build failed");
                self.failures.insert(key, err.clone()).await;
                Err(err)
            }
        }
    }

    /// Record `key` as the live version of its file and drop whichever of it
    /// and the previous version is older. A slow build of an old version that
    /// finishes late is still returned to its caller but not kept.
    async fn retire_previous(&self, key: &CacheKey) {
        let stale = {
            let mut current = self.current.lock().await;
            let newer_known = current
                .get(&key.path)
                .is_some_and(|previous| previous.version() > key.version());
            if newer_known {
                Some(key.clone())
            } else {
                current
                    .insert(key.path.clone(), key.clone())
                    .filter(|previous| previous != key)
            }
        };

        if let Some(stale) = stale {
            debug!(path = %key.path.display(), "file changed, dropping stale index");
            self.ready.invalidate(&stale).await;
            self.failures.invalidate(&stale).await;
        }
    }
}
