//! In-memory fragment index cache.
//!
//! Caches parsed fragment indexes per file so the `mfra` trailer is read once
//! rather than on every segment request. Concurrent requests for the same
//! file share a single build.

use dashmap::DashMap;
use hippo_media::FragmentIndex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::OnceCell;

type Slot = Arc<OnceCell<Arc<FragmentIndex>>>;

/// Entry in the index cache.
struct CacheEntry {
    slot: Slot,
    file_modified: SystemTime,
    last_accessed: Instant,
}

impl CacheEntry {
    fn new(file_modified: SystemTime) -> Self {
        Self {
            slot: Arc::new(OnceCell::new()),
            file_modified,
            last_accessed: Instant::now(),
        }
    }
}

/// Thread-safe cache of fragment indexes keyed by file path.
pub struct IndexCache {
    entries: DashMap<PathBuf, CacheEntry>,
    max_entries: usize,
    ttl: Duration,
}

impl IndexCache {
    /// Create a new index cache.
    pub fn new(max_entries: usize, ttl_secs: u64) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    /// Get the index for `path`, parsing the file if it is not cached or has
    /// changed since it was cached.
    pub async fn get_or_load(&self, path: &Path) -> hippo_media::Result<Arc<FragmentIndex>> {
        self.get_or_try_insert_with(path, FragmentIndex::open).await
    }

    /// Get the index for `path`, building it with `build` on the blocking
    /// pool when needed.
    ///
    /// Callers racing on the same path wait for one build. A failed build
    /// leaves the slot empty, so the next caller tries again.
    pub async fn get_or_try_insert_with<F>(
        &self,
        path: &Path,
        build: F,
    ) -> hippo_media::Result<Arc<FragmentIndex>>
    where
        F: FnOnce(PathBuf) -> hippo_media::Result<FragmentIndex> + Send + 'static,
    {
        let file_modified = tokio::fs::metadata(path)
            .await?
            .modified()
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let slot = self.slot_for(path, file_modified);

        let index = slot
            .get_or_try_init(|| async {
                let owned = path.to_path_buf();
                tracing::debug!(path = %path.display(), "building fragment index");
                let index = tokio::task::spawn_blocking(move || build(owned))
                    .await
                    .map_err(|e| hippo_media::Error::Io(std::io::Error::other(e)))??;
                Ok::<_, hippo_media::Error>(Arc::new(index))
            })
            .await?;

        Ok(Arc::clone(index))
    }

    /// The cell for `path`, replacing it if the file changed or it expired.
    fn slot_for(&self, path: &Path, file_modified: SystemTime) -> Slot {
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(path) {
            self.evict_oldest();
        }

        let mut entry = self
            .entries
            .entry(path.to_path_buf())
            .or_insert_with(|| CacheEntry::new(file_modified));

        if entry.file_modified != file_modified || entry.last_accessed.elapsed() >= self.ttl {
            tracing::debug!(path = %path.display(), "fragment index is stale");
            *entry = CacheEntry::new(file_modified);
        }
        entry.last_accessed = Instant::now();

        Arc::clone(&entry.slot)
    }

    /// Get a built index if it exists in cache.
    pub fn get(&self, path: &Path) -> Option<Arc<FragmentIndex>> {
        self.entries.get_mut(path).and_then(|mut entry| {
            entry.last_accessed = Instant::now();
            entry.slot.get().cloned()
        })
    }

    /// Remove an entry from the cache.
    pub fn remove(&self, path: &Path) {
        self.entries.remove(path);
    }

    /// Get the number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove expired entries, returning how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.duration_since(entry.last_accessed) < self.ttl);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, "cleaned up expired fragment indexes");
        }
        removed
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.last_accessed)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            tracing::trace!(path = %key.display(), "evicting fragment index");
            self.entries.remove(&key);
        }
    }
}

impl Default for IndexCache {
    fn default() -> Self {
        // Default: 256 entries, 1 hour TTL
        Self::new(256, 3600)
    }
}

/// Start a background task that periodically prunes expired entries.
pub fn start_cleanup_task(cache: Arc<IndexCache>, interval_secs: u64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            cache.cleanup_expired();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hippo_media::fixture::FragmentedFileBuilder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn write_fixture(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        FragmentedFileBuilder::new()
            .fragment(1, 0, 100)
            .fragment(1, 1000, 100)
            .build()
            .write_to(&path)
            .unwrap();
        path
    }

    #[tokio::test]
    async fn test_cache_insert_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "a.mp4");
        let cache = IndexCache::new(10, 3600);

        let index = cache.get_or_load(&path).await.unwrap();
        assert_eq!(index.tracks.len(), 1);
        assert_eq!(cache.len(), 1);

        let cached = cache.get(&path).unwrap();
        assert!(Arc::ptr_eq(&index, &cached));
    }

    #[tokio::test]
    async fn test_second_lookup_does_not_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "a.mp4");
        let cache = IndexCache::new(10, 3600);
        let builds = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = Arc::clone(&builds);
            cache
                .get_or_try_insert_with(&path, move |p| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    FragmentIndex::open(p)
                })
                .await
                .unwrap();
        }

        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_build_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.bin");
        std::fs::write(&path, vec![0u8; 64]).unwrap();
        let cache = IndexCache::new(10, 3600);

        assert!(cache.get_or_load(&path).await.is_err());
        assert!(cache.get(&path).is_none());

        write_fixture(dir.path(), "plain.bin");
        // mtime granularity may hide the rewrite, so force a rebuild
        cache.remove(&path);
        assert!(cache.get_or_load(&path).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let cache = IndexCache::default();
        let err = cache
            .get_or_load(Path::new("/nonexistent/hippo/file.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, hippo_media::Error::Io(_)));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_cache_eviction() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IndexCache::new(2, 3600);

        for i in 0..3 {
            let path = write_fixture(dir.path(), &format!("f{}.mp4", i));
            cache.get_or_load(&path).await.unwrap();
        }

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&dir.path().join("f0.mp4")).is_none());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "a.mp4");
        let cache = IndexCache::new(10, 0);

        cache.get_or_load(&path).await.unwrap();
        assert_eq!(cache.cleanup_expired(), 1);
        assert!(cache.is_empty());
    }
}
