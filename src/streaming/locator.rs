//! Resolving `(file, track, time)` to the byte range of a movie fragment.

use super::index_cache::{start_cleanup_task, IndexCache};
use crate::config::IndexConfig;
use hippo_media::{EndStrategy, FragmentByteRange, FragmentIndex};
use std::path::Path;
use std::sync::Arc;

/// Resolves fragment ranges with the configured end strategy, optionally
/// reusing parsed indexes between requests.
#[derive(Clone)]
pub struct FragmentLocator {
    strategy: EndStrategy,
    cache: Option<Arc<IndexCache>>,
}

impl FragmentLocator {
    /// A locator that reparses the trailer on every request.
    pub fn uncached(strategy: EndStrategy) -> Self {
        Self {
            strategy,
            cache: None,
        }
    }

    /// A locator backed by an [`IndexCache`].
    pub fn cached(strategy: EndStrategy, cache: Arc<IndexCache>) -> Self {
        Self {
            strategy,
            cache: Some(cache),
        }
    }

    /// Build the locator described by `config`.
    pub fn from_config(config: &IndexConfig) -> Self {
        if config.cache_enabled {
            let cache = IndexCache::new(config.cache_max_entries, config.cache_ttl_secs);
            Self::cached(config.end_strategy, Arc::new(cache))
        } else {
            Self::uncached(config.end_strategy)
        }
    }

    /// Spawn the periodic expiry task for the cache, if there is one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_cleanup(&self, interval_secs: u64) -> Option<tokio::task::JoinHandle<()>> {
        self.cache
            .as_ref()
            .map(|cache| start_cleanup_task(Arc::clone(cache), interval_secs))
    }

    pub fn strategy(&self) -> EndStrategy {
        self.strategy
    }

    pub fn cache(&self) -> Option<&Arc<IndexCache>> {
        self.cache.as_ref()
    }

    /// Resolve the fragment of `track_id` starting at `time` in `path`.
    ///
    /// File reads run on the blocking pool; the file is closed before this
    /// returns, whether or not resolution succeeded.
    pub async fn locate(
        &self,
        path: &Path,
        track_id: u32,
        time: u64,
    ) -> hippo_media::Result<FragmentByteRange> {
        let strategy = self.strategy;
        let owned = path.to_path_buf();

        let range = match &self.cache {
            None => {
                blocking(move || hippo_media::resolve_with(&owned, track_id, time, strategy)).await?
            }
            Some(cache) => {
                let index = cache.get_or_load(path).await?;
                match strategy {
                    EndStrategy::NextEntryBoundary => index.next_entry_boundary(track_id, time)?,
                    EndStrategy::ScanToMdat => {
                        blocking(move || locate_in(&index, &owned, track_id, time)).await?
                    }
                }
            }
        };

        tracing::trace!(
            path = %path.display(),
            track_id,
            time,
            range = %range,
            "resolved fragment"
        );
        Ok(range)
    }
}

fn locate_in(
    index: &FragmentIndex,
    path: &Path,
    track_id: u32,
    time: u64,
) -> hippo_media::Result<FragmentByteRange> {
    let mut file = std::fs::File::open(path)?;
    index.locate(&mut file, track_id, time, EndStrategy::ScanToMdat)
}

async fn blocking<T, F>(f: F) -> hippo_media::Result<T>
where
    F: FnOnce() -> hippo_media::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| hippo_media::Error::Io(std::io::Error::other(e)))?
}
