//! Attribute and content caches.
//!
//! Both caches are TTL-expiring maps; mutating handlers invalidate the
//! affected path eagerly so a follow-up GETATTR observes the mutation
//! even before the TTL lapses. With caching disabled every lookup is a
//! miss and the handlers go straight to the filesystem.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;

use crate::vfs::FileInfo;

/// Default time-to-live for cached attributes.
pub const ATTR_TTL: Duration = Duration::from_secs(30);
/// Default time-to-live for cached file content.
pub const CONTENT_TTL: Duration = Duration::from_secs(60);

/// TTL cache of [`FileInfo`] keyed by path.
pub struct AttrCache {
    inner: Option<Cache<PathBuf, FileInfo>>,
}

impl AttrCache {
    /// An enabled cache holding up to `capacity` entries for `ttl`.
    pub fn new(capacity: u64, ttl: Duration) -> AttrCache {
        AttrCache {
            inner: Some(Cache::builder().max_capacity(capacity).time_to_live(ttl).build()),
        }
    }

    /// A cache that never hits; used when caching is configured off.
    pub fn disabled() -> AttrCache {
        AttrCache { inner: None }
    }

    pub fn get(&self, path: &Path) -> Option<FileInfo> {
        self.inner.as_ref()?.get(path)
    }

    pub fn insert(&self, path: &Path, info: FileInfo) {
        if let Some(cache) = &self.inner {
            cache.insert(path.to_path_buf(), info);
        }
    }

    pub fn invalidate(&self, path: &Path) {
        if let Some(cache) = &self.inner {
            cache.invalidate(path);
        }
    }
}

/// TTL cache of READ results keyed by `(path, offset, count)`. The value
/// also carries the EOF flag observed at fill time.
pub struct ContentCache {
    inner: Option<Cache<(PathBuf, u64, u32), (Arc<Vec<u8>>, bool)>>,
}

impl ContentCache {
    pub fn new(capacity: u64, ttl: Duration) -> ContentCache {
        ContentCache {
            inner: Some(
                Cache::builder()
                    .max_capacity(capacity)
                    .time_to_live(ttl)
                    .support_invalidation_closures()
                    .build(),
            ),
        }
    }

    pub fn disabled() -> ContentCache {
        ContentCache { inner: None }
    }

    pub fn get(&self, path: &Path, offset: u64, count: u32) -> Option<(Arc<Vec<u8>>, bool)> {
        self.inner.as_ref()?.get(&(path.to_path_buf(), offset, count))
    }

    pub fn insert(&self, path: &Path, offset: u64, count: u32, data: Arc<Vec<u8>>, eof: bool) {
        if let Some(cache) = &self.inner {
            cache.insert((path.to_path_buf(), offset, count), (data, eof));
        }
    }

    /// Drops every cached range of `path`.
    pub fn invalidate(&self, path: &Path) {
        if let Some(cache) = &self.inner {
            let path = path.to_path_buf();
            let _ = cache.invalidate_entries_if(move |key, _| key.0 == path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attr_cache_hits_until_invalidated() {
        let cache = AttrCache::new(100, Duration::from_secs(30));
        let path = Path::new("/srv/export/file");
        assert!(cache.get(path).is_none());
        cache.insert(path, FileInfo { size: 12, ..FileInfo::default() });
        assert_eq!(cache.get(path).unwrap().size, 12);
        cache.invalidate(path);
        assert!(cache.get(path).is_none());
    }

    #[test]
    fn disabled_cache_never_hits() {
        let cache = AttrCache::disabled();
        let path = Path::new("/srv/export/file");
        cache.insert(path, FileInfo::default());
        assert!(cache.get(path).is_none());
    }

    #[test]
    fn content_cache_round_trip() {
        let cache = ContentCache::new(100, Duration::from_secs(60));
        let path = Path::new("/srv/export/file");
        cache.insert(path, 0, 5, Arc::new(b"hello".to_vec()), true);
        let (data, eof) = cache.get(path, 0, 5).unwrap();
        assert_eq!(data.as_slice(), b"hello");
        assert!(eof);
        assert!(cache.get(path, 1, 5).is_none());
    }
}
