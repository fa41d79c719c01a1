//! Bounded cache of decoded thumbnails.

use std::num::NonZeroUsize;
use std::sync::Arc;

use image::RgbaImage;
use lru::LruCache;

/// Default number of decoded thumbnails kept in memory.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// A decoded, possibly downscaled thumbnail, shared by every item showing it.
pub type Thumbnail = Arc<RgbaImage>;

/// Identifies one thumbnail: the same file at another box size is another entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThumbnailKey {
    pub path: String,
    pub width: u32,
    pub height: u32,
}

impl ThumbnailKey {
    pub fn new(path: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            path: path.into(),
            width,
            height,
        }
    }
}

/// LRU cache of thumbnails with hit and miss counters.
pub struct ThumbnailCache {
    entries: LruCache<ThumbnailKey, Thumbnail>,
    hits: u64,
    misses: u64,
}

impl ThumbnailCache {
    /// Creates a cache holding at most `capacity` thumbnails (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Looks up a thumbnail and marks it recently used. Counts toward hit/miss stats.
    pub fn get(&mut self, key: &ThumbnailKey) -> Option<Thumbnail> {
        match self.entries.get(key) {
            Some(thumbnail) => {
                self.hits += 1;
                Some(Arc::clone(thumbnail))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Checks presence without touching recency or stats.
    pub fn contains(&self, key: &ThumbnailKey) -> bool {
        self.entries.contains(key)
    }

    pub fn insert(&mut self, key: ThumbnailKey, thumbnail: Thumbnail) {
        if let Some((evicted, _)) = self.entries.push(key.clone(), thumbnail)
            && evicted != key
        {
            log::debug!("thumbnail cache: evicted {}", evicted.path);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for ThumbnailCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
