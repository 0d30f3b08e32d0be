//! In-memory cache of decoded source images.
//!
//! Tile composition decodes the same source images over and over as a viewer
//! pans and zooms. This cache keeps decoded bitmaps keyed by their cache file
//! name so each image is decoded once per burst.
//!
//! # Eviction
//!
//! The cache is bounded by entry count (LRU) and every entry carries a
//! time-to-live. Decode failures are cached as a 1x1 placeholder with a
//! shorter TTL, so a broken source is not re-decoded on every tile yet gets
//! another chance once it may have been re-acquired.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{Rgb, RgbImage};
use lru::LruCache;
use tokio::sync::RwLock;

/// Default maximum number of decoded images held in memory.
pub const DEFAULT_DECODE_CACHE_ENTRIES: usize = 2048;

/// Default lifetime of a successfully decoded image.
pub const DEFAULT_DECODE_TTL: Duration = Duration::from_secs(600);

/// Default lifetime of a cached decode failure.
pub const DEFAULT_FAILURE_TTL: Duration = Duration::from_secs(30);

struct Entry {
    image: Arc<RgbImage>,
    inserted: Instant,
    failed: bool,
}

/// Bounded LRU + TTL cache of decoded bitmaps.
///
/// # Thread Safety
///
/// The cache is shared by all tile requests via `Arc`. Two requests may decode
/// the same image concurrently; the last insert wins, which is harmless since
/// both decoded the same file.
pub struct DecodedImageCache {
    cache: RwLock<LruCache<String, Entry>>,
    ttl: Duration,
    failure_ttl: Duration,
}

impl DecodedImageCache {
    pub fn new() -> Self {
        Self::with_limits(
            DEFAULT_DECODE_CACHE_ENTRIES,
            DEFAULT_DECODE_TTL,
            DEFAULT_FAILURE_TTL,
        )
    }

    /// Create a cache with explicit bounds.
    ///
    /// # Arguments
    ///
    /// * `max_entries` - Maximum number of images (clamped to at least 1)
    /// * `ttl` - Lifetime of successfully decoded images
    /// * `failure_ttl` - Lifetime of cached decode failures
    pub fn with_limits(max_entries: usize, ttl: Duration, failure_ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: RwLock::new(LruCache::new(capacity)),
            ttl,
            failure_ttl,
        }
    }

    /// Look up a decoded image, dropping it if its TTL has elapsed.
    pub async fn get(&self, name: &str) -> Option<Arc<RgbImage>> {
        let mut cache = self.cache.write().await;
        let entry = cache.get(name)?;
        let ttl = if entry.failed {
            self.failure_ttl
        } else {
            self.ttl
        };
        if entry.inserted.elapsed() < ttl {
            return Some(Arc::clone(&entry.image));
        }

        cache.pop(name);
        None
    }

    /// Cache a successfully decoded image.
    pub async fn insert(&self, name: impl Into<String>, image: RgbImage) -> Arc<RgbImage> {
        self.put(name.into(), image, false).await
    }

    /// Cache a decode failure as a 1x1 bitmap in `background`.
    pub async fn insert_failure(&self, name: impl Into<String>, background: Rgb<u8>) -> Arc<RgbImage> {
        self.put(name.into(), RgbImage::from_pixel(1, 1, background), true)
            .await
    }

    async fn put(&self, name: String, image: RgbImage, failed: bool) -> Arc<RgbImage> {
        let image = Arc::new(image);
        let entry = Entry {
            image: Arc::clone(&image),
            inserted: Instant::now(),
            failed,
        };
        self.cache.write().await.put(name, entry);
        image
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.cache.read().await.len()
    }
}

impl Default for DecodedImageCache {
    fn default() -> Self {
        Self::new()
    }
}
