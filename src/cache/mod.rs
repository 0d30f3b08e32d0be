//! Caching layer.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  CacheStore (disk, per namespace)       │
//! │  resultCache / collectionCache /        │
//! │  imageCache/{shard}/{file}              │
//! └─────────────────────────────────────────┘
//! ┌─────────────────────────────────────────┐
//! │  DecodedImageCache (memory, LRU + TTL)  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! - [`CacheStore`]: namespaced byte/line store with generation-based invalidation
//! - [`CacheKey`]: query-derived key for result and manifest entries
//! - [`ImageFile`]: content-hash file name and shard for a source image
//! - [`DecodedImageCache`]: bounded cache of decoded bitmaps for tile composition

mod decoded;
mod key;
mod store;

pub use decoded::{
    DecodedImageCache, DEFAULT_DECODE_CACHE_ENTRIES, DEFAULT_DECODE_TTL, DEFAULT_FAILURE_TTL,
};
pub use key::{shard_for, string_hash32, CacheKey, ImageFile, DEFAULT_SHARD};
pub use store::{now_millis, CacheNamespace, CacheStore, CACHE_ROOT_DIR};
