//! Cache keys and content-derived image file names.
//!
//! Two independent naming schemes live here:
//!
//! - [`CacheKey`] identifies everything derived from one query at one cache
//!   generation (result markup, collection manifest, image list).
//! - [`ImageFile`] identifies a source image on disk by a hash of its
//!   reference, sharded into a two-character subdirectory.
//!
//! Image file names must stay stable across releases because the collection
//! manifest embeds them in `Source="dzimages/{shard}/{file}.xml"`, which the
//! viewer resolves against the server.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};

/// Shard used for file names too short to slice.
pub const DEFAULT_SHARD: &str = "aa";

// =============================================================================
// Cache Key
// =============================================================================

/// Non-negative key for entries in the `result` and `manifest` namespaces.
///
/// The key folds in the cache generation (last invalidation time), so a key
/// minted before an invalidation is never handed out again afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(u64);

impl CacheKey {
    /// Derive a key from the logical query, its entity bound and the cache
    /// generation in milliseconds.
    pub fn derive(query: &str, max_entities: usize, generation_millis: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(query.as_bytes());
        hasher.update(max_entities.to_string().as_bytes());
        hasher.update(generation_millis.to_string().as_bytes());
        let digest = hasher.finalize();

        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        CacheKey(u64::from_be_bytes(head) >> 1)
    }

    pub fn from_raw(raw: u64) -> Self {
        CacheKey(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CacheKey {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(CacheKey)
    }
}

// =============================================================================
// Image File Naming
// =============================================================================

/// 32-bit string hash with wrapping arithmetic over UTF-16 code units
/// (`h = 31 * h + unit`).
///
/// This is the hash the deployed image cache layout was created with.
pub fn string_hash32(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}

/// On-disk identity of a cached source image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageFile {
    name: String,
    shard: String,
}

impl ImageFile {
    /// Name the cache file for an image reference.
    pub fn for_reference(reference: &str) -> Self {
        Self::from_name(string_hash32(reference).to_string())
    }

    /// Rebuild an `ImageFile` from a file name, e.g. one parsed from a URL.
    pub fn from_name(name: impl Into<String>) -> Self {
        let name = name.into();
        let shard = shard_for(&name);
        Self { name, shard }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shard(&self) -> &str {
        &self.shard
    }

    /// Relative descriptor path as it appears in collection manifests.
    pub fn source_path(&self) -> String {
        format!("dzimages/{}/{}.xml", self.shard, self.name)
    }
}

/// Characters 6..8 of the file name, or [`DEFAULT_SHARD`] for short names.
pub fn shard_for(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() > 8 {
        chars[6..8].iter().collect()
    } else {
        DEFAULT_SHARD.to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================
