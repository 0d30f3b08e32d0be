//! Disk-backed cache store.
//!
//! Entries live in one directory per [`CacheNamespace`] under a common root:
//!
//! ```text
//! <root>/resultCache/{key}                 result markup
//! <root>/collectionCache/{key}             collection manifest
//! <root>/imageCache/{key}                  image list, one reference per line
//! <root>/imageCache/{shard}/{file}         cached source image
//! ```
//!
//! The store never fails a caller. Read errors become misses and write errors
//! are logged; both degrade to "recompute next time".

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::CacheError;

use super::key::{CacheKey, ImageFile};

/// Directory name of the cache root inside the data directory.
pub const CACHE_ROOT_DIR: &str = "pivotCache";

// =============================================================================
// Namespaces
// =============================================================================

/// Typed sub-directory of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    /// Query results (pivot markup)
    Result,
    /// Deep Zoom collection manifests
    Manifest,
    /// Image lists and source image files
    Image,
}

impl CacheNamespace {
    pub fn dir_name(&self) -> &'static str {
        match self {
            CacheNamespace::Result => "resultCache",
            CacheNamespace::Manifest => "collectionCache",
            CacheNamespace::Image => "imageCache",
        }
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// =============================================================================
// Cache Store
// =============================================================================

/// Namespaced, disk-backed byte and line cache with coarse invalidation.
///
/// # Generations
///
/// The store remembers when it last invalidated (the *generation*) and when
/// the underlying data last changed. [`CacheStore::validate`] wipes the
/// `result` namespace whenever the data is newer than the generation and
/// advances the generation. Callers fold the generation into their
/// [`CacheKey`]s so keys are never reused across data versions.
pub struct CacheStore {
    root: PathBuf,
    last_invalidation: AtomicU64,
    last_data_modified: AtomicU64,
    tmp_counter: AtomicU64,
    validate_lock: Mutex<()>,
}

impl CacheStore {
    /// Create a store rooted at `root`. Directories are created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            last_invalidation: AtomicU64::new(now_millis()),
            last_data_modified: AtomicU64::new(0),
            tmp_counter: AtomicU64::new(0),
            validate_lock: Mutex::new(()),
        }
    }

    /// Create a store at `<data_dir>/pivotCache`.
    pub fn in_data_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::new(data_dir.as_ref().join(CACHE_ROOT_DIR))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn namespace_dir(&self, namespace: CacheNamespace) -> PathBuf {
        self.root.join(namespace.dir_name())
    }

    pub fn entry_path(&self, namespace: CacheNamespace, key: CacheKey) -> PathBuf {
        self.namespace_dir(namespace).join(key.to_string())
    }

    pub fn image_path(&self, file: &ImageFile) -> PathBuf {
        self.namespace_dir(CacheNamespace::Image)
            .join(file.shard())
            .join(file.name())
    }

    // -------------------------------------------------------------------------
    // Generation / invalidation
    // -------------------------------------------------------------------------

    /// Current cache generation (time of the last invalidation, in ms).
    pub fn generation(&self) -> u64 {
        self.last_invalidation.load(Ordering::SeqCst)
    }

    /// Record that the underlying data changed now.
    pub fn mark_data_modified(&self) {
        let stamp = now_millis().max(self.generation() + 1);
        self.last_data_modified.fetch_max(stamp, Ordering::SeqCst);
        debug!(stamp, "Underlying data marked as modified");
    }

    /// Invalidate derived results if the data changed since the last
    /// invalidation. Returns `true` if an invalidation happened.
    pub async fn validate(&self) -> bool {
        let _guard = self.validate_lock.lock().await;

        let modified = self.last_data_modified.load(Ordering::SeqCst);
        let generation = self.generation();
        if modified <= generation {
            return false;
        }

        self.invalidate_all(CacheNamespace::Result).await;
        let next = now_millis().max(modified);
        self.last_invalidation.store(next, Ordering::SeqCst);
        info!(generation = next, "Result cache invalidated");
        true
    }

    /// Recursively delete a namespace directory.
    pub async fn invalidate_all(&self, namespace: CacheNamespace) {
        let dir = self.namespace_dir(namespace);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(namespace = namespace.dir_name(), "Cache namespace cleared"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                namespace = namespace.dir_name(),
                error = %e,
                "Failed to clear cache namespace"
            ),
        }
    }

    // -------------------------------------------------------------------------
    // Keyed entries
    // -------------------------------------------------------------------------

    /// Store raw bytes. Failures are logged and swallowed.
    pub async fn put(&self, namespace: CacheNamespace, key: CacheKey, data: &[u8]) {
        let path = self.entry_path(namespace, key);
        if let Err(e) = self.write_atomic(&path, data).await {
            warn!(error = %e, "Cache write failed, entry will not be cached");
        }
    }

    /// Fetch raw bytes. Missing or unreadable entries are misses.
    pub async fn get(&self, namespace: CacheNamespace, key: CacheKey) -> Option<Bytes> {
        let path = self.entry_path(namespace, key);
        read_or_miss(&path).await
    }

    /// Store a list of lines, newline-terminated.
    pub async fn put_lines<S: AsRef<str>>(
        &self,
        namespace: CacheNamespace,
        key: CacheKey,
        lines: &[S],
    ) {
        let mut text = String::new();
        for line in lines {
            text.push_str(line.as_ref());
            text.push('\n');
        }
        self.put(namespace, key, text.as_bytes()).await;
    }

    /// Fetch a list of lines. Non-UTF-8 content is logged and treated as a miss.
    pub async fn get_lines(&self, namespace: CacheNamespace, key: CacheKey) -> Option<Vec<String>> {
        let data = self.get(namespace, key).await?;
        match String::from_utf8(data.to_vec()) {
            Ok(text) => Some(text.lines().map(str::to_string).collect()),
            Err(_) => {
                let err = CacheError::Corrupt {
                    path: self.entry_path(namespace, key),
                };
                warn!(error = %err, "Ignoring cache entry");
                None
            }
        }
    }

    // -------------------------------------------------------------------------
    // Image files
    // -------------------------------------------------------------------------

    pub async fn image_exists(&self, file: &ImageFile) -> bool {
        tokio::fs::try_exists(self.image_path(file))
            .await
            .unwrap_or(false)
    }

    /// Store a source image. Returns whether the file was written.
    pub async fn put_image(&self, file: &ImageFile, data: &[u8]) -> bool {
        let path = self.image_path(file);
        match self.write_atomic(&path, data).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Image cache write failed");
                false
            }
        }
    }

    pub async fn read_image(&self, file: &ImageFile) -> Option<Bytes> {
        read_or_miss(&self.image_path(file)).await
    }

    /// Write through a temporary sibling and rename, so readers never observe
    /// a partially written file.
    async fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<(), CacheError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::io(parent, e))?;
        }

        let seq = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = path.with_file_name(format!(".{file_name}.{}.{seq}.tmp", std::process::id()));

        tokio::fs::write(&tmp, data)
            .await
            .map_err(|e| CacheError::io(&tmp, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(CacheError::io(path, e));
        }
        Ok(())
    }
}

async fn read_or_miss(path: &Path) -> Option<Bytes> {
    match tokio::fs::read(path).await {
        Ok(data) => Some(Bytes::from(data)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!(error = %CacheError::io(path, e), "Cache read failed, treating as miss");
            None
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
