//! Source image acquisition.
//!
//! Each distinct image reference of a collection is resolved to exactly one
//! file in the image cache, trying in order:
//!
//! ```text
//!  upload:<name> ──► copy from upload dir ──────────────┐
//!  id:<entity>   ──────────────────────────────┐        │
//!  URL / path    ──► download ─► 94px variant  │        │
//!                        │ fail                │        │
//!                        ▼                     ▼        ▼
//!                 image search ─────────► ID card ──► imageCache/{shard}/{file}
//! ```
//!
//! Acquisition never fails its caller. Every error is logged and the next
//! strategy is tried; the rendered ID card is the last resort.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{CacheKey, CacheStore, ImageFile};
use crate::error::FetchError;

use super::card::CardRenderer;
use super::source::ImageSource;
use super::tracker::AcquisitionTracker;

/// Prefix of references that ask for an ID card instead of a download.
pub const CARD_PREFIX: &str = "id:";

/// Prefix of references naming a file in the local upload directory.
pub const UPLOAD_PREFIX: &str = "upload:";

/// Size token swapped when the full-size thumbnail is unavailable.
const LARGE_TOKEN: &str = "200px";
const SMALL_TOKEN: &str = "94px";

// =============================================================================
// Configuration
// =============================================================================

/// Settings that shape how references are resolved.
#[derive(Debug, Clone, Default)]
pub struct AcquirerConfig {
    /// Base URL for relative references
    pub base_url: Option<Url>,

    /// Whether to fall back to an image search by label
    pub image_search: bool,

    /// Directory holding locally uploaded images
    pub upload_dir: Option<PathBuf>,
}

// =============================================================================
// Jobs and Outcomes
// =============================================================================

/// One image to acquire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireJob {
    pub entity_id: String,
    /// Text rendered onto the ID card and used for image search
    pub label: String,
    pub reference: String,
    /// Collection that requested the image (for diagnostics)
    pub collection_id: Option<CacheKey>,
}

impl AcquireJob {
    pub fn new(
        entity_id: impl Into<String>,
        label: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            label: label.into(),
            reference: reference.into(),
            collection_id: None,
        }
    }

    pub fn for_collection(mut self, collection_id: CacheKey) -> Self {
        self.collection_id = Some(collection_id);
        self
    }
}

/// Which strategy produced the cached file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// File already existed; nothing was done
    AlreadyCached,
    /// Copied from the upload directory
    Local,
    /// Downloaded from the reference URL or its small variant
    Downloaded,
    /// Downloaded from an image search hit
    Searched,
    /// Rendered ID card
    Card,
    /// Nothing could be written
    Failed,
}

// =============================================================================
// Acquirer
// =============================================================================

/// Resolves image references into cached image files.
pub struct SourceImageAcquirer<S: ImageSource> {
    source: Arc<S>,
    store: Arc<CacheStore>,
    cards: CardRenderer,
    config: AcquirerConfig,
}

impl<S: ImageSource + 'static> SourceImageAcquirer<S> {
    pub fn new(
        source: Arc<S>,
        store: Arc<CacheStore>,
        cards: CardRenderer,
        config: AcquirerConfig,
    ) -> Self {
        Self {
            source,
            store,
            cards,
            config,
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Run `job` as a detached task counted by `tracker`.
    pub fn spawn(
        self: &Arc<Self>,
        job: AcquireJob,
        tracker: &AcquisitionTracker,
    ) -> JoinHandle<AcquireOutcome> {
        let guard = tracker.begin();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            this.acquire(&job).await
        })
    }

    /// Resolve `job.reference` into its cache file.
    ///
    /// Idempotent: returns [`AcquireOutcome::AlreadyCached`] without any work
    /// if the file exists.
    pub async fn acquire(&self, job: &AcquireJob) -> AcquireOutcome {
        let file = ImageFile::for_reference(&job.reference);
        if self.store.image_exists(&file).await {
            return AcquireOutcome::AlreadyCached;
        }

        let reference = job.reference.as_str();
        if let Some(name) = reference.strip_prefix(UPLOAD_PREFIX) {
            match self.read_upload(name).await {
                Ok(data) => return self.store_image(job, &file, &data, AcquireOutcome::Local).await,
                Err(e) => warn!(entity = %job.entity_id, error = %e, "Local image unavailable"),
            }
        } else if !reference.starts_with(CARD_PREFIX) {
            match self.download_with_fallback(reference).await {
                Ok(data) => {
                    return self
                        .store_image(job, &file, &data, AcquireOutcome::Downloaded)
                        .await
                }
                Err(e) => debug!(entity = %job.entity_id, error = %e, "Image download failed"),
            }

            if self.config.image_search {
                match self.search_and_download(&job.label).await {
                    Ok(data) => {
                        return self
                            .store_image(job, &file, &data, AcquireOutcome::Searched)
                            .await
                    }
                    Err(e) => debug!(entity = %job.entity_id, error = %e, "Image search failed"),
                }
            }

            info!(
                entity = %job.entity_id,
                reference,
                "No remote image available, rendering ID card"
            );
        }

        match self.cards.render_png(&job.label) {
            Ok(png) => self.store_image(job, &file, &png, AcquireOutcome::Card).await,
            Err(e) => {
                warn!(entity = %job.entity_id, error = %e, "Failed to render ID card");
                AcquireOutcome::Failed
            }
        }
    }

    async fn store_image(
        &self,
        job: &AcquireJob,
        file: &ImageFile,
        data: &[u8],
        outcome: AcquireOutcome,
    ) -> AcquireOutcome {
        if self.store.put_image(file, data).await {
            debug!(
                entity = %job.entity_id,
                collection_id = ?job.collection_id,
                file = file.name(),
                ?outcome,
                "Image acquired"
            );
            outcome
        } else {
            AcquireOutcome::Failed
        }
    }

    /// Resolve a reference to an absolute URL.
    pub fn resolve(&self, reference: &str) -> Result<Url, FetchError> {
        match Url::parse(reference) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => self
                .config
                .base_url
                .as_ref()
                .and_then(|base| base.join(reference).ok())
                .ok_or_else(|| FetchError::InvalidUrl(reference.to_string())),
            Err(_) => Err(FetchError::InvalidUrl(reference.to_string())),
        }
    }

    /// Download `reference`, retrying once with the small-thumbnail variant.
    async fn download_with_fallback(&self, reference: &str) -> Result<Bytes, FetchError> {
        let first = self.download(reference).await;
        let Err(err) = first else {
            return first;
        };

        let variant = small_variant(reference);
        if variant == reference {
            return Err(err);
        }
        debug!(reference, error = %err, "Retrying with small variant");
        self.download(&variant).await
    }

    async fn download(&self, reference: &str) -> Result<Bytes, FetchError> {
        let url = self.resolve(reference)?;
        let data = self.source.fetch(&url).await?;
        if image::guess_format(&data).is_err() {
            return Err(FetchError::NotAnImage {
                url: url.to_string(),
            });
        }
        Ok(data)
    }

    async fn search_and_download(&self, label: &str) -> Result<Bytes, FetchError> {
        let hit = self.source.search(label).await?;
        self.download_with_fallback(hit.as_str()).await
    }

    async fn read_upload(&self, name: &str) -> Result<Bytes, FetchError> {
        let Some(dir) = &self.config.upload_dir else {
            return Err(FetchError::Local {
                path: PathBuf::from(name),
                message: "no upload directory configured".to_string(),
            });
        };
        if !is_plain_file_name(name) {
            return Err(FetchError::Local {
                path: PathBuf::from(name),
                message: "not a plain file name".to_string(),
            });
        }

        let path = dir.join(name);
        tokio::fs::read(&path)
            .await
            .map(Bytes::from)
            .map_err(|e| FetchError::Local {
                path,
                message: e.to_string(),
            })
    }
}

/// Swap the large thumbnail token for the small one.
pub fn small_variant(reference: &str) -> String {
    reference.replace(LARGE_TOKEN, SMALL_TOKEN)
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && Path::new(name).file_name().map(|n| n == name).unwrap_or(false)
        && !name.contains(['/', '\\'])
}

// =============================================================================
// Tests
// =============================================================================
