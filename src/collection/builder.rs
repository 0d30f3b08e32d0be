//! Collection building.
//!
//! ```text
//!  BuildRequest ─► validate cache ─► result cache hit? ──yes──► cached CXML
//!                                          │ no
//!                                          ▼
//!            for each entity (up to max_entities, in order):
//!              reference ─► ImageList::assign ─► new? spawn acquisition
//!                                          │
//!                                          ▼
//!            persist image list ─► wait for acquisitions (bounded)
//!                                          │
//!                                          ▼
//!            persist DZC manifest + CXML ─► BuiltCollection
//! ```
//!
//! The wait is bounded by the acquire timeout. Acquisitions still running
//! when it expires are left to finish in the background; tiles that reference
//! them render blank until they do.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::acquire::{AcquireJob, AcquisitionTracker, ImageSource, SourceImageAcquirer};
use crate::cache::{CacheKey, CacheNamespace, CacheStore};

use super::cxml::{clean_label, facet_categories, CxmlDocument, NOTHING_FOUND};
use super::entity::{placeholder_reference, Entity};
use super::manifest::ImageList;

/// Default cap on entities per collection.
pub const DEFAULT_MAX_ENTITIES: usize = 1000;

/// Default bound on the wait for outstanding acquisitions.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(60);

/// A query result to turn into a collection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildRequest {
    /// Query text the entities were produced by; part of the collection key
    pub query: String,

    /// Collection title, defaults to the query
    #[serde(default)]
    pub title: Option<String>,

    /// Per-request cap, never above the configured maximum
    #[serde(default)]
    pub max_entities: Option<usize>,

    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl BuildRequest {
    pub fn new(query: impl Into<String>, entities: Vec<Entity>) -> Self {
        Self {
            query: query.into(),
            entities,
            ..Default::default()
        }
    }
}

/// Builder limits.
#[derive(Debug, Clone, Copy)]
pub struct BuilderConfig {
    pub max_entities: usize,
    pub acquire_timeout: Duration,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_entities: DEFAULT_MAX_ENTITIES,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

/// Result of [`CollectionBuilder::build`].
#[derive(Debug, Clone)]
pub struct BuiltCollection {
    pub collection_id: CacheKey,

    /// CXML markup
    pub markup: Bytes,

    /// Served from the result cache without building
    pub cached: bool,

    /// Number of distinct images in the collection
    pub image_count: usize,

    /// Whether every acquisition finished before the deadline
    pub complete: bool,
}

/// Turns query results into cached collections.
pub struct CollectionBuilder<S: ImageSource> {
    acquirer: Arc<SourceImageAcquirer<S>>,
    store: Arc<CacheStore>,
    config: BuilderConfig,
}

impl<S: ImageSource + 'static> CollectionBuilder<S> {
    pub fn new(
        acquirer: Arc<SourceImageAcquirer<S>>,
        store: Arc<CacheStore>,
        config: BuilderConfig,
    ) -> Self {
        Self {
            acquirer,
            store,
            config,
        }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Effective entity cap for a request.
    pub fn entity_limit(&self, request: &BuildRequest) -> usize {
        request
            .max_entities
            .map_or(self.config.max_entities, |m| m.min(self.config.max_entities))
    }

    /// Key of the collection `request` builds in the current generation.
    pub fn collection_key(&self, request: &BuildRequest) -> CacheKey {
        CacheKey::derive(
            &request.query,
            self.entity_limit(request),
            self.store.generation(),
        )
    }

    /// Record that the underlying data changed.
    ///
    /// The next build wipes the result cache and derives fresh keys.
    pub fn data_changed(&self) {
        self.store.mark_data_modified();
        info!(generation = self.store.generation(), "Data modification recorded");
    }

    /// Build (or fetch from the result cache) the collection for `request`.
    pub async fn build(&self, request: &BuildRequest) -> BuiltCollection {
        self.store.validate().await;

        let limit = self.entity_limit(request);
        let key = self.collection_key(request);

        if let Some(markup) = self.store.get(CacheNamespace::Result, key).await {
            let image_count = self
                .store
                .get_lines(CacheNamespace::Image, key)
                .await
                .map_or(0, |images| images.len());
            debug!(collection_id = %key, "Result cache hit");
            return BuiltCollection {
                collection_id: key,
                markup,
                cached: true,
                image_count,
                complete: true,
            };
        }

        let started = Instant::now();
        let entities: Vec<&Entity> = request
            .entities
            .iter()
            .filter(|e| !clean_label(&e.label).trim().is_empty())
            .take(limit)
            .collect();

        let title = request.title.as_deref().unwrap_or(&request.query);
        let categories = facet_categories(entities.iter().copied());
        let img_base = format!("/collections/{key}.xml");
        let mut doc = CxmlDocument::new(title, &img_base, &categories);

        let tracker = AcquisitionTracker::new();
        let mut images = ImageList::new();
        for entity in &entities {
            let reference = entity.image_reference();
            let (index, new) = images.assign(reference.as_str());
            if new {
                let job = AcquireJob::new(&entity.id, &entity.label, reference).for_collection(key);
                self.acquirer.spawn(job, &tracker);
            }
            doc.push_item(entity, index);
        }

        if images.is_empty() {
            let reference = placeholder_reference(NOTHING_FOUND);
            images.assign(reference.as_str());
            let job = AcquireJob::new(NOTHING_FOUND, NOTHING_FOUND, reference).for_collection(key);
            self.acquirer.spawn(job, &tracker);
        }

        // Tiles can be served as soon as the list exists
        self.store
            .put_lines(CacheNamespace::Image, key, images.images())
            .await;

        let complete = tracker.wait_idle(self.config.acquire_timeout).await;
        if !complete {
            warn!(
                collection_id = %key,
                outstanding = tracker.outstanding(),
                timeout_secs = self.config.acquire_timeout.as_secs(),
                "Acquisitions still running, continuing in background"
            );
        }

        let manifest = images.to_dzc_xml();
        self.store
            .put(CacheNamespace::Manifest, key, manifest.as_bytes())
            .await;

        let markup = Bytes::from(doc.finish());
        self.store.put(CacheNamespace::Result, key, &markup).await;

        info!(
            collection_id = %key,
            entities = entities.len(),
            images = images.len(),
            complete,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Collection built"
        );

        BuiltCollection {
            collection_id: key,
            markup,
            cached: false,
            image_count: images.len(),
            complete,
        }
    }

    /// Cached Deep Zoom collection document.
    pub async fn manifest(&self, key: CacheKey) -> Option<Bytes> {
        self.store.get(CacheNamespace::Manifest, key).await
    }

    /// Cached CXML markup.
    pub async fn markup(&self, key: CacheKey) -> Option<Bytes> {
        self.store.get(CacheNamespace::Result, key).await
    }
}
