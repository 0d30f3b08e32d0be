//! # DZC Streamer
//!
//! A tile server that turns query results into zoomable image collections.
//!
//! Each query result row becomes one item with one picture. Pictures are
//! fetched in the background, cached on disk, and composed on demand into
//! the Deep Zoom collection tiles a pivot viewer asks for.
//!
//! ## Features
//!
//! - **Collection building**: collection markup (CXML) and Deep Zoom collection (DZC) documents
//! - **Background acquisition**: downloads with fallbacks to search and generated ID cards
//! - **Morton-ordered tiles**: composed from cached images, never pre-rendered
//! - **Disk cache**: generation-based invalidation when the underlying data changes
//!
//! ## Architecture
//!
//! - [`cache`] - Disk cache store and decoded image cache
//! - [`acquire`] - Image sources, ID cards and the background acquirer
//! - [`collection`] - Entities, documents and the collection builder
//! - [`tile`] - Morton addressing, tile composition and encoding
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dzc_streamer::{
//!     create_router, AcquirerConfig, AppState, BuilderConfig, CacheStore, CardRenderer,
//!     CollectionBuilder, DecodedImageCache, HttpImageSource, JpegTileEncoder, RouterConfig,
//!     SourceImageAcquirer, TileComposer, DEFAULT_FETCH_TIMEOUT, DEFAULT_IMAGE_SEARCH_URL,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(CacheStore::in_data_dir("./data"));
//!     let source = Arc::new(HttpImageSource::new(
//!         DEFAULT_FETCH_TIMEOUT,
//!         url::Url::parse(DEFAULT_IMAGE_SEARCH_URL)?,
//!     )?);
//!     let acquirer = Arc::new(SourceImageAcquirer::new(
//!         source,
//!         Arc::clone(&store),
//!         CardRenderer::new(None),
//!         AcquirerConfig::default(),
//!     ));
//!     let builder = Arc::new(CollectionBuilder::new(
//!         acquirer,
//!         Arc::clone(&store),
//!         BuilderConfig::default(),
//!     ));
//!     let composer = Arc::new(TileComposer::new(
//!         store,
//!         Arc::new(DecodedImageCache::new()),
//!         JpegTileEncoder::new(),
//!     ));
//!
//!     let router = create_router(AppState::new(builder, composer), RouterConfig::new());
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod acquire;
pub mod cache;
pub mod collection;
pub mod config;
pub mod error;
pub mod server;
pub mod tile;

// Re-export commonly used types
pub use acquire::{
    AcquireJob, AcquireOutcome, AcquirerConfig, AcquisitionTracker, CardRenderer,
    HttpImageSource, ImageSource, SourceImageAcquirer, DEFAULT_FETCH_TIMEOUT,
    DEFAULT_IMAGE_SEARCH_URL,
};
pub use cache::{CacheKey, CacheNamespace, CacheStore, DecodedImageCache, ImageFile};
pub use collection::{
    BuildRequest, BuilderConfig, BuiltCollection, CollectionBuilder, CxmlDocument, Entity,
    ImageList,
};
pub use config::Config;
pub use error::{CacheError, FetchError, TileError};
pub use server::{create_router, AppState, ErrorResponse, HealthResponse, RouterConfig};
pub use tile::{
    morton, select_indices, JpegTileEncoder, PyramidMode, TileComposer, TileRequest,
    DEFAULT_JPEG_QUALITY,
};
