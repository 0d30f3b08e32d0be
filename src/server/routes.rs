//! Router configuration.
//!
//! # Route Structure
//!
//! ```text
//! /health                                           - Health check
//! /collections                              (POST)  - Build a collection
//! /collections/{id}.xml | {id}.cxml                 - Collection documents
//! /collections/{id}_files/{zoom}/{x}_{y}.jpg        - Collection tile (viewer path)
//! /tiles/{collection_id}/{zoom}/{x}_{y}.jpg         - Collection tile
//! /tiles/{file}/{zoom}/0_0.jpg                      - Image tile, by file name
//! /dzimages/{shard}/{file}.xml                      - Image descriptor
//! /dzimages/{shard}/{file}_files/{zoom}/0_0.jpg     - Image tile
//! /data-changed                             (POST)  - Data change signal
//! ```
//!
//! The `/dzimages` routes are also mounted under `/collections/dzimages`,
//! where `Source` attributes resolve relative to a collection document.
//!
//! # Example
//!
//! ```ignore
//! use dzc_streamer::server::{create_router, AppState, RouterConfig};
//!
//! let state = AppState::new(builder, composer);
//! let router = create_router(state, RouterConfig::new().with_cache_max_age(600));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    collection_document_handler, collection_files_handler, create_collection_handler,
    data_changed_handler, dzi_descriptor_handler, health_handler, image_tile_handler,
    tile_handler, AppState, COLLECTION_ID_HEADER,
};
use crate::acquire::ImageSource;

/// Default Cache-Control max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins; `None` allows any origin, an empty list none
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds for documents and tiles
    pub cache_max_age: u32,

    /// Wrap the router in a `TraceLayer`
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            enable_tracing: true,
        }
    }
}

impl RouterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict cross-origin requests to `origins`.
    pub fn with_cors_origins(self, origins: Vec<String>) -> Self {
        Self {
            cors_origins: Some(origins),
            ..self
        }
    }

    pub fn with_cache_max_age(self, cache_max_age: u32) -> Self {
        Self {
            cache_max_age,
            ..self
        }
    }

    pub fn with_tracing(self, enable_tracing: bool) -> Self {
        Self {
            enable_tracing,
            ..self
        }
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the application router.
///
/// `config.cache_max_age` overrides the max-age carried by `state`.
pub fn create_router<S>(state: AppState<S>, config: RouterConfig) -> Router
where
    S: ImageSource + 'static,
{
    let state = state.with_cache_max_age(config.cache_max_age);
    let cors = cors_layer(config.cors_origins.as_deref());

    let dzimages = Router::new()
        .route("/{shard}/{file}", get(dzi_descriptor_handler::<S>))
        .route(
            "/{shard}/{dir}/{zoom}/{filename}",
            get(image_tile_handler::<S>),
        )
        .with_state(state.clone());

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/collections", post(create_collection_handler::<S>))
        .route(
            "/collections/{filename}",
            get(collection_document_handler::<S>),
        )
        .route(
            "/collections/{dir}/{zoom}/{filename}",
            get(collection_files_handler::<S>),
        )
        .route(
            "/tiles/{collection_id}/{zoom}/{filename}",
            get(tile_handler::<S>),
        )
        .route("/data-changed", post(data_changed_handler::<S>))
        .with_state(state)
        .nest("/dzimages", dzimages.clone())
        .nest("/collections/dzimages", dzimages)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// CORS for browser viewers hosted elsewhere.
fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .expose_headers([COLLECTION_ID_HEADER])
        .max_age(Duration::from_secs(86400));

    match origins {
        None => cors.allow_origin(Any),
        Some([]) => cors,
        Some(origins) => cors.allow_origin(
            origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect::<Vec<HeaderValue>>(),
        ),
    }
}

// =============================================================================
// Tests
// =============================================================================
