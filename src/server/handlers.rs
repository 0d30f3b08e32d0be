//! HTTP request handlers for the collection and tile API.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /collections` - Build a collection from a query result
//! - `GET /collections/{id}.xml` / `GET /collections/{id}.cxml` - Collection documents
//! - `GET /tiles/{collection_id}/{zoom}/{x}_{y}.jpg` - Collection tile
//! - `GET /tiles/{file}/{zoom}/0_0.jpg` - Single image tile, by image file name
//! - `GET /dzimages/{shard}/{file}.xml` - Single image descriptor
//! - `GET /dzimages/{shard}/{file}_files/{zoom}/0_0.jpg` - Single image tile
//! - `POST /data-changed` - Signal that the underlying data changed

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::acquire::ImageSource;
use crate::cache::{CacheKey, ImageFile};
use crate::collection::{BuildRequest, CollectionBuilder};
use crate::error::TileError;
use crate::tile::{PyramidMode, TileComposer, TileRequest, ITEM_SIZE};

use super::dzi::{generate_dzi_xml, parse_dzi_tile_coords, split_extension, strip_files_suffix};
use super::routes::DEFAULT_CACHE_MAX_AGE;

/// Collection identifier of a built collection.
pub const COLLECTION_ID_HEADER: HeaderName = HeaderName::from_static("x-collection-id");

/// Whether a collection came from the result cache.
pub const COLLECTION_CACHED_HEADER: HeaderName = HeaderName::from_static("x-collection-cached");

/// Whether every image was acquired before the response.
pub const COLLECTION_COMPLETE_HEADER: HeaderName = HeaderName::from_static("x-collection-complete");

const XML_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<S: ImageSource> {
    pub builder: Arc<CollectionBuilder<S>>,
    pub composer: Arc<TileComposer>,

    /// Cache-Control max-age in seconds for tiles and descriptors
    pub cache_max_age: u32,
}

impl<S: ImageSource> AppState<S> {
    pub fn new(builder: Arc<CollectionBuilder<S>>, composer: Arc<TileComposer>) -> Self {
        Self {
            builder,
            composer,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
        }
    }

    pub fn with_cache_max_age(mut self, cache_max_age: u32) -> Self {
        self.cache_max_age = cache_max_age;
        self
    }
}

impl<S: ImageSource> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            builder: Arc::clone(&self.builder),
            composer: Arc::clone(&self.composer),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_zoom")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert TileError to HTTP response.
///
/// - 404 errors are logged at DEBUG level (stale viewer links are common)
/// - other 4xx errors are logged at WARN level
/// - 5xx errors are logged at ERROR level
impl IntoResponse for TileError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            TileError::UnknownCollection { .. } => (StatusCode::NOT_FOUND, "not_found"),
            TileError::UnknownImage { .. } => (StatusCode::NOT_FOUND, "not_found"),
            TileError::InvalidZoom { .. } => (StatusCode::BAD_REQUEST, "invalid_zoom"),
            TileError::InvalidTileName { .. } => (StatusCode::BAD_REQUEST, "invalid_tile_name"),
            TileError::EncodeError { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "encode_error"),
        };
        let message = self.to_string();

        if status.is_server_error() {
            error!(error_type, status = status.as_u16(), "Server error: {}", message);
        } else if status == StatusCode::NOT_FOUND {
            debug!(error_type, status = status.as_u16(), "Resource not found: {}", message);
        } else {
            warn!(error_type, status = status.as_u16(), "Client error: {}", message);
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

fn parse_collection_id(raw: &str) -> Result<CacheKey, TileError> {
    raw.parse().map_err(|_| TileError::UnknownCollection {
        collection_id: raw.to_string(),
    })
}

/// Resolve `{shard}/{name}` to a cache file, rejecting names the cache could
/// never have produced.
fn parse_image_file(shard: &str, name: &str) -> Result<ImageFile, TileError> {
    let unknown = || TileError::UnknownImage {
        name: format!("{shard}/{name}"),
    };
    name.parse::<i32>().map_err(|_| unknown())?;
    let file = ImageFile::from_name(name);
    if file.shard() != shard {
        return Err(unknown());
    }
    Ok(file)
}

fn cacheable(content_type: &'static str, max_age: u32, body: impl Into<Bytes>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CACHE_CONTROL, format!("public, max-age={max_age}")),
        ],
        body.into(),
    )
        .into_response()
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle health check requests.
///
/// `GET /health` returns `{"status": "healthy", "version": "0.1.0"}`.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Build a collection from a query result.
///
/// # Endpoint
///
/// `POST /collections` with a JSON body:
///
/// ```json
/// {
///   "query": "SELECT ...",
///   "title": "Cities",
///   "max_entities": 100,
///   "entities": [
///     {"id": "http://dbpedia.org/resource/Berlin", "label": "Berlin",
///      "facets": {"thumbnail": ["http://.../200px-Berlin.jpg"], "country": ["Germany"]}}
///   ]
/// }
/// ```
///
/// # Response
///
/// `200 OK` with the CXML markup and the `X-Collection-Id` header. The
/// response waits for image acquisition up to the acquire timeout.
pub async fn create_collection_handler<S: ImageSource + 'static>(
    State(state): State<AppState<S>>,
    Json(request): Json<BuildRequest>,
) -> Response {
    let built = state.builder.build(&request).await;

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, XML_CONTENT_TYPE.to_string()),
            (COLLECTION_ID_HEADER, built.collection_id.to_string()),
            (COLLECTION_CACHED_HEADER, built.cached.to_string()),
            (COLLECTION_COMPLETE_HEADER, built.complete.to_string()),
        ],
        built.markup,
    )
        .into_response()
}

/// Serve a collection document.
///
/// `GET /collections/{id}.xml` returns the Deep Zoom collection and
/// `GET /collections/{id}.cxml` the collection markup.
///
/// # Errors
///
/// - `404 Not Found`: Unknown collection or extension
pub async fn collection_document_handler<S: ImageSource + 'static>(
    State(state): State<AppState<S>>,
    Path(filename): Path<String>,
) -> Result<Response, TileError> {
    let unknown = || TileError::UnknownCollection {
        collection_id: filename.clone(),
    };
    let (id, extension) = split_extension(&filename).ok_or_else(unknown)?;
    let key = parse_collection_id(id)?;

    let document = match extension {
        "xml" => state.builder.manifest(key).await,
        "cxml" => state.builder.markup(key).await,
        _ => None,
    };
    let document = document.ok_or_else(unknown)?;

    Ok(cacheable(XML_CONTENT_TYPE, state.cache_max_age, document))
}

/// Serve a composed collection tile.
///
/// # Endpoint
///
/// `GET /tiles/{collection_id}/{zoom}/{x}_{y}.jpg`
///
/// # Response
///
/// - `200 OK`: JPEG tile, also when some or all cells are blank
/// - `400 Bad Request`: Zoom above the pyramid or malformed tile name
/// - `404 Not Found`: Unknown collection
///
/// When no collection has the given id but an acquired image is stored
/// under that file name, the image's own pyramid is served instead (see
/// [`image_tile_handler`]). Collections take precedence.
pub async fn tile_handler<S: ImageSource + 'static>(
    State(state): State<AppState<S>>,
    Path((collection_id, zoom, filename)): Path<(String, u32, String)>,
) -> Result<Response, TileError> {
    let collection_tile = match parse_collection_id(&collection_id) {
        Ok(key) => serve_collection_tile(&state, key, zoom, &filename).await,
        Err(e) => Err(e),
    };

    match collection_tile {
        Err(TileError::UnknownCollection { .. }) if collection_id.parse::<i32>().is_ok() => {
            let file = ImageFile::from_name(collection_id.as_str());
            if !state.composer.has_image(&file).await {
                return Err(TileError::UnknownCollection { collection_id });
            }
            serve_image_tile(&state, &file, zoom, filename).await
        }
        other => other,
    }
}

/// Serve a collection tile at the path Deep Zoom viewers derive from the
/// collection document: `GET /collections/{id}_files/{zoom}/{x}_{y}.jpg`.
pub async fn collection_files_handler<S: ImageSource + 'static>(
    State(state): State<AppState<S>>,
    Path((dir, zoom, filename)): Path<(String, u32, String)>,
) -> Result<Response, TileError> {
    let id = strip_files_suffix(&dir).ok_or_else(|| TileError::UnknownCollection {
        collection_id: dir.clone(),
    })?;
    let key = parse_collection_id(id)?;
    serve_collection_tile(&state, key, zoom, &filename).await
}

async fn serve_collection_tile<S: ImageSource>(
    state: &AppState<S>,
    key: CacheKey,
    zoom: u32,
    filename: &str,
) -> Result<Response, TileError> {
    let (column, row) =
        parse_dzi_tile_coords(filename).ok_or_else(|| TileError::InvalidTileName {
            name: filename.to_string(),
        })?;

    let request = TileRequest::new(key, zoom, column, row);
    let tile = state.composer.compose_tile(&request).await?;
    Ok(cacheable("image/jpeg", state.cache_max_age, tile))
}

/// Serve the Deep Zoom descriptor of one cached image.
///
/// `GET /dzimages/{shard}/{file}.xml`
///
/// # Example Output
///
/// ```xml
/// <?xml version="1.0" encoding="UTF-8"?>
/// <Image xmlns="http://schemas.microsoft.com/deepzoom/2008"
///        TileSize="256"
///        Overlap="0"
///        Format="jpg">
///   <Size Width="200" Height="200" />
/// </Image>
/// ```
pub async fn dzi_descriptor_handler<S: ImageSource + 'static>(
    State(state): State<AppState<S>>,
    Path((shard, filename)): Path<(String, String)>,
) -> Result<Response, TileError> {
    let name = match split_extension(&filename) {
        Some((name, "xml")) => name,
        _ => {
            return Err(TileError::UnknownImage {
                name: format!("{shard}/{filename}"),
            })
        }
    };
    parse_image_file(&shard, name)?;

    let xml = generate_dzi_xml(
        ITEM_SIZE,
        ITEM_SIZE,
        PyramidMode::Collection.canvas_size(),
    );
    Ok(cacheable(XML_CONTENT_TYPE, state.cache_max_age, xml))
}

/// Serve one tile of a single image's pyramid.
///
/// `GET /dzimages/{shard}/{file}_files/{zoom}/0_0.jpg`
///
/// The whole image fits one tile at every zoom level, so `0_0` is the only
/// tile name.
pub async fn image_tile_handler<S: ImageSource + 'static>(
    State(state): State<AppState<S>>,
    Path((shard, dir, zoom, filename)): Path<(String, String, u32, String)>,
) -> Result<Response, TileError> {
    let name = strip_files_suffix(&dir).ok_or_else(|| TileError::UnknownImage {
        name: format!("{shard}/{dir}"),
    })?;
    let file = parse_image_file(&shard, name)?;
    serve_image_tile(&state, &file, zoom, filename).await
}

async fn serve_image_tile<S: ImageSource>(
    state: &AppState<S>,
    file: &ImageFile,
    zoom: u32,
    filename: String,
) -> Result<Response, TileError> {
    if parse_dzi_tile_coords(&filename) != Some((0, 0)) {
        return Err(TileError::InvalidTileName { name: filename });
    }

    let tile = state.composer.compose_card_tile(file, zoom).await?;
    Ok(cacheable("image/jpeg", state.cache_max_age, tile))
}

/// Record that the underlying data changed.
///
/// `POST /data-changed` returns `204 No Content`. The next collection build
/// wipes the result cache.
pub async fn data_changed_handler<S: ImageSource + 'static>(
    State(state): State<AppState<S>>,
) -> StatusCode {
    state.builder.data_changed();
    StatusCode::NO_CONTENT
}

// =============================================================================
// Tests
// =============================================================================
