use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the disk-backed cache store.
///
/// Callers treat these as degradations: a read error is a miss, a write
/// error means the entry is simply not cached.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Filesystem error while reading or writing a cache entry
    #[error("Cache I/O error at {path}: {message}")]
    Io { path: PathBuf, message: String },

    /// Entry exists but its content could not be interpreted
    #[error("Corrupt cache entry: {path}")]
    Corrupt { path: PathBuf },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Errors that can occur while fetching a source image.
///
/// These never leave the acquirer; every variant falls through to the next
/// acquisition strategy.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Reference could not be turned into an absolute URL
    #[error("Invalid image URL: {0}")]
    InvalidUrl(String),

    /// Remote server answered with a non-success status
    #[error("HTTP {status} fetching {url}")]
    Http { url: String, status: u16 },

    /// Network or connection error
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    /// Image search returned nothing usable
    #[error("No image search result for '{query}'")]
    NoSearchResult { query: String },

    /// Downloaded bytes are not in a recognised image format
    #[error("Not an image: {url}")]
    NotAnImage { url: String },

    /// Local upload could not be read
    #[error("Cannot read local image {path}: {message}")]
    Local { path: PathBuf, message: String },

    /// Search response body could not be parsed
    #[error("Malformed search response: {0}")]
    Decode(String),
}

/// Errors that can occur when serving tiles and collection documents.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// No image list exists for the requested collection
    #[error("Unknown collection: {collection_id}")]
    UnknownCollection { collection_id: String },

    /// Image file name is not a cache file name or does not match its shard
    #[error("Unknown image: {name}")]
    UnknownImage { name: String },

    /// Requested zoom level exceeds the pyramid's maximum
    #[error("Invalid zoom level {zoom} (max: {max_zoom})")]
    InvalidZoom { zoom: u32, max_zoom: u32 },

    /// Tile file name is not of the form `{column}_{row}.jpg`
    #[error("Invalid tile name: {name}")]
    InvalidTileName { name: String },

    /// Failed to encode the composed canvas
    #[error("Failed to encode tile: {message}")]
    EncodeError { message: String },
}
