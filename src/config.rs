//! Configuration management.
//!
//! Every option can be given on the command line or through a `DZC_`
//! environment variable:
//!
//! - `DZC_HOST` / `DZC_PORT` - Bind address (default: 0.0.0.0:3000)
//! - `DZC_DATA_DIR` - Data directory; the cache lives in `<dir>/pivotCache`
//! - `DZC_BASE_URL` - Base URL for relative image references
//! - `DZC_UPLOAD_DIR` - Directory of locally uploaded images
//! - `DZC_IMAGE_SEARCH` / `DZC_IMAGE_SEARCH_URL` - Image search fallback
//! - `DZC_MAX_ENTITIES` - Entities per collection (default: 1000)
//! - `DZC_ACQUIRE_TIMEOUT` - Seconds a build waits for images (default: 60)
//! - `DZC_FETCH_TIMEOUT` - Seconds per download or search (default: 10)
//! - `DZC_FONT` - Font file for ID cards
//! - `DZC_DECODE_CACHE_ENTRIES` / `DZC_DECODE_CACHE_TTL` / `DZC_DECODE_FAILURE_TTL`
//! - `DZC_JPEG_QUALITY` - Tile JPEG quality (default: 80)
//! - `DZC_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)
//! - `DZC_CORS_ORIGINS` - Comma-separated allowed origins
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use dzc_streamer::Config;
//!
//! let config = Config::parse();
//! config.validate()?;
//! println!("Listening on {}", config.bind_address());
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use url::Url;

use crate::acquire::{AcquirerConfig, DEFAULT_IMAGE_SEARCH_URL};
use crate::cache::DEFAULT_DECODE_CACHE_ENTRIES;
use crate::collection::{BuilderConfig, DEFAULT_MAX_ENTITIES};
use crate::server::DEFAULT_CACHE_MAX_AGE;
use crate::tile::{is_valid_quality, DEFAULT_JPEG_QUALITY};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default data directory.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Default bound, in seconds, on waiting for acquisitions.
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 60;

/// Default timeout, in seconds, of one download or search.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Default lifetime, in seconds, of a decoded image.
pub const DEFAULT_DECODE_CACHE_TTL_SECS: u64 = 600;

/// Default lifetime, in seconds, of a cached decode failure.
pub const DEFAULT_DECODE_FAILURE_TTL_SECS: u64 = 30;

// =============================================================================
// CLI Arguments
// =============================================================================

/// DZC Streamer - serves query results as zoomable image collections.
///
/// Builds Deep Zoom collections from entity lists, fetching one image per
/// entity in the background, and composes collection tiles on demand.
#[derive(Parser, Debug, Clone)]
#[command(name = "dzc-streamer")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "DZC_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "DZC_PORT")]
    pub port: u16,

    /// Data directory holding the `pivotCache` tree.
    #[arg(long, default_value = DEFAULT_DATA_DIR, env = "DZC_DATA_DIR")]
    pub data_dir: PathBuf,

    // =========================================================================
    // Image Acquisition
    // =========================================================================
    /// Base URL that relative image references are resolved against.
    #[arg(long, env = "DZC_BASE_URL")]
    pub base_url: Option<String>,

    /// Directory of uploaded images referenced as `upload:<file>`.
    #[arg(long, env = "DZC_UPLOAD_DIR")]
    pub upload_dir: Option<PathBuf>,

    /// Search for an image by label when the reference cannot be fetched.
    #[arg(long, default_value_t = false, env = "DZC_IMAGE_SEARCH")]
    pub image_search: bool,

    /// Image search endpoint (JSON response with `responseData.results`).
    #[arg(long, default_value = DEFAULT_IMAGE_SEARCH_URL, env = "DZC_IMAGE_SEARCH_URL")]
    pub image_search_url: String,

    /// Maximum number of entities per collection.
    #[arg(long, default_value_t = DEFAULT_MAX_ENTITIES, env = "DZC_MAX_ENTITIES")]
    pub max_entities: usize,

    /// Seconds a collection build waits for image acquisition.
    ///
    /// Acquisitions still running afterwards continue in the background.
    #[arg(long, default_value_t = DEFAULT_ACQUIRE_TIMEOUT_SECS, env = "DZC_ACQUIRE_TIMEOUT")]
    pub acquire_timeout: u64,

    /// Seconds before a single download or search is abandoned.
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT_SECS, env = "DZC_FETCH_TIMEOUT")]
    pub fetch_timeout: u64,

    /// Font file used to render ID cards.
    ///
    /// If not specified, the bundled DejaVu Sans Bold is used.
    #[arg(long, env = "DZC_FONT")]
    pub font: Option<PathBuf>,

    // =========================================================================
    // Tile Configuration
    // =========================================================================
    /// Maximum number of decoded images kept in memory.
    #[arg(long, default_value_t = DEFAULT_DECODE_CACHE_ENTRIES, env = "DZC_DECODE_CACHE_ENTRIES")]
    pub decode_cache_entries: usize,

    /// Seconds a decoded image stays cached.
    #[arg(long, default_value_t = DEFAULT_DECODE_CACHE_TTL_SECS, env = "DZC_DECODE_CACHE_TTL")]
    pub decode_cache_ttl: u64,

    /// Seconds an undecodable image is remembered as blank.
    #[arg(long, default_value_t = DEFAULT_DECODE_FAILURE_TTL_SECS, env = "DZC_DECODE_FAILURE_TTL")]
    pub decode_failure_ttl: u64,

    /// JPEG quality for tile encoding (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "DZC_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "DZC_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "DZC_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_entities == 0 {
            return Err("max_entities must be greater than 0".to_string());
        }
        if self.decode_cache_entries == 0 {
            return Err("decode_cache_entries must be greater than 0".to_string());
        }
        if !is_valid_quality(self.jpeg_quality) {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }
        if self.acquire_timeout == 0 {
            return Err("acquire_timeout must be greater than 0".to_string());
        }

        if let Some(base) = &self.base_url {
            Url::parse(base).map_err(|e| format!("Invalid base URL '{}': {}", base, e))?;
        }
        self.search_endpoint()?;

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Acquirer settings. Call [`Config::validate`] first; an unparsable
    /// base URL is dropped here.
    pub fn acquirer_config(&self) -> AcquirerConfig {
        AcquirerConfig {
            base_url: self.base_url.as_deref().and_then(|u| Url::parse(u).ok()),
            image_search: self.image_search,
            upload_dir: self.upload_dir.clone(),
        }
    }

    /// Search endpoint for the HTTP source. An unparsable URL is only an
    /// error while image search is enabled.
    pub fn search_endpoint(&self) -> Result<Url, String> {
        match Url::parse(&self.image_search_url) {
            Ok(url) => Ok(url),
            Err(_) if !self.image_search => {
                Url::parse(DEFAULT_IMAGE_SEARCH_URL).map_err(|e| e.to_string())
            }
            Err(e) => Err(format!(
                "Invalid image search URL '{}': {}",
                self.image_search_url, e
            )),
        }
    }

    pub fn builder_config(&self) -> BuilderConfig {
        BuilderConfig {
            max_entities: self.max_entities,
            acquire_timeout: Duration::from_secs(self.acquire_timeout),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }

    pub fn decode_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.decode_cache_ttl)
    }

    pub fn decode_failure_ttl(&self) -> Duration {
        Duration::from_secs(self.decode_failure_ttl)
    }
}

// =============================================================================
// Tests
// =============================================================================
