//! Test utilities for integration tests.
//!
//! This module provides a mock image source, image fixtures and a helper
//! that wires a complete router over a temporary data directory.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;
use url::Url;

use dzc_streamer::acquire::{AcquirerConfig, CardRenderer, ImageSource, SourceImageAcquirer};
use dzc_streamer::cache::{CacheStore, DecodedImageCache};
use dzc_streamer::collection::{BuilderConfig, CollectionBuilder};
use dzc_streamer::error::FetchError;
use dzc_streamer::server::{create_router, AppState, RouterConfig};
use dzc_streamer::tile::{JpegTileEncoder, TileComposer};

// =============================================================================
// Mock Image Source
// =============================================================================

/// An image source serving pre-configured bytes by URL.
///
/// Unknown URLs answer 404. Every fetch and search is counted.
pub struct MockImageSource {
    images: HashMap<String, Bytes>,
    search_hits: HashMap<String, String>,
    delay: Duration,
    fetch_count: AtomicUsize,
    search_count: AtomicUsize,
    fetched: Mutex<Vec<String>>,
}

impl MockImageSource {
    pub fn new() -> Self {
        Self {
            images: HashMap::new(),
            search_hits: HashMap::new(),
            delay: Duration::ZERO,
            fetch_count: AtomicUsize::new(0),
            search_count: AtomicUsize::new(0),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn with_image(mut self, url: impl Into<String>, data: Vec<u8>) -> Self {
        self.images.insert(url.into(), Bytes::from(data));
        self
    }

    pub fn with_search_hit(mut self, label: impl Into<String>, url: impl Into<String>) -> Self {
        self.search_hits.insert(label.into(), url.into());
        self
    }

    /// Delay every fetch, to simulate a slow remote host.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub fn search_count(&self) -> usize {
        self.search_count.load(Ordering::SeqCst)
    }

    pub fn fetched_urls(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

impl Default for MockImageSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageSource for MockImageSource {
    async fn fetch(&self, url: &Url) -> Result<Bytes, FetchError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.fetched.lock().unwrap().push(url.to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.images
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| FetchError::Http {
                url: url.to_string(),
                status: 404,
            })
    }

    async fn search(&self, label: &str) -> Result<Url, FetchError> {
        self.search_count.fetch_add(1, Ordering::SeqCst);
        self.search_hits
            .get(label)
            .and_then(|hit| Url::parse(hit).ok())
            .ok_or_else(|| FetchError::NoSearchResult {
                query: label.to_string(),
            })
    }
}

// =============================================================================
// Image Fixtures
// =============================================================================

/// Create a solid-color JPEG.
pub fn create_test_jpeg(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(color));
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, 95);
    encoder.encode_image(&img).unwrap();
    buf
}

/// Create a solid-color PNG with an alpha channel.
pub fn create_test_png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba(color));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Check if data is a complete JPEG stream (SOI ... EOI).
pub fn is_valid_jpeg(data: &[u8]) -> bool {
    if data.len() < 4 {
        return false;
    }

    // Check SOI marker
    if data[0] != 0xFF || data[1] != 0xD8 {
        return false;
    }

    // Check EOI marker at end
    data[data.len() - 2] == 0xFF && data[data.len() - 1] == 0xD9
}

/// Decode a JPEG tile.
pub fn decode_tile(data: &[u8]) -> RgbImage {
    image::load_from_memory(data).unwrap().to_rgb8()
}

/// Whether `pixel` is within `tolerance` of `expected` on every channel.
///
/// JPEG round trips shift solid colors by a few levels.
pub fn color_near(pixel: &Rgb<u8>, expected: [u8; 3], tolerance: u8) -> bool {
    pixel
        .0
        .iter()
        .zip(expected.iter())
        .all(|(a, b)| a.abs_diff(*b) <= tolerance)
}

// =============================================================================
// Test Server
// =============================================================================

/// A complete router over a temporary data directory.
pub struct TestServer {
    pub router: Router,
    pub source: Arc<MockImageSource>,
    pub store: Arc<CacheStore>,
    pub dir: TempDir,
}

impl TestServer {
    pub fn new(source: MockImageSource) -> Self {
        Self::with_config(source, AcquirerConfig::default(), BuilderConfig::default())
    }

    pub fn with_config(
        source: MockImageSource,
        acquirer_config: AcquirerConfig,
        builder_config: BuilderConfig,
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(CacheStore::in_data_dir(dir.path()));
        let source = Arc::new(source);

        let acquirer = Arc::new(SourceImageAcquirer::new(
            Arc::clone(&source),
            Arc::clone(&store),
            CardRenderer::without_font(),
            acquirer_config,
        ));
        let builder = Arc::new(CollectionBuilder::new(
            acquirer,
            Arc::clone(&store),
            builder_config,
        ));
        let composer = Arc::new(TileComposer::new(
            Arc::clone(&store),
            Arc::new(DecodedImageCache::new()),
            JpegTileEncoder::new(),
        ));

        let router = create_router(
            AppState::new(builder, composer),
            RouterConfig::new().with_tracing(false),
        );

        Self {
            router,
            source,
            store,
            dir,
        }
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response<Body> {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_empty(&self, uri: &str) -> Response<Body> {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Build a collection and return its id.
    pub async fn build(&self, body: serde_json::Value) -> String {
        let response = self.post_json("/collections", body).await;
        assert_eq!(response.status(), 200);
        response
            .headers()
            .get("x-collection-id")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }
}

/// JSON entity with a thumbnail facet.
pub fn entity_with_thumbnail(id: &str, label: &str, thumbnail: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "label": label,
        "facets": { "thumbnail": [thumbnail] }
    })
}
