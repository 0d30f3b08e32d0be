//! Tile composition.
//!
//! A tile is a fixed-size canvas onto which every image selected by
//! [`select_indices`] is drawn, letterboxed into its grid cell:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        TileComposer                             │
//! │  1. Load image list        4. Letterbox each image into cell    │
//! │  2. Select indices         5. Encode JPEG                       │
//! │  3. Resolve decoded image                                       │
//! │         │                          │                            │
//! │         ▼                          ▼                            │
//! │  ┌───────────────────┐   ┌────────────────────┐                 │
//! │  │ DecodedImageCache │   │     CacheStore     │                 │
//! │  └───────────────────┘   └────────────────────┘                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Composition never fails because of a source image. Missing files, decode
//! errors and out-of-range indices all leave their cell in the background
//! color. The only request-level errors are an unknown collection and a zoom
//! level beyond the pyramid.

use std::sync::Arc;

use bytes::Bytes;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage, Rgba};
use tracing::{debug, warn};

use crate::cache::{CacheKey, CacheNamespace, CacheStore, DecodedImageCache, ImageFile};
use crate::error::TileError;

use super::addressing::{resize_factor, select_indices};
use super::encoder::JpegTileEncoder;

/// Canvas background.
pub const BACKGROUND: Rgb<u8> = Rgb([238, 241, 245]);

/// Pixel size of one item at full resolution.
pub const ITEM_SIZE: u32 = 200;

// =============================================================================
// Pyramid Mode
// =============================================================================

/// The two pyramid shapes served by the composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PyramidMode {
    /// Grid of many items on 256px tiles, deepest zoom 8
    Collection,
    /// A single item on a 200px tile, deepest zoom 6
    IdCard,
}

impl PyramidMode {
    pub fn canvas_size(&self) -> u32 {
        match self {
            PyramidMode::Collection => 256,
            PyramidMode::IdCard => ITEM_SIZE,
        }
    }

    pub fn max_zoom(&self) -> u32 {
        match self {
            PyramidMode::Collection => 8,
            PyramidMode::IdCard => 6,
        }
    }

    /// Resize factor for `zoom`, or [`TileError::InvalidZoom`].
    pub fn resize_factor(&self, zoom: u32) -> Result<u32, TileError> {
        resize_factor(zoom, self.max_zoom()).ok_or(TileError::InvalidZoom {
            zoom,
            max_zoom: self.max_zoom(),
        })
    }
}

// =============================================================================
// Tile Request
// =============================================================================

/// A request for one collection tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRequest {
    pub collection_id: CacheKey,
    pub zoom: u32,
    pub column: u32,
    pub row: u32,
}

impl TileRequest {
    pub fn new(collection_id: CacheKey, zoom: u32, column: u32, row: u32) -> Self {
        Self {
            collection_id,
            zoom,
            column,
            row,
        }
    }
}

// =============================================================================
// Geometry
// =============================================================================

/// Placement of a scaled image inside its square box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Letterbox {
    pub width: u32,
    pub height: u32,
    pub offset_x: u32,
    pub offset_y: u32,
}

/// Fit a `width` x `height` image into a `box_size` square, preserving aspect
/// ratio and centering it. The long side always fills the box.
pub fn letterbox(width: u32, height: u32, box_size: u32) -> Letterbox {
    let box_size = box_size.max(1);
    let (w, h) = (width.max(1) as u64, height.max(1) as u64);
    let b = box_size as u64;

    let (fit_w, fit_h) = if w >= h {
        (b, (h * b / w).max(1))
    } else {
        ((w * b / h).max(1), b)
    };

    Letterbox {
        width: fit_w as u32,
        height: fit_h as u32,
        offset_x: ((b - fit_w) / 2) as u32,
        offset_y: ((b - fit_h) / 2) as u32,
    }
}

/// Draw `cells` onto a fresh canvas for `mode` at `resize_factor`.
///
/// Each cell `(x, y)` starts at pixel `canvas * x / resize_factor` and holds
/// its image letterboxed into an `ITEM_SIZE / resize_factor` box. Cells
/// without an image stay background.
pub fn compose_canvas(
    mode: PyramidMode,
    resize_factor: u32,
    cells: &[(u32, u32, Option<Arc<RgbImage>>)],
) -> RgbImage {
    let size = mode.canvas_size();
    let rf = resize_factor.max(1);
    let mut canvas = RgbImage::from_pixel(size, size, BACKGROUND);
    let item_box = (ITEM_SIZE / rf).max(1);

    for (x, y, image) in cells {
        let Some(image) = image else { continue };

        let fit = letterbox(image.width(), image.height(), item_box);
        let scaled = imageops::resize(&**image, fit.width, fit.height, FilterType::Triangle);

        let cell_x = (size as u64 * *x as u64 / rf as u64) as i64;
        let cell_y = (size as u64 * *y as u64 / rf as u64) as i64;
        imageops::replace(
            &mut canvas,
            &scaled,
            cell_x + fit.offset_x as i64,
            cell_y + fit.offset_y as i64,
        );
    }

    canvas
}

// =============================================================================
// Tile Composer
// =============================================================================

/// Composes collection and ID-card tiles from the disk cache.
pub struct TileComposer {
    store: Arc<CacheStore>,
    decoded: Arc<DecodedImageCache>,
    encoder: JpegTileEncoder,
}

impl TileComposer {
    pub fn new(
        store: Arc<CacheStore>,
        decoded: Arc<DecodedImageCache>,
        encoder: JpegTileEncoder,
    ) -> Self {
        Self {
            store,
            decoded,
            encoder,
        }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Ordered image references for a collection.
    ///
    /// # Errors
    ///
    /// Returns [`TileError::UnknownCollection`] if no image list is cached
    /// under `collection_id`.
    pub async fn image_list(&self, collection_id: CacheKey) -> Result<Vec<String>, TileError> {
        self.store
            .get_lines(CacheNamespace::Image, collection_id)
            .await
            .ok_or_else(|| TileError::UnknownCollection {
                collection_id: collection_id.to_string(),
            })
    }

    /// Compose and encode one collection tile.
    ///
    /// # Errors
    ///
    /// - [`TileError::UnknownCollection`] if the collection has no image list
    /// - [`TileError::InvalidZoom`] if `zoom` exceeds the collection pyramid
    /// - [`TileError::EncodeError`] if JPEG encoding fails
    pub async fn compose_tile(&self, request: &TileRequest) -> Result<Bytes, TileError> {
        let mode = PyramidMode::Collection;
        let rf = mode.resize_factor(request.zoom)?;
        let images = self.image_list(request.collection_id).await?;

        let mut cells = Vec::new();
        for cell in select_indices(rf, request.column, request.row) {
            let Some(reference) = usize::try_from(cell.index)
                .ok()
                .and_then(|i| images.get(i))
            else {
                continue;
            };
            let file = ImageFile::for_reference(reference);
            cells.push((cell.x, cell.y, self.load_image(&file).await));
        }

        debug!(
            collection_id = %request.collection_id,
            zoom = request.zoom,
            column = request.column,
            row = request.row,
            cells = cells.len(),
            "Composing collection tile"
        );

        let canvas = compose_canvas(mode, rf, &cells);
        self.encoder.encode(&canvas)
    }

    /// Compose and encode a tile of a single image's own pyramid.
    ///
    /// # Errors
    ///
    /// - [`TileError::InvalidZoom`] if `zoom` exceeds the ID-card pyramid
    /// - [`TileError::EncodeError`] if JPEG encoding fails
    pub async fn compose_card_tile(&self, file: &ImageFile, zoom: u32) -> Result<Bytes, TileError> {
        let mode = PyramidMode::IdCard;
        let rf = mode.resize_factor(zoom)?;
        let image = self.load_image(file).await;

        let canvas = compose_canvas(mode, rf, &[(0, 0, image)]);
        self.encoder.encode(&canvas)
    }

    /// Whether an acquired image is stored under `file`.
    pub async fn has_image(&self, file: &ImageFile) -> bool {
        self.store.image_exists(file).await
    }

    /// Resolve a decoded image through the in-memory cache.
    ///
    /// A file that does not exist yet is not cached, so the cell fills in as
    /// soon as its acquisition completes. Undecodable files are cached as a
    /// background-colored 1x1 bitmap.
    async fn load_image(&self, file: &ImageFile) -> Option<Arc<RgbImage>> {
        if let Some(image) = self.decoded.get(file.name()).await {
            return Some(image);
        }

        let data = self.store.read_image(file).await?;
        match image::load_from_memory(&data) {
            Ok(decoded) => Some(self.decoded.insert(file.name(), flatten(&decoded)).await),
            Err(e) => {
                warn!(file = file.name(), error = %e, "Failed to decode cached image");
                Some(self.decoded.insert_failure(file.name(), BACKGROUND).await)
            }
        }
    }
}

/// Convert to RGB, blending any alpha channel over [`BACKGROUND`].
///
/// ID cards are transparent PNGs; a plain RGB conversion would turn their
/// background black.
pub fn flatten(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
        let blend = |fg: u8, bg: u8| {
            ((fg as u32 * a as u32 + bg as u32 * (255 - a as u32) + 127) / 255) as u8
        };
        Rgb([
            blend(r, BACKGROUND.0[0]),
            blend(g, BACKGROUND.0[1]),
            blend(b, BACKGROUND.0[2]),
        ])
    })
}

// =============================================================================
// Tests
// =============================================================================
