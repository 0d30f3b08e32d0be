//! Tile layer.
//!
//! Tiles are composed lazily per request from the images cached on disk.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              TileComposer               │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │  addressing  │  │  JPEG Encoder   │  │
//! │  │  (Morton     │  │  (canvas →      │  │
//! │  │   order)     │  │   JPEG)         │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │     CacheStore + DecodedImageCache      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileComposer`]: loads the image list, resolves images and draws the canvas
//! - [`select_indices`] / [`morton`]: map a tile to global image indices
//! - [`JpegTileEncoder`]: encodes the finished canvas

mod addressing;
mod composer;
mod encoder;

pub use addressing::{morton, resize_factor, select_indices, unmorton, CellIndex};
pub use composer::{
    compose_canvas, flatten, letterbox, Letterbox, PyramidMode, TileComposer, TileRequest,
    BACKGROUND, ITEM_SIZE,
};
pub use encoder::{
    clamp_quality, is_valid_quality, JpegTileEncoder, DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY,
    MIN_JPEG_QUALITY,
};
