//! JPEG tile encoder.
//!
//! Composed tiles are plain RGB canvases; this module turns them into the
//! JPEG bytes served to the viewer.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use crate::error::TileError;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

// =============================================================================
// JPEG Encoder
// =============================================================================

/// Encodes composed canvases as JPEG at a fixed quality.
#[derive(Debug, Clone, Copy)]
pub struct JpegTileEncoder {
    quality: u8,
}

impl JpegTileEncoder {
    /// Create an encoder at [`DEFAULT_JPEG_QUALITY`].
    pub fn new() -> Self {
        Self::with_quality(DEFAULT_JPEG_QUALITY)
    }

    /// Create an encoder at the given quality, clamped to 1-100.
    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality: clamp_quality(quality),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode an RGB canvas.
    ///
    /// # Errors
    ///
    /// Returns [`TileError::EncodeError`] if the JPEG encoder rejects the
    /// image (e.g. zero-sized canvas).
    pub fn encode(&self, canvas: &RgbImage) -> Result<Bytes, TileError> {
        let mut output = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut output, self.quality);

        encoder
            .encode_image(canvas)
            .map_err(|e| TileError::EncodeError {
                message: e.to_string(),
            })?;

        Ok(Bytes::from(output))
    }
}

impl Default for JpegTileEncoder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Validate JPEG quality parameter.
///
/// Returns `true` if quality is in the valid range (1-100).
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
