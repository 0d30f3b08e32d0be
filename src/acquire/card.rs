//! Placeholder "ID card" images.
//!
//! When no real picture of an entity can be found, its label is rendered as
//! centered black text on a transparent 200x200 card. The composer flattens
//! the card onto the tile background, so it reads as a caption in the grid.
//!
//! Labels start at 20px and shrink proportionally until they fit the card
//! width. Cards are drawn with DejaVu Sans Bold, which is compiled into the
//! binary. A font file given with `--font` replaces it.

use std::io::Cursor;
use std::path::Path;

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use tracing::{debug, warn};

/// Card edge length in pixels.
pub const CARD_SIZE: u32 = 200;

/// Starting font size in pixels.
pub const CARD_FONT_SIZE: f32 = 20.0;

const TEXT_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);
const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

static BUNDLED_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans-Bold.ttf");

/// Font size that makes a label of `label_width` (measured at `base_size`)
/// fit `canvas_width`.
///
/// Labels narrower than the canvas keep `base_size`; wider ones shrink
/// proportionally, rounded down to whole pixels.
pub fn fit_font_size(label_width: u32, base_size: f32, canvas_width: u32) -> f32 {
    if label_width < canvas_width {
        return base_size;
    }
    (base_size * canvas_width as f32 / label_width as f32)
        .floor()
        .max(1.0)
}

/// Renders ID cards.
///
/// A renderer built with [`CardRenderer::without_font`] draws blank cards.
/// They still occupy their slot in the collection.
#[derive(Clone)]
pub struct CardRenderer {
    font: Option<FontArc>,
}

impl CardRenderer {
    /// Load the font at `font_path`, or the bundled font when none is given.
    ///
    /// An unreadable or invalid font file is logged and replaced by the
    /// bundled font.
    pub fn new(font_path: Option<&Path>) -> Self {
        if let Some(path) = font_path {
            match std::fs::read(path) {
                Ok(data) => match FontArc::try_from_vec(data) {
                    Ok(font) => {
                        debug!(path = %path.display(), "Loaded card font");
                        return Self::with_font(font);
                    }
                    Err(e) => warn!(
                        path = %path.display(),
                        error = %e,
                        "Invalid font file, using bundled font"
                    ),
                },
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "Cannot read font file, using bundled font"
                ),
            }
        }
        Self::bundled()
    }

    /// Renderer using the font compiled into the binary.
    pub fn bundled() -> Self {
        match FontArc::try_from_slice(BUNDLED_FONT) {
            Ok(font) => Self::with_font(font),
            Err(e) => {
                warn!(error = %e, "Bundled font is invalid, ID cards will have no labels");
                Self::without_font()
            }
        }
    }

    pub fn with_font(font: FontArc) -> Self {
        Self { font: Some(font) }
    }

    pub fn without_font() -> Self {
        Self { font: None }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Render `label` onto a transparent card.
    pub fn render(&self, label: &str) -> RgbaImage {
        let mut card = RgbaImage::from_pixel(CARD_SIZE, CARD_SIZE, CLEAR);
        let Some(font) = &self.font else {
            return card;
        };
        if label.trim().is_empty() {
            return card;
        }

        let (base_width, _) = text_size(PxScale::from(CARD_FONT_SIZE), font, label);
        let size = fit_font_size(base_width, CARD_FONT_SIZE, CARD_SIZE);
        let scale = PxScale::from(size);

        let (text_width, _) = text_size(scale, font, label);
        let metrics = font.as_scaled(scale);
        let line_height = metrics.ascent() - metrics.descent();

        let x = (CARD_SIZE as i32 - text_width as i32) / 2;
        let y = ((CARD_SIZE as f32 - line_height) / 2.0).round() as i32;

        draw_text_mut(&mut card, TEXT_COLOR, x.max(0), y.max(0), scale, font, label);
        card
    }

    /// Render `label` and encode the card as PNG.
    pub fn render_png(&self, label: &str) -> Result<Vec<u8>, image::ImageError> {
        let card = self.render(label);
        let mut buf = Vec::new();
        card.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        Ok(buf)
    }
}
