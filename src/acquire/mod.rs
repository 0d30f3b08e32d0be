//! Source image acquisition.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          SourceImageAcquirer            │
//! │  ┌─────────────┐     ┌──────────────┐   │
//! │  │ ImageSource │     │ CardRenderer │   │
//! │  │ (download,  │     │ (label on a  │   │
//! │  │  search)    │     │  blank card) │   │
//! │  └─────────────┘     └──────────────┘   │
//! └────────────────────┬────────────────────┘
//!                      │ one file per reference
//!                      ▼
//!            imageCache/{shard}/{file}
//! ```
//!
//! Acquisitions run as detached tasks; each collection build counts its own
//! with an [`AcquisitionTracker`].

mod acquirer;
mod card;
mod source;
mod tracker;

pub use acquirer::{
    small_variant, AcquireJob, AcquireOutcome, AcquirerConfig, SourceImageAcquirer, CARD_PREFIX,
    UPLOAD_PREFIX,
};
pub use card::{fit_font_size, CardRenderer, CARD_FONT_SIZE, CARD_SIZE};
pub use source::{
    parse_search_response, HttpImageSource, ImageSource, DEFAULT_FETCH_TIMEOUT,
    DEFAULT_IMAGE_SEARCH_URL,
};
pub use tracker::{AcquisitionTracker, WorkGuard};
