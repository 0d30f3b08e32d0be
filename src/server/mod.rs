//! HTTP server layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │   POST /collections          GET /tiles/{id}/{zoom}/{x}_{y}.jpg │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │  handlers   │  │     dzi     │  │        routes           │  │
//! │  │ (requests)  │  │ (paths and  │  │  (router config)        │  │
//! │  │             │  │ descriptors)│  │                         │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod dzi;
pub mod handlers;
pub mod routes;

pub use handlers::{
    collection_document_handler, collection_files_handler, create_collection_handler,
    data_changed_handler, dzi_descriptor_handler, health_handler, image_tile_handler,
    tile_handler, AppState, ErrorResponse, HealthResponse, COLLECTION_CACHED_HEADER,
    COLLECTION_COMPLETE_HEADER, COLLECTION_ID_HEADER,
};
pub use routes::{create_router, RouterConfig, DEFAULT_CACHE_MAX_AGE};
