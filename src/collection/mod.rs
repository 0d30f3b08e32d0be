//! Collection building.
//!
//! Turns an ordered query result into a pivot collection:
//!
//! - [`Entity`]: one result row and its image reference
//! - [`ImageList`]: first-seen, deduplicated image list and its DZC document
//! - [`CxmlDocument`]: facet categories and items of the collection markup
//! - [`CollectionBuilder`]: dispatches acquisitions and persists everything

mod builder;
mod cxml;
mod entity;
mod manifest;

pub use builder::{
    BuildRequest, BuilderConfig, BuiltCollection, CollectionBuilder, DEFAULT_ACQUIRE_TIMEOUT,
    DEFAULT_MAX_ENTITIES,
};
pub use cxml::{
    clean_label, escape_xml, facet_categories, facet_display_name, CxmlDocument, NOTHING_FOUND,
};
pub use entity::{
    is_image_file, placeholder_reference, Entity, IMAGE_FACETS, THUMBNAIL_FACETS,
};
pub use manifest::ImageList;
