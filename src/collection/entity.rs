//! Inbound entities and image reference derivation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::acquire::{CARD_PREFIX, UPLOAD_PREFIX};

/// Facet names holding a declared thumbnail, preferred over [`IMAGE_FACETS`].
pub const THUMBNAIL_FACETS: &[&str] = &["thumbnail", "http://dbpedia.org/ontology/thumbnail"];

/// Facet names holding a generic image.
pub const IMAGE_FACETS: &[&str] = &["img", "image", "http://xmlns.com/foaf/0.1/img"];

/// File extensions accepted for local uploads.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp"];

/// One row of a query result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity identifier, usually an IRI
    pub id: String,

    /// Display label
    pub label: String,

    /// Facet name to values
    #[serde(default)]
    pub facets: BTreeMap<String, Vec<String>>,

    /// File name of an image already uploaded to the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_image: Option<String>,
}

impl Entity {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            facets: BTreeMap::new(),
            local_image: None,
        }
    }

    pub fn with_facet(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.facets.entry(name.into()).or_default().push(value.into());
        self
    }

    pub fn with_local_image(mut self, file_name: impl Into<String>) -> Self {
        self.local_image = Some(file_name.into());
        self
    }

    /// Choose the image reference for this entity.
    ///
    /// First match wins: a local upload with an image extension, a thumbnail
    /// facet, an image facet, else the `id:` placeholder sentinel.
    pub fn image_reference(&self) -> String {
        if let Some(name) = self.local_image.as_deref().filter(|n| is_image_file(n)) {
            return format!("{UPLOAD_PREFIX}{name}");
        }

        THUMBNAIL_FACETS
            .iter()
            .chain(IMAGE_FACETS)
            .find_map(|facet| self.first_value(facet))
            .map(str::to_string)
            .unwrap_or_else(|| placeholder_reference(&self.id))
    }

    fn first_value(&self, facet: &str) -> Option<&str> {
        self.facets
            .get(facet)?
            .iter()
            .map(|v| v.trim())
            .find(|v| is_usable_reference(v))
    }
}

/// Sentinel reference asking for an ID card.
pub fn placeholder_reference(entity_id: &str) -> String {
    format!("{CARD_PREFIX}{entity_id}.jpg")
}

/// Whether `name` has an image file extension.
pub fn is_image_file(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

// References are persisted one per line
fn is_usable_reference(value: &str) -> bool {
    !value.is_empty() && !value.contains(['\n', '\r'])
}

/// Whether a facet only carries an image and is not shown as metadata.
pub fn is_image_facet(name: &str) -> bool {
    THUMBNAIL_FACETS.contains(&name)
}
