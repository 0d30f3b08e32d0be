//! Collection image list and its Deep Zoom collection document.
//!
//! The image list is the flat, order-stable document list every tile of the
//! collection pyramid is addressed against. Each distinct reference gets the
//! next index the first time it is seen.
//!
//! # Example Output
//!
//! ```xml
//! <?xml version="1.0" encoding="utf-8"?>
//! <Collection MaxLevel="8" TileSize="256" Format="jpg" NextItemId="2" ServerFormat="Default" xmlns="http://schemas.microsoft.com/deepzoom/2009">
//! <Items>
//! <I Id="0" N="0" Source="dzimages/74/-1634174540.xml"><Size Width="200" Height="200"/></I><I Id="1" N="1" ...></I></Items>
//! </Collection>
//! ```

use std::collections::HashMap;
use std::fmt::Write;

use crate::cache::ImageFile;
use crate::tile::{PyramidMode, ITEM_SIZE};

/// Ordered, deduplicated image references of one collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageList {
    images: Vec<String>,
    index: HashMap<String, usize>,
}

impl ImageList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `reference`, assigning the next one if it is new.
    ///
    /// Returns `(index, newly_assigned)`.
    pub fn assign(&mut self, reference: impl Into<String>) -> (usize, bool) {
        let reference = reference.into();
        if let Some(&index) = self.index.get(&reference) {
            return (index, false);
        }
        let index = self.images.len();
        self.index.insert(reference.clone(), index);
        self.images.push(reference);
        (index, true)
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Render the Deep Zoom collection document.
    pub fn to_dzc_xml(&self) -> String {
        let mode = PyramidMode::Collection;
        let mut xml = format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
             <Collection MaxLevel=\"{}\" TileSize=\"{}\" Format=\"jpg\" NextItemId=\"{}\" \
             ServerFormat=\"Default\" xmlns=\"http://schemas.microsoft.com/deepzoom/2009\">\n\
             <Items>\n",
            mode.max_zoom(),
            mode.canvas_size(),
            self.images.len(),
        );
        for (id, reference) in self.images.iter().enumerate() {
            let _ = write!(
                xml,
                "<I Id=\"{id}\" N=\"{id}\" Source=\"{}\"><Size Width=\"{ITEM_SIZE}\" Height=\"{ITEM_SIZE}\"/></I>",
                ImageFile::for_reference(reference).source_path()
            );
        }
        xml.push_str("</Items>\n</Collection>");
        xml
    }
}
