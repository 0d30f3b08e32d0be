//! Pivot collection markup (CXML).
//!
//! Lists the facet categories of a result and one `<Item>` per entity.
//! Items point into the Deep Zoom collection through `Img="#{index}"`, where
//! the index is the entity's position in the collection's image list.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write;

use url::Url;

use super::entity::{is_image_facet, Entity};

/// Label of the single item shown for an empty result.
pub const NOTHING_FOUND: &str = "Nothing found";

/// Facet names the viewer reserves for itself.
const RESERVED_FACETS: &[&str] = &["name", "description", "home"];

/// Facet names never shown as categories.
const HIDDEN_FACETS: &[&str] = &["name"];

const CATEGORY_PREFIX: &str = "category:";

/// Strip characters the viewer cannot display and escape markup.
///
/// Control characters (C0, DEL and C1) and square brackets are dropped;
/// `<`, `>`, `&`, `'` and `"` become hex character references.
pub fn clean_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for c in label.chars() {
        match c {
            c if c.is_control() => {}
            '[' | ']' => {}
            '<' | '>' | '&' | '\'' | '"' => {
                let _ = write!(out, "&#x{:x};", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Escape a string for use inside an XML attribute.
pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Rename facets that clash with the viewer's reserved names.
pub fn facet_display_name(name: &str) -> String {
    let name = name.trim();
    if RESERVED_FACETS.iter().any(|r| name.eq_ignore_ascii_case(r)) {
        format!("{name}.")
    } else {
        name.to_string()
    }
}

fn is_shown_facet(name: &str) -> bool {
    !is_image_facet(name) && !HIDDEN_FACETS.contains(&name.trim()) && !name.trim().is_empty()
}

/// Facet categories across `entities`: sorted, and unique ignoring case.
pub fn facet_categories<'a>(entities: impl IntoIterator<Item = &'a Entity>) -> Vec<String> {
    let names: BTreeSet<&str> = entities
        .into_iter()
        .flat_map(|e| e.facets.keys())
        .map(String::as_str)
        .filter(|name| is_shown_facet(name))
        .collect();

    let mut seen = BTreeSet::new();
    names
        .into_iter()
        .map(facet_display_name)
        .filter(|name| seen.insert(name.to_lowercase()))
        .collect()
}

/// Writer for one collection document.
///
/// Item facets are written under the declared category that matches their
/// name ignoring case.
pub struct CxmlDocument {
    xml: String,
    items: usize,
    categories: HashMap<String, String>,
}

impl CxmlDocument {
    /// Start a document with its header and facet categories.
    pub fn new(title: &str, img_base: &str, categories: &[String]) -> Self {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        let _ = writeln!(
            xml,
            "<Collection Name=\"{}\" SchemaVersion=\"1.0\"",
            escape_xml(title)
        );
        xml.push_str(" xmlns=\"http://schemas.microsoft.com/collection/metadata/2009\"\n");
        xml.push_str(" xmlns:p=\"http://schemas.microsoft.com/livelabs/pivot/collection/2009\"\n");
        xml.push_str(" xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\"\n");
        xml.push_str(" xmlns:xsd=\"http://www.w3.org/2001/XMLSchema\">\n");

        xml.push_str("<FacetCategories>\n");
        for name in categories {
            let name = escape_xml(name);
            let _ = writeln!(
                xml,
                "<FacetCategory Name=\"{name}\" Type=\"String\" p:IsFilterVisible=\"true\" p:IsMetaDataVisible=\"false\" />"
            );
            let _ = writeln!(
                xml,
                "<FacetCategory Name=\"{name}:\" Type=\"Link\" p:IsFilterVisible=\"false\" p:IsMetaDataVisible=\"true\" />"
            );
        }
        xml.push_str("<FacetCategory Name=\"Home\" Type=\"Link\" p:IsFilterVisible=\"false\" p:IsMetaDataVisible=\"true\" />\n");
        xml.push_str("</FacetCategories>\n");
        let _ = writeln!(xml, "<Items ImgBase=\"{}\">", escape_xml(img_base));

        let categories = categories
            .iter()
            .map(|name| (name.to_lowercase(), name.clone()))
            .collect();

        Self {
            xml,
            items: 0,
            categories,
        }
    }

    /// Append one entity drawn from image `image_index`.
    ///
    /// Returns `false` (and writes nothing) if the cleaned label is empty.
    pub fn push_item(&mut self, entity: &Entity, image_index: usize) -> bool {
        let label = clean_label(&entity.label);
        if label.trim().is_empty() {
            return false;
        }

        let _ = writeln!(
            self.xml,
            "<Item Img=\"#{image_index}\" Id=\"{}\" Href=\"{}\" Name=\"{label}\">",
            self.items,
            escape_xml(&entity.id)
        );

        let facets = self.item_facets(entity);
        if !facets.is_empty() {
            let _ = writeln!(self.xml, "<Facets>{facets}</Facets>");
        }
        self.xml.push_str("</Item>\n");
        self.items += 1;
        true
    }

    pub fn item_count(&self) -> usize {
        self.items
    }

    /// Close the document, adding the "Nothing found" item if it is empty.
    pub fn finish(mut self) -> String {
        if self.items == 0 {
            let _ = writeln!(
                self.xml,
                "<Item Img=\"#0\" Id=\"0\" Name=\"{NOTHING_FOUND}\">\n</Item>"
            );
        }
        self.xml.push_str("</Items>\n</Collection>\n");
        self.xml
    }

    fn category_name(&self, facet: &str) -> String {
        let name = facet_display_name(facet);
        self.categories
            .get(&name.to_lowercase())
            .cloned()
            .unwrap_or(name)
    }

    fn item_facets(&self, entity: &Entity) -> String {
        // Keys differing only in case share one category
        let mut grouped: BTreeMap<String, (String, String)> = BTreeMap::new();
        for (name, values) in &entity.facets {
            if !is_shown_facet(name) {
                continue;
            }

            let (strings, links) = grouped.entry(self.category_name(name)).or_default();
            for value in values {
                let mut label = clean_label(value);
                if label.is_empty() {
                    continue;
                }
                if label
                    .get(..CATEGORY_PREFIX.len())
                    .is_some_and(|p| p.eq_ignore_ascii_case(CATEGORY_PREFIX))
                {
                    label.drain(..CATEGORY_PREFIX.len());
                }

                let href = Url::parse(value.trim())
                    .ok()
                    .filter(|u| matches!(u.scheme(), "http" | "https"))
                    .map(|u| escape_xml(u.as_str()))
                    .unwrap_or_else(|| "#".to_string());
                let _ = write!(strings, "<String Value=\"{label}\"/>");
                let _ = write!(links, "<Link Href=\"{href}\" Name=\"{label}\"/>");
            }
        }

        let mut out = String::new();
        for (name, (strings, links)) in grouped {
            if strings.is_empty() {
                continue;
            }
            let name = escape_xml(&name);
            let _ = write!(out, "<Facet Name=\"{name}\">{strings}</Facet>");
            let _ = write!(out, "<Facet Name=\"{name}:\">{links}</Facet>");
        }
        out
    }
}
