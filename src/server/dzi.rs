//! Deep Zoom path and descriptor helpers.
//!
//! Deep Zoom viewers derive every URL from the document they loaded:
//!
//! ```text
//! /collections/{id}.xml            → /collections/{id}_files/{zoom}/{x}_{y}.jpg
//! /dzimages/{shard}/{file}.xml     → /dzimages/{shard}/{file}_files/{zoom}/0_0.jpg
//! ```
//!
//! axum captures whole path segments, so handlers take `{id}.xml`,
//! `{file}_files` and `{x}_{y}.jpg` as one parameter and split them here.

/// Generate the Deep Zoom descriptor of a single image.
///
/// # Example Output
///
/// ```xml
/// <?xml version="1.0" encoding="UTF-8"?>
/// <Image xmlns="http://schemas.microsoft.com/deepzoom/2008"
///        TileSize="256"
///        Overlap="0"
///        Format="jpg">
///   <Size Width="200" Height="200" />
/// </Image>
/// ```
pub fn generate_dzi_xml(width: u32, height: u32, tile_size: u32) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Image xmlns="http://schemas.microsoft.com/deepzoom/2008"
       TileSize="{tile_size}"
       Overlap="0"
       Format="jpg">
  <Size Width="{width}" Height="{height}" />
</Image>"#
    )
}

/// Parse tile coordinates from a filename like "3_5.jpg" or "3_5".
///
/// Returns `(column, row)`.
pub fn parse_dzi_tile_coords(filename: &str) -> Option<(u32, u32)> {
    let name = filename
        .strip_suffix(".jpg")
        .or_else(|| filename.strip_suffix(".jpeg"))
        .unwrap_or(filename);

    let (x, y) = name.split_once('_')?;
    Some((x.parse().ok()?, y.parse().ok()?))
}

/// Split `"name.ext"` at its last dot. Both parts must be non-empty.
pub fn split_extension(filename: &str) -> Option<(&str, &str)> {
    filename
        .rsplit_once('.')
        .filter(|(name, ext)| !name.is_empty() && !ext.is_empty())
}

/// `"{name}_files"` → `"{name}"`.
pub fn strip_files_suffix(dir: &str) -> Option<&str> {
    dir.strip_suffix("_files").filter(|name| !name.is_empty())
}
