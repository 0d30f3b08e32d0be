//! API integration tests for collection building and tile retrieval.
//!
//! Tests verify:
//! - Collection creation and the collection documents
//! - Morton-ordered tile composition
//! - Single image descriptors and tiles
//! - Error cases (unknown collection, invalid zoom, malformed tile names)
//! - HTTP response codes and headers

use http_body_util::BodyExt;
use serde_json::json;

use super::test_utils::{
    color_near, create_test_jpeg, decode_tile, entity_with_thumbnail, is_valid_jpeg,
    MockImageSource, TestServer,
};

const RED: [u8; 3] = [220, 20, 20];
const BLUE: [u8; 3] = [20, 20, 220];
const GREEN: [u8; 3] = [20, 200, 20];
const BACKGROUND: [u8; 3] = [238, 241, 245];

fn three_city_source() -> MockImageSource {
    MockImageSource::new()
        .with_image("http://img.test/berlin.jpg", create_test_jpeg(64, 64, RED))
        .with_image("http://img.test/paris.jpg", create_test_jpeg(64, 64, BLUE))
        .with_image("http://img.test/rome.jpg", create_test_jpeg(64, 64, GREEN))
}

fn three_cities() -> serde_json::Value {
    json!({
        "query": "SELECT ?city WHERE { ?city a dbo:City }",
        "title": "Cities",
        "entities": [
            entity_with_thumbnail("http://dbpedia.org/resource/Berlin", "Berlin", "http://img.test/berlin.jpg"),
            entity_with_thumbnail("http://dbpedia.org/resource/Paris", "Paris", "http://img.test/paris.jpg"),
            entity_with_thumbnail("http://dbpedia.org/resource/Rome", "Rome", "http://img.test/rome.jpg"),
        ]
    })
}

async fn body_bytes(response: axum::http::Response<axum::body::Body>) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let server = TestServer::new(MockImageSource::new());

    let response = server.get("/health").await;
    assert_eq!(response.status(), 200);

    let body = body_bytes(response).await;
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
}

// =============================================================================
// Collection Creation
// =============================================================================

#[tokio::test]
async fn test_create_collection_returns_markup() {
    let server = TestServer::new(three_city_source());

    let response = server.post_json("/collections", three_cities()).await;
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/xml; charset=utf-8"
    );
    assert!(response.headers().contains_key("x-collection-id"));
    assert_eq!(response.headers().get("x-collection-cached").unwrap(), "false");
    assert_eq!(response.headers().get("x-collection-complete").unwrap(), "true");

    let body = body_bytes(response).await;
    let markup = String::from_utf8(body.to_vec()).unwrap();
    assert!(markup.contains("Name=\"Cities\""));
    assert!(markup.contains("Name=\"Berlin\""));
    assert!(markup.contains("Img=\"#0\""));
    assert!(markup.contains("Img=\"#2\""));
    assert!(markup.trim_end().ends_with("</Collection>"));

    assert_eq!(server.source.fetch_count(), 3);
}

#[tokio::test]
async fn test_repeated_request_is_cached() {
    let server = TestServer::new(three_city_source());

    let first = server.build(three_cities()).await;
    let response = server.post_json("/collections", three_cities()).await;

    assert_eq!(response.headers().get("x-collection-id").unwrap(), first.as_str());
    assert_eq!(response.headers().get("x-collection-cached").unwrap(), "true");
    assert_eq!(server.source.fetch_count(), 3);
}

#[tokio::test]
async fn test_malformed_request_rejected() {
    let server = TestServer::new(MockImageSource::new());

    let response = server
        .post_json("/collections", json!({ "entities": "not a list" }))
        .await;
    assert!(response.status().is_client_error());
}

// =============================================================================
// Collection Documents
// =============================================================================

#[tokio::test]
async fn test_collection_documents() {
    let server = TestServer::new(three_city_source());
    let id = server.build(three_cities()).await;

    let response = server.get(&format!("/collections/{id}.xml")).await;
    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("cache-control"));
    let dzc = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    assert!(dzc.contains("MaxLevel=\"8\""));
    assert!(dzc.contains("TileSize=\"256\""));
    assert!(dzc.contains("NextItemId=\"3\""));
    assert_eq!(dzc.matches("<I Id=").count(), 3);

    let response = server.get(&format!("/collections/{id}.cxml")).await;
    assert_eq!(response.status(), 200);
    let cxml = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    assert!(cxml.contains(&format!("ImgBase=\"/collections/{id}.xml\"")));
}

#[tokio::test]
async fn test_unknown_collection_documents() {
    let server = TestServer::new(MockImageSource::new());

    assert_eq!(server.get("/collections/12345.xml").await.status(), 404);
    assert_eq!(server.get("/collections/12345.cxml").await.status(), 404);
    assert_eq!(server.get("/collections/abc.xml").await.status(), 404);

    let id = server.build(three_cities()).await;
    assert_eq!(server.get(&format!("/collections/{id}.json")).await.status(), 404);
}

// =============================================================================
// Collection Tiles
// =============================================================================

#[tokio::test]
async fn test_tiles_follow_morton_order() {
    let server = TestServer::new(three_city_source());
    let id = server.build(three_cities()).await;

    // At the deepest zoom every tile holds one image: index morton(row, column)
    for (tile, expected) in [("0_0", RED), ("1_0", BLUE), ("0_1", GREEN)] {
        let response = server.get(&format!("/tiles/{id}/8/{tile}.jpg")).await;
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers().get("content-type").unwrap(), "image/jpeg");

        let body = body_bytes(response).await;
        assert!(is_valid_jpeg(&body));
        let tile_image = decode_tile(&body);
        assert_eq!(tile_image.dimensions(), (256, 256));
        assert!(
            color_near(tile_image.get_pixel(128, 128), expected, 24),
            "tile {tile} center was {:?}",
            tile_image.get_pixel(128, 128)
        );
    }
}

#[tokio::test]
async fn test_zoomed_out_tile_composes_grid() {
    let server = TestServer::new(three_city_source());
    let id = server.build(three_cities()).await;

    // Zoom 7 packs a 2x2 grid of 128px cells into one tile
    let response = server.get(&format!("/tiles/{id}/7/0_0.jpg")).await;
    let tile_image = decode_tile(&body_bytes(response).await);

    assert!(color_near(tile_image.get_pixel(64, 64), RED, 24));
    assert!(color_near(tile_image.get_pixel(192, 64), BLUE, 24));
    assert!(color_near(tile_image.get_pixel(64, 192), GREEN, 24));
    // Fourth cell has no image
    assert!(color_near(tile_image.get_pixel(192, 192), BACKGROUND, 8));
}

#[tokio::test]
async fn test_tile_beyond_collection_is_blank() {
    let server = TestServer::new(three_city_source());
    let id = server.build(three_cities()).await;

    let response = server.get(&format!("/tiles/{id}/8/5_5.jpg")).await;
    assert_eq!(response.status(), 200);

    let tile_image = decode_tile(&body_bytes(response).await);
    assert!(color_near(tile_image.get_pixel(128, 128), BACKGROUND, 8));
}

#[tokio::test]
async fn test_viewer_tile_path() {
    let server = TestServer::new(three_city_source());
    let id = server.build(three_cities()).await;

    let response = server.get(&format!("/collections/{id}_files/8/0_0.jpg")).await;
    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("cache-control"));

    assert_eq!(server.get("/collections/nope/8/0_0.jpg").await.status(), 404);
}

#[tokio::test]
async fn test_tile_errors() {
    let server = TestServer::new(three_city_source());
    let id = server.build(three_cities()).await;

    // Zoom above the pyramid
    let response = server.get(&format!("/tiles/{id}/9/0_0.jpg")).await;
    assert_eq!(response.status(), 400);
    let body = body_bytes(response).await;
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "invalid_zoom");

    // Malformed tile name
    let response = server.get(&format!("/tiles/{id}/8/a_b.jpg")).await;
    assert_eq!(response.status(), 400);

    // Unknown collection
    let response = server.get("/tiles/999/8/0_0.jpg").await;
    assert_eq!(response.status(), 404);
}

// =============================================================================
// Single Images
// =============================================================================

#[tokio::test]
async fn test_image_descriptor_and_tile() {
    let server = TestServer::new(three_city_source());
    let id = server.build(three_cities()).await;

    let response = server.get(&format!("/collections/{id}.xml")).await;
    let dzc = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    let source = dzc
        .split("Source=\"")
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .unwrap()
        .to_string();
    assert!(source.starts_with("dzimages/"));
    let stem = source.trim_end_matches(".xml");

    for prefix in ["", "/collections"] {
        let response = server.get(&format!("{prefix}/{source}")).await;
        assert_eq!(response.status(), 200, "descriptor under '{prefix}'");
        let xml = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
        assert!(xml.contains("Width=\"200\""));

        let response = server.get(&format!("{prefix}/{stem}_files/6/0_0.jpg")).await;
        assert_eq!(response.status(), 200);
        let tile_image = decode_tile(&body_bytes(response).await);
        assert_eq!(tile_image.dimensions(), (200, 200));
        assert!(color_near(tile_image.get_pixel(100, 100), RED, 24));
    }

    // Only one tile per level
    let response = server.get(&format!("/{stem}_files/6/1_0.jpg")).await;
    assert_eq!(response.status(), 400);
    // Card pyramids stop at zoom 6
    let response = server.get(&format!("/{stem}_files/7/0_0.jpg")).await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_image_tile_by_file_name() {
    let server = TestServer::new(three_city_source());
    let id = server.build(three_cities()).await;

    let response = server.get(&format!("/collections/{id}.xml")).await;
    let dzc = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    let name = dzc
        .split("Source=\"dzimages/")
        .nth(1)
        .and_then(|rest| rest.split(".xml").next())
        .and_then(|path| path.split('/').nth(1))
        .unwrap()
        .to_string();

    let response = server.get(&format!("/tiles/{name}/6/0_0.jpg")).await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/jpeg");
    let tile_image = decode_tile(&body_bytes(response).await);
    assert_eq!(tile_image.dimensions(), (200, 200));
    assert!(color_near(tile_image.get_pixel(100, 100), RED, 24));

    let response = server.get(&format!("/tiles/{name}/6/1_0.jpg")).await;
    assert_eq!(response.status(), 400);
    let response = server.get(&format!("/tiles/{name}/7/0_0.jpg")).await;
    assert_eq!(response.status(), 400);

    // The collection id itself still resolves to the collection
    let response = server.get(&format!("/tiles/{id}/6/0_0.jpg")).await;
    assert_eq!(decode_tile(&body_bytes(response).await).dimensions(), (256, 256));

    // A file name with no acquired image is unknown
    assert_eq!(server.get("/tiles/-42/6/0_0.jpg").await.status(), 404);
}

#[tokio::test]
async fn test_unknown_image_paths() {
    let server = TestServer::new(MockImageSource::new());

    assert_eq!(server.get("/dzimages/aa/not-a-hash.xml").await.status(), 404);
    // Shard must match the name
    assert_eq!(server.get("/dzimages/zz/1794106052.xml").await.status(), 404);
    assert_eq!(
        server.get("/dzimages/60/1794106052.json").await.status(),
        404
    );
}

// =============================================================================
// Data Changes
// =============================================================================

#[tokio::test]
async fn test_data_changed_forces_rebuild() {
    let server = TestServer::new(three_city_source());
    let first = server.build(three_cities()).await;

    let response = server.post_empty("/data-changed").await;
    assert_eq!(response.status(), 204);

    let response = server.post_json("/collections", three_cities()).await;
    assert_eq!(response.headers().get("x-collection-cached").unwrap(), "false");
    let second = response
        .headers()
        .get("x-collection-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_ne!(first, second);

    // Images survive the invalidation
    assert_eq!(server.source.fetch_count(), 3);
}
