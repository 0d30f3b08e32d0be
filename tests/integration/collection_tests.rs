//! Collection building tests.
//!
//! Tests verify the acquisition paths seen through the HTTP API:
//! - Shared images are downloaded once and share one grid slot
//! - Fallbacks to the small thumbnail variant, image search and ID cards
//! - Local uploads
//! - Slow sources and the acquisition deadline
//! - Entity limits and empty results

use std::time::Duration;

use dzc_streamer::acquire::AcquirerConfig;
use dzc_streamer::cache::{CacheNamespace, ImageFile};
use dzc_streamer::collection::BuilderConfig;
use http_body_util::BodyExt;
use serde_json::json;

use super::test_utils::{
    color_near, create_test_jpeg, create_test_png, decode_tile, entity_with_thumbnail,
    MockImageSource, TestServer,
};

const RED: [u8; 3] = [220, 20, 20];
const BACKGROUND: [u8; 3] = [238, 241, 245];

async fn body_text(response: axum::http::Response<axum::body::Body>) -> String {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(body.to_vec()).unwrap()
}

async fn dzc_document(server: &TestServer, id: &str) -> String {
    body_text(server.get(&format!("/collections/{id}.xml")).await).await
}

#[tokio::test]
async fn test_shared_images_downloaded_once() {
    let source = MockImageSource::new()
        .with_image("http://img.test/flag.jpg", create_test_jpeg(32, 32, RED));
    let server = TestServer::new(source);

    let id = server
        .build(json!({
            "query": "countries",
            "entities": [
                entity_with_thumbnail("http://x/A", "A", "http://img.test/flag.jpg"),
                entity_with_thumbnail("http://x/B", "B", "http://img.test/flag.jpg"),
                entity_with_thumbnail("http://x/C", "C", "http://img.test/flag.jpg"),
            ]
        }))
        .await;

    assert_eq!(server.source.fetch_count(), 1);

    let dzc = dzc_document(&server, &id).await;
    assert!(dzc.contains("NextItemId=\"1\""));

    let cxml = body_text(server.get(&format!("/collections/{id}.cxml")).await).await;
    assert_eq!(cxml.matches("Img=\"#0\"").count(), 3);
}

#[tokio::test]
async fn test_small_thumbnail_variant_fallback() {
    let source = MockImageSource::new().with_image(
        "http://img.test/thumb/94px-Berlin.jpg",
        create_test_jpeg(32, 32, RED),
    );
    let server = TestServer::new(source);

    let id = server
        .build(json!({
            "query": "berlin",
            "entities": [entity_with_thumbnail(
                "http://x/Berlin",
                "Berlin",
                "http://img.test/thumb/200px-Berlin.jpg"
            )]
        }))
        .await;

    assert_eq!(
        server.source.fetched_urls(),
        vec![
            "http://img.test/thumb/200px-Berlin.jpg".to_string(),
            "http://img.test/thumb/94px-Berlin.jpg".to_string(),
        ]
    );

    let tile = decode_tile(
        &server
            .get(&format!("/tiles/{id}/8/0_0.jpg"))
            .await
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes(),
    );
    assert!(color_near(tile.get_pixel(128, 128), RED, 24));
}

#[tokio::test]
async fn test_image_search_fallback() {
    let source = MockImageSource::new()
        .with_search_hit("Atlantis", "http://search.test/atlantis.jpg")
        .with_image("http://search.test/atlantis.jpg", create_test_jpeg(32, 32, RED));
    let server = TestServer::with_config(
        source,
        AcquirerConfig {
            image_search: true,
            ..Default::default()
        },
        BuilderConfig::default(),
    );

    server
        .build(json!({
            "query": "lost cities",
            "entities": [entity_with_thumbnail("http://x/Atlantis", "Atlantis", "http://gone.test/a.jpg")]
        }))
        .await;

    assert_eq!(server.source.search_count(), 1);
    let file = ImageFile::for_reference("http://gone.test/a.jpg");
    assert!(server.store.image_exists(&file).await);
}

#[tokio::test]
async fn test_search_disabled_falls_back_to_card() {
    let server = TestServer::new(MockImageSource::new());

    server
        .build(json!({
            "query": "broken",
            "entities": [entity_with_thumbnail("http://x/Broken", "Broken", "http://gone.test/b.jpg")]
        }))
        .await;

    assert_eq!(server.source.search_count(), 0);
    let file = ImageFile::for_reference("http://gone.test/b.jpg");
    let data = server.store.read_image(&file).await.unwrap();
    assert_eq!(
        image::guess_format(&data).unwrap(),
        image::ImageFormat::Png
    );
}

#[tokio::test]
async fn test_entity_without_image_gets_card() {
    let server = TestServer::new(MockImageSource::new());

    let id = server
        .build(json!({
            "query": "people",
            "entities": [{ "id": "http://x/Ada", "label": "Ada Lovelace" }]
        }))
        .await;

    // Cards never touch the network
    assert_eq!(server.source.fetch_count(), 0);

    let file = ImageFile::for_reference("id:http://x/Ada.jpg");
    assert!(server.store.image_exists(&file).await);
    assert!(dzc_document(&server, &id).await.contains(&file.source_path()));
}

#[tokio::test]
async fn test_local_upload() {
    let uploads = tempfile::TempDir::new().unwrap();
    std::fs::write(
        uploads.path().join("portrait.png"),
        create_test_png(40, 40, [220, 20, 20, 255]),
    )
    .unwrap();

    let server = TestServer::with_config(
        MockImageSource::new(),
        AcquirerConfig {
            upload_dir: Some(uploads.path().to_path_buf()),
            ..Default::default()
        },
        BuilderConfig::default(),
    );

    let id = server
        .build(json!({
            "query": "uploads",
            "entities": [{
                "id": "http://x/Portrait",
                "label": "Portrait",
                "local_image": "portrait.png",
                "facets": { "thumbnail": ["http://img.test/ignored.jpg"] }
            }]
        }))
        .await;

    assert_eq!(server.source.fetch_count(), 0);

    let response = server.get(&format!("/tiles/{id}/8/0_0.jpg")).await;
    let tile = decode_tile(&response.into_body().collect().await.unwrap().to_bytes());
    assert!(color_near(tile.get_pixel(128, 128), RED, 24));
}

#[tokio::test]
async fn test_slow_source_returns_incomplete_collection() {
    let source = MockImageSource::new()
        .with_image("http://img.test/slow.jpg", create_test_jpeg(32, 32, RED))
        .with_delay(Duration::from_millis(400));
    let server = TestServer::with_config(
        source,
        AcquirerConfig::default(),
        BuilderConfig {
            acquire_timeout: Duration::from_millis(50),
            ..Default::default()
        },
    );

    let response = server
        .post_json(
            "/collections",
            json!({
                "query": "slow",
                "entities": [entity_with_thumbnail("http://x/Slow", "Slow", "http://img.test/slow.jpg")]
            }),
        )
        .await;
    assert_eq!(response.headers().get("x-collection-complete").unwrap(), "false");
    let id = response
        .headers()
        .get("x-collection-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    // Collection is usable right away; the missing cell stays blank
    let tile_bytes = server
        .get(&format!("/tiles/{id}/8/0_0.jpg"))
        .await
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes();
    let tile = decode_tile(&tile_bytes);
    assert!(color_near(tile.get_pixel(128, 128), BACKGROUND, 8));

    // The acquisition keeps running and the cell fills in
    tokio::time::sleep(Duration::from_millis(800)).await;
    let tile_bytes = server
        .get(&format!("/tiles/{id}/8/0_0.jpg"))
        .await
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes();
    let tile = decode_tile(&tile_bytes);
    assert!(color_near(tile.get_pixel(128, 128), RED, 24));
}

#[tokio::test]
async fn test_entity_limit() {
    let server = TestServer::with_config(
        MockImageSource::new(),
        AcquirerConfig::default(),
        BuilderConfig {
            max_entities: 2,
            ..Default::default()
        },
    );

    let entities: Vec<_> = (0..5)
        .map(|i| json!({ "id": format!("http://x/{i}"), "label": format!("Item {i}") }))
        .collect();
    let id = server
        .build(json!({ "query": "many", "max_entities": 10, "entities": entities }))
        .await;

    let cxml = body_text(server.get(&format!("/collections/{id}.cxml")).await).await;
    assert_eq!(cxml.matches("<Item ").count(), 2);
    assert!(!cxml.contains("Item 2"));
}

#[tokio::test]
async fn test_empty_result_shows_nothing_found() {
    let server = TestServer::new(MockImageSource::new());

    let id = server
        .build(json!({ "query": "nothing", "entities": [] }))
        .await;

    let cxml = body_text(server.get(&format!("/collections/{id}.cxml")).await).await;
    assert!(cxml.contains("Nothing found"));

    let images = server
        .store
        .get_lines(CacheNamespace::Image, id.parse().unwrap())
        .await
        .unwrap();
    assert_eq!(images, vec!["id:Nothing found.jpg".to_string()]);

    let dzc = dzc_document(&server, &id).await;
    assert!(dzc.contains("NextItemId=\"1\""));
}
