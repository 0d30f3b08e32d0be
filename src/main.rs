//! DZC Streamer - serves query results as zoomable image collections.
//!
//! This binary starts the HTTP server and configures all components.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dzc_streamer::{
    acquire::{CardRenderer, HttpImageSource, SourceImageAcquirer},
    cache::{CacheStore, DecodedImageCache},
    collection::CollectionBuilder,
    server::{create_router, AppState, RouterConfig},
    tile::{JpegTileEncoder, TileComposer},
    Config,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    log_configuration(&config);

    let store = Arc::new(CacheStore::in_data_dir(&config.data_dir));

    let search_endpoint = match config.search_endpoint() {
        Ok(url) => url,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let source = match HttpImageSource::new(config.fetch_timeout(), search_endpoint) {
        Ok(source) => Arc::new(source),
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let cards = CardRenderer::new(config.font.as_deref());
    let acquirer = Arc::new(SourceImageAcquirer::new(
        source,
        Arc::clone(&store),
        cards,
        config.acquirer_config(),
    ));
    let builder = Arc::new(CollectionBuilder::new(
        acquirer,
        Arc::clone(&store),
        config.builder_config(),
    ));

    let decoded = Arc::new(DecodedImageCache::with_limits(
        config.decode_cache_entries,
        config.decode_cache_ttl(),
        config.decode_failure_ttl(),
    ));
    let composer = Arc::new(TileComposer::new(
        store,
        decoded,
        JpegTileEncoder::with_quality(config.jpeg_quality),
    ));

    let state = AppState::new(builder, composer);
    let router = create_router(state, build_router_config(&config));

    let addr = config.bind_address();
    info!("Server listening on: http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn log_configuration(config: &Config) {
    info!("DZC Streamer v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Data directory: {}", config.data_dir.display());
    match config.base_url {
        Some(ref base) => info!("  Base URL: {}", base),
        None => info!("  Base URL: none (relative references fail)"),
    }
    if let Some(ref dir) = config.upload_dir {
        info!("  Upload directory: {}", dir.display());
    }
    if config.image_search {
        info!("  Image search: {}", config.image_search_url);
    }
    info!(
        "  Limits: {} entities, {}s acquire timeout, {}s fetch timeout",
        config.max_entities, config.acquire_timeout, config.fetch_timeout
    );
    info!(
        "  Decode cache: {} images, {}s ttl",
        config.decode_cache_entries, config.decode_cache_ttl
    );
    if config.cors_origins.is_none() {
        warn!("  CORS: any origin allowed");
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "dzc_streamer=debug,tower_http=debug"
    } else {
        "dzc_streamer=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}
