//! Remote image sources.
//!
//! [`ImageSource`] is the seam between the acquirer and the network: one
//! method downloads an image, the other asks an image search service for a
//! picture of a label. [`HttpImageSource`] implements both over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::error::FetchError;

/// Default image search endpoint (JSON, Google AJAX search response shape).
pub const DEFAULT_IMAGE_SEARCH_URL: &str =
    "http://ajax.googleapis.com/ajax/services/search/images";

/// Default per-request timeout for image downloads and searches.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// ImageSource Trait
// =============================================================================

/// Backend used by the acquirer to reach remote images.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Download the bytes at `url`.
    ///
    /// Any non-success status is an error.
    async fn fetch(&self, url: &Url) -> Result<Bytes, FetchError>;

    /// Ask the image search service for `label` and return the first hit.
    async fn search(&self, label: &str) -> Result<Url, FetchError>;
}

// =============================================================================
// HTTP Source
// =============================================================================

/// `reqwest`-backed [`ImageSource`].
#[derive(Clone)]
pub struct HttpImageSource {
    client: Client,
    search_endpoint: Url,
}

impl HttpImageSource {
    /// Create a source with a request timeout and image search endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed (e.g. the
    /// TLS backend fails to initialise).
    pub fn new(timeout: Duration, search_endpoint: Url) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("dzc-streamer/", env!("CARGO_PKG_VERSION")))
            .use_rustls_tls()
            .build()?;

        Ok(Self {
            client,
            search_endpoint,
        })
    }

    /// Build the search request URL for `label`.
    pub fn search_url(&self, label: &str) -> Url {
        let mut url = self.search_endpoint.clone();
        url.set_query(Some(&format!("v=1.0&q={}", urlencoding::encode(label))));
        url
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch(&self, url: &Url) -> Result<Bytes, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| network_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.bytes().await.map_err(|e| network_error(url, e))
    }

    async fn search(&self, label: &str) -> Result<Url, FetchError> {
        let url = self.search_url(label);
        let body = self.fetch(&url).await?;
        let first = parse_search_response(&body)?.ok_or_else(|| FetchError::NoSearchResult {
            query: label.to_string(),
        })?;
        Url::parse(&first).map_err(|_| FetchError::InvalidUrl(first))
    }
}

fn network_error(url: &Url, err: reqwest::Error) -> FetchError {
    FetchError::Network {
        url: url.to_string(),
        message: err.to_string(),
    }
}

// =============================================================================
// Search Response
// =============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "responseData")]
    response_data: Option<SearchData>,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "unescapedUrl")]
    unescaped_url: String,
}

/// Extract the first result URL from an image search response.
///
/// Returns `Ok(None)` for a well-formed response without results.
pub fn parse_search_response(body: &[u8]) -> Result<Option<String>, FetchError> {
    let response: SearchResponse =
        serde_json::from_slice(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    Ok(response
        .response_data
        .and_then(|data| data.results.into_iter().next())
        .map(|hit| hit.unescaped_url))
}

// =============================================================================
// Tests
// =============================================================================
