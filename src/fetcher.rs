//! HTTP client for the Discourse "latest posts" endpoint.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::post::LatestPosts;

/// Path segment of the latest posts endpoint, relative to the forum base URL.
pub const LATEST_POSTS_ENDPOINT: &str = "posts.json";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid forum URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("failed to fetch latest posts: {0}")]
    Request(#[from] reqwest::Error),
    #[error("failed to decode latest posts: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("fetch cancelled")]
    Cancelled,
}

/// Something that can produce the forum's latest posts.
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Fetch one batch of latest posts.
    ///
    /// Implementations should return [`FetchError::Cancelled`] promptly once `shutdown`
    /// is cancelled.
    async fn latest_posts(&self, shutdown: &CancellationToken) -> Result<LatestPosts, FetchError>;
}

/// Fetches `/posts.json` from a single forum, reusing one HTTP client across calls.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    endpoint: Url,
}

impl Fetcher {
    /// Create a fetcher for the forum at `base_url`. Every request is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidUrl`] if `base_url` is not an absolute URL that can
    /// carry a path, or [`FetchError::Request`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Self::with_client(client, base_url)
    }

    /// Create a fetcher that uses an existing client.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidUrl`] if `base_url` cannot be turned into an endpoint.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, FetchError> {
        let endpoint = endpoint_url(base_url, LATEST_POSTS_ENDPOINT)?;
        Ok(Self { client, endpoint })
    }

    /// The fully resolved URL this fetcher requests.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Fetch and decode the latest posts.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Request`] on transport failures and timeouts,
    /// [`FetchError::Decode`] if the body is not a latest posts document, and
    /// [`FetchError::Cancelled`] if `shutdown` fires while the request is in flight.
    pub async fn fetch_latest_posts(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<LatestPosts, FetchError> {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => Err(FetchError::Cancelled),
            result = self.request() => result,
        }
    }

    async fn request(&self) -> Result<LatestPosts, FetchError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        debug!(url = %self.endpoint, status = %response.status(), "Fetched latest posts");

        // Consumes the response, so the connection goes back to the pool before decoding.
        let body = response.bytes().await?;
        let posts = serde_json::from_slice(&body)?;

        Ok(posts)
    }
}

#[async_trait]
impl PostSource for Fetcher {
    async fn latest_posts(&self, shutdown: &CancellationToken) -> Result<LatestPosts, FetchError> {
        self.fetch_latest_posts(shutdown).await
    }
}

/// Append `segment` to the path of `base_url`, keeping any sub-path and query.
fn endpoint_url(base_url: &str, segment: &str) -> Result<Url, FetchError> {
    let invalid = |message: String| FetchError::InvalidUrl {
        url: base_url.to_string(),
        message,
    };

    let mut url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| invalid("URL cannot have a path".to_string()))?
        .pop_if_empty()
        .push(segment);

    Ok(url)
}
