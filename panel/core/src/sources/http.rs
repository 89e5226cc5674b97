//! HTTP Transport
//!
//! Sources never talk to `reqwest` directly. They go through [`HttpFetch`],
//! which reduces a request to `url -> bytes or PollError`. The production
//! implementation applies a bounded timeout to every request; the static
//! implementation serves canned bodies for tests and dry runs.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::PollError;

/// Minimal GET-only HTTP client
#[async_trait]
pub trait HttpFetch: Send + Sync {
    /// Fetch `url` and return the response body
    async fn get(&self, url: &str) -> Result<Vec<u8>, PollError>;
}

/// `reqwest`-backed client with a per-request timeout
#[derive(Clone)]
pub struct ReqwestFetcher {
    http_client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestFetcher {
    /// Create a client whose requests give up after `timeout`
    ///
    /// # Errors
    ///
    /// Returns [`PollError::Network`] if the TLS backend cannot be initialised.
    pub fn new(timeout: Duration) -> Result<Self, PollError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!("homepanel/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http_client,
            timeout,
        })
    }

    /// Configured request timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn get(&self, url: &str) -> Result<Vec<u8>, PollError> {
        let response = self.http_client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(PollError::Network(format!(
                "{url} returned {}",
                response.status()
            )));
        }

        let body = response.bytes().await?;
        tracing::trace!(url, bytes = body.len(), "Fetched");
        Ok(body.to_vec())
    }
}

/// In-memory URL → body map
///
/// URLs without a registered body fail with [`PollError::Network`].
#[derive(Default)]
pub struct StaticFetcher {
    bodies: RwLock<HashMap<String, Vec<u8>>>,
}

impl StaticFetcher {
    /// Create an empty fetcher
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a body for `url`, builder style
    #[must_use]
    pub fn with(self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.insert(url, body);
        self
    }

    /// Register or replace the body for `url`
    pub fn insert(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.bodies.write().insert(url.into(), body.into());
    }

    /// Forget the body for `url`, making further requests fail
    pub fn remove(&self, url: &str) {
        self.bodies.write().remove(url);
    }
}

#[async_trait]
impl HttpFetch for StaticFetcher {
    async fn get(&self, url: &str) -> Result<Vec<u8>, PollError> {
        self.bodies
            .read()
            .get(url)
            .cloned()
            .ok_or_else(|| PollError::Network(format!("no route to {url}")))
    }
}
