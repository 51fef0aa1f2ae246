//! Registry snapshot sources.
//!
//! The cache talks to the registry through the [`SnapshotSource`] trait so
//! tests can substitute in-memory sources for the HTTP endpoint.

use async_trait::async_trait;
use std::time::Duration;

use qb_protocol::RegistryFeed;

use crate::registry::RegistrySnapshot;

/// Default timeout for one registry fetch. Deliberately much shorter than
/// the cache TTL: a slow registry must never stall request handling.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(3);

/// Anything that can produce a fresh registry snapshot.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch and compile a new snapshot. Any error (network, status,
    /// malformed body) means "no refresh happened" — the caller keeps its
    /// previous snapshot.
    async fn fetch(&self) -> anyhow::Result<RegistrySnapshot>;
}

/// HTTP source reading `GET <base>/analytics/functions`.
pub struct HttpRegistrySource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRegistrySource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl SnapshotSource for HttpRegistrySource {
    async fn fetch(&self) -> anyhow::Result<RegistrySnapshot> {
        let url = format!("{}/analytics/functions", self.base_url.trim_end_matches('/'));
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("registry returned {}", response.status());
        }

        let feed: RegistryFeed = response.json().await?;
        Ok(RegistrySnapshot::from_feed(feed))
    }
}
