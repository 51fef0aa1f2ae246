//! TTL cache over registry snapshots with single-flight refresh.
//!
//! The current snapshot pointer is the only mutable shared state in the
//! engine. Readers clone an `Arc` out of the lock and never observe a
//! half-updated list; at most one refresh runs at a time, and concurrent
//! callers get the stale snapshot immediately instead of waiting.

use chrono::{TimeDelta, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::registry::RegistrySnapshot;
use crate::source::SnapshotSource;

/// Default maximum snapshot age before a refresh is attempted.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

pub struct RegistryCache {
    snapshot: RwLock<Arc<RegistrySnapshot>>,
    /// None means preloaded mode: serve the seeded snapshot forever
    /// (tests and development).
    source: Option<Arc<dyn SnapshotSource>>,
    ttl: TimeDelta,
    refreshing: AtomicBool,
}

impl RegistryCache {
    /// Cache backed by a source, starting from an empty (stale) snapshot.
    /// Call [`prime`](Self::prime) at startup for a best-effort first fill.
    pub fn new(source: Arc<dyn SnapshotSource>, ttl: Duration) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(RegistrySnapshot::empty())),
            source: Some(source),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            refreshing: AtomicBool::new(false),
        }
    }

    /// Sourceless cache serving a fixed snapshot. Never refreshes.
    pub fn preloaded(snapshot: RegistrySnapshot) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
            source: None,
            ttl: TimeDelta::MAX,
            refreshing: AtomicBool::new(false),
        }
    }

    /// Whatever is cached right now, with no freshness check and no
    /// refresh. Used by `/health`.
    pub async fn current(&self) -> Arc<RegistrySnapshot> {
        self.snapshot.read().await.clone()
    }

    /// One synchronous best-effort fetch at process start. Failure leaves
    /// the empty snapshot in place rather than blocking startup.
    pub async fn prime(&self) {
        let Some(source) = &self.source else { return };
        match source.fetch().await {
            Ok(snap) => {
                tracing::info!(functions = snap.len(), "registry snapshot primed");
                *self.snapshot.write().await = Arc::new(snap);
            }
            Err(e) => {
                tracing::warn!(error = %e, "initial registry fetch failed, starting with an empty snapshot");
            }
        }
    }

    /// Return a recent-enough snapshot.
    ///
    /// Fresh (younger than the TTL) ⇒ returned as-is. Stale ⇒ the first
    /// caller to win the single-flight flag performs the fetch inline
    /// (bounded by the source's timeout) and swaps the pointer on success;
    /// a failed fetch keeps the previous snapshot. Callers that lose the
    /// flag return the stale snapshot immediately.
    pub async fn get(&self) -> Arc<RegistrySnapshot> {
        let current = self.current().await;
        if Utc::now() - current.fetched_at < self.ttl {
            return current;
        }

        let Some(source) = &self.source else {
            return current;
        };

        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // Refresh already in flight — serve stale.
            return current;
        }
        // The request future driving this fetch can be dropped at any await
        // point (client disconnect); the guard releases the flag on drop so
        // a cancelled refresh never blocks later ones.
        let _guard = RefreshGuard(&self.refreshing);

        match source.fetch().await {
            Ok(snap) => {
                tracing::debug!(functions = snap.len(), "registry snapshot refreshed");
                *self.snapshot.write().await = Arc::new(snap);
            }
            Err(e) => {
                tracing::warn!(error = %e, "registry refresh failed, keeping stale snapshot");
            }
        }

        self.current().await
    }
}

/// Clears the single-flight flag when the refresh ends, whether it
/// completed or its future was dropped mid-fetch.
struct RefreshGuard<'a>(&'a AtomicBool);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
