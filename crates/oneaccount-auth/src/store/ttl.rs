//! Default in-memory staging store with per-entry expiry.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::Store;
use crate::config::defaults;
use crate::error::{StoreError, StoreResult};

/// Shortest sweep period; smaller intervals are raised to this.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Data posted by the widget, waiting for pickup.
struct StagedEntry {
    expires_at: Instant,
    payload: Vec<u8>,
}

impl StagedEntry {
    /// An entry is invalid at or after its expiry instant.
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

struct Inner {
    entries: RwLock<HashMap<String, StagedEntry>>,
    ttl: Duration,
    shutdown: CancellationToken,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl Inner {
    async fn sweep_expired(&self) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(count = removed, "Swept expired staged entries");
        }
    }
}

/// Concurrent self-expiring map.
///
/// Every clone shares the same entries. A background task started on the
/// current Tokio runtime evicts expired entries every sweep interval, so
/// data that is never picked up does not accumulate. The task stops on
/// [`TtlStore::shutdown`] or once the last handle is dropped.
#[derive(Clone)]
pub struct TtlStore {
    inner: Arc<Inner>,
}

impl TtlStore {
    /// Store with the default one minute TTL and five second sweep.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(defaults::ENTRY_TTL, defaults::SWEEP_INTERVAL)
    }

    /// Store with a custom TTL and sweep interval.
    ///
    /// Outside a Tokio runtime no sweep is started; expired entries are then
    /// only dropped when read. A zero sweep interval is raised to one
    /// millisecond.
    #[must_use]
    pub fn with_settings(ttl: Duration, sweep_interval: Duration) -> Self {
        let sweep_interval = sweep_interval.max(MIN_SWEEP_INTERVAL);
        let inner = Arc::new(Inner {
            entries: RwLock::new(HashMap::new()),
            ttl,
            shutdown: CancellationToken::new(),
        });

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(sweep_loop(
                    Arc::downgrade(&inner),
                    inner.shutdown.clone(),
                    sweep_interval,
                ));
            }
            Err(_) => {
                tracing::warn!("No Tokio runtime; staged entries expire only on read");
            }
        }

        Self { inner }
    }

    /// Entries currently held, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.inner.entries.read().await.len()
    }

    /// Returns true if no entries are held.
    pub async fn is_empty(&self) -> bool {
        self.inner.entries.read().await.is_empty()
    }

    /// Stop the background sweep. Reads keep honouring expiry.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    /// Configured entry lifetime.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }
}

async fn sweep_loop(inner: Weak<Inner>, shutdown: CancellationToken, every: Duration) {
    let Some(start) = Instant::now().checked_add(every) else {
        tracing::warn!(interval = ?every, "Sweep interval overflows the clock; sweep disabled");
        return;
    };
    let mut interval = tokio::time::interval_at(start, every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = interval.tick() => {
                let Some(inner) = inner.upgrade() else { break };
                inner.sweep_expired().await;
            }
        }
    }

    tracing::debug!("Staging store sweep stopped");
}

#[async_trait]
impl Store for TtlStore {
    async fn set(&self, key: &str, value: Vec<u8>, cancel: &CancellationToken) -> StoreResult<()> {
        if cancel.is_cancelled() {
            return Ok(());
        }

        let expires_at = Instant::now()
            .checked_add(self.inner.ttl)
            .ok_or_else(|| StoreError::backend("entry TTL overflows the clock"))?;
        let entry = StagedEntry {
            expires_at,
            payload: value,
        };
        self.inner.entries.write().await.insert(key.to_owned(), entry);
        Ok(())
    }

    async fn get(&self, key: &str, cancel: &CancellationToken) -> StoreResult<Vec<u8>> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        // Exclusive lock: the lookup and the delete form one critical section.
        let mut entries = self.inner.entries.write().await;
        match entries.remove(key) {
            Some(entry) if !entry.is_expired(Instant::now()) => Ok(entry.payload),
            _ => Err(StoreError::not_found(key)),
        }
    }
}

impl Default for TtlStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TtlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlStore").field("ttl", &self.inner.ttl).finish()
    }
}
