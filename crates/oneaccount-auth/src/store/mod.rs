//! Staging stores bridging the two authentication phases.
//!
//! A [`Store`] keeps the data posted by the identity widget until the client
//! comes back with a bearer token. Pickup is destructive: a successful
//! [`Store::get`] removes the entry, so staged data is delivered at most once.

pub mod adapter;
pub mod ttl;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::StoreResult;

pub use adapter::{AdapterStore, Getter, Setter};
pub use ttl::TtlStore;

/// Get/set contract for staged authorization data keyed by identifier.
///
/// Cancellation is best effort and only checked when a call starts: a
/// cancelled `set` stages nothing and returns `Ok(())`, a cancelled `get`
/// returns [`StoreError::Cancelled`](crate::error::StoreError::Cancelled).
#[async_trait]
pub trait Store: Send + Sync {
    /// Stage `value` under `key`, replacing any entry and resetting its TTL.
    async fn set(&self, key: &str, value: Vec<u8>, cancel: &CancellationToken) -> StoreResult<()>;

    /// Take the live entry for `key`, removing it.
    ///
    /// Two calls for the same key never both succeed.
    async fn get(&self, key: &str, cancel: &CancellationToken) -> StoreResult<Vec<u8>>;
}
