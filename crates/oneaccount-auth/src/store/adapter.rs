//! Store backed by caller-supplied setter and getter functions.
//!
//! Lets an integrator stage data in any external persistence (a table with
//! an expiry column, a shared cache, ...) without implementing [`Store`].
//! The supplied getter must honour the same destructive-read contract.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use tokio_util::sync::CancellationToken;

use super::Store;
use crate::error::{StoreError, StoreResult};

/// Stages a payload under a key.
pub type Setter = Arc<
    dyn Fn(String, Vec<u8>, CancellationToken) -> BoxFuture<'static, StoreResult<()>>
        + Send
        + Sync,
>;

/// Takes the payload staged under a key.
pub type Getter = Arc<
    dyn Fn(String, CancellationToken) -> BoxFuture<'static, StoreResult<Vec<u8>>> + Send + Sync,
>;

/// Box an async closure into a [`Setter`].
pub fn setter<F, Fut>(f: F) -> Setter
where
    F: Fn(String, Vec<u8>, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StoreResult<()>> + Send + 'static,
{
    Arc::new(move |key, value, cancel| f(key, value, cancel).boxed())
}

/// Box an async closure into a [`Getter`].
pub fn getter<F, Fut>(f: F) -> Getter
where
    F: Fn(String, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StoreResult<Vec<u8>>> + Send + 'static,
{
    Arc::new(move |key, cancel| f(key, cancel).boxed())
}

/// [`Store`] forwarding to optional setter/getter functions.
#[derive(Clone, Default)]
pub struct AdapterStore {
    setter: Option<Setter>,
    getter: Option<Getter>,
}

impl AdapterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from already boxed functions.
    #[must_use]
    pub fn from_parts(setter: Option<Setter>, getter: Option<Getter>) -> Self {
        Self { setter, getter }
    }

    /// Use `f` for staging.
    #[must_use]
    pub fn with_setter<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String, Vec<u8>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StoreResult<()>> + Send + 'static,
    {
        self.setter = Some(setter(f));
        self
    }

    /// Use `f` for pickup.
    #[must_use]
    pub fn with_getter<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StoreResult<Vec<u8>>> + Send + 'static,
    {
        self.getter = Some(getter(f));
        self
    }
}

#[async_trait]
impl Store for AdapterStore {
    async fn set(&self, key: &str, value: Vec<u8>, cancel: &CancellationToken) -> StoreResult<()> {
        let Some(setter) = &self.setter else {
            return Err(StoreError::SetterMissing);
        };
        if cancel.is_cancelled() {
            return Ok(());
        }
        setter(key.to_owned(), value, cancel.clone()).await
    }

    async fn get(&self, key: &str, cancel: &CancellationToken) -> StoreResult<Vec<u8>> {
        let Some(getter) = &self.getter else {
            return Err(StoreError::GetterMissing);
        };
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        getter(key.to_owned(), cancel.clone()).await
    }
}

impl std::fmt::Debug for AdapterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterStore")
            .field("has_setter", &self.setter.is_some())
            .field("has_getter", &self.getter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    fn map_backed() -> (AdapterStore, Arc<Mutex<HashMap<String, Vec<u8>>>>) {
        let backing = Arc::new(Mutex::new(HashMap::new()));
        let for_set = Arc::clone(&backing);
        let for_get = Arc::clone(&backing);

        let store = AdapterStore::new()
            .with_setter(move |key, value, _cancel| {
                let backing = Arc::clone(&for_set);
                async move {
                    let _ = backing.lock().unwrap().insert(key, value);
                    Ok(())
                }
            })
            .with_getter(move |key, _cancel| {
                let backing = Arc::clone(&for_get);
                async move {
                    let taken = backing.lock().unwrap().remove(&key);
                    taken.ok_or_else(|| StoreError::not_found(key))
                }
            });

        (store, backing)
    }

    #[tokio::test]
    async fn test_forwards_to_functions() {
        let (store, backing) = map_backed();
        let ctx = CancellationToken::new();

        store.set("abc", b"{}".to_vec(), &ctx).await.unwrap();
        assert!(backing.lock().unwrap().contains_key("abc"));

        assert_eq!(store.get("abc", &ctx).await.unwrap(), b"{}");
        assert!(store.get("abc", &ctx).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_missing_functions() {
        let store = AdapterStore::new();
        let ctx = CancellationToken::new();

        assert!(matches!(
            store.set("abc", Vec::new(), &ctx).await,
            Err(StoreError::SetterMissing)
        ));
        assert!(matches!(store.get("abc", &ctx).await, Err(StoreError::GetterMissing)));
    }

    #[tokio::test]
    async fn test_setter_only() {
        let store = AdapterStore::from_parts(Some(setter(|_, _, _| async { Ok(()) })), None);
        let ctx = CancellationToken::new();

        assert!(store.set("abc", Vec::new(), &ctx).await.is_ok());
        assert!(matches!(store.get("abc", &ctx).await, Err(StoreError::GetterMissing)));
    }

    #[tokio::test]
    async fn test_cancelled_context_skips_functions() {
        let (store, backing) = map_backed();
        let cancelled = CancellationToken::new();
        cancelled.cancel();

        store.set("abc", b"{}".to_vec(), &cancelled).await.unwrap();
        assert!(backing.lock().unwrap().is_empty());
        assert!(matches!(store.get("abc", &cancelled).await, Err(StoreError::Cancelled)));
    }

    #[tokio::test]
    async fn test_backend_error_propagates() {
        let store = AdapterStore::new()
            .with_setter(|_, _, _| async { Err(StoreError::backend("connection refused")) });

        let err = store.set("abc", Vec::new(), &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
