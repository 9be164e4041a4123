//! Batched data loading for graphlet.
//!
//! Resolvers that fetch by key go through a per-request [`BatchCoordinator`]
//! instead of calling their backend directly. Keys issued while a resolution
//! wave is running are collected per loader identity; when the wave settles
//! (every runnable resolver has either finished or parked on the
//! coordinator), each loader receives exactly one batched call with the
//! deduplicated key set. Results are cached for the rest of the request, so
//! the N+1 call pattern cannot occur.

use async_trait::async_trait;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::oneshot;

/// Key used to aggregate concurrent loads into one backend call.
pub type BatchKey = String;

/// A batched downstream call failed as a whole.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct BatchError {
    pub message: String,
}

impl BatchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error returned to a single `load` call.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    #[error("loader '{0}' is not registered")]
    UnknownLoader(String),

    #[error("batch load failed: {0}")]
    Batch(BatchError),

    #[error("loader returned no value for key '{0}'")]
    MissingKey(BatchKey),
}

/// A batch-loading backend for one loader identity.
///
/// Given the deduplicated key set of one wave, return a mapping from key to
/// value. Keys absent from the mapping fail their callers with
/// [`LoadError::MissingKey`]; extra keys are ignored.
#[async_trait]
pub trait BatchLoader: Send + Sync {
    async fn load(&self, keys: Vec<BatchKey>) -> Result<FxHashMap<BatchKey, Value>, BatchError>;
}

/// Wraps an async closure as a [`BatchLoader`].
pub struct FnBatchLoader<F> {
    batch_fn: F,
}

impl<F, Fut> FnBatchLoader<F>
where
    F: Fn(Vec<BatchKey>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<FxHashMap<BatchKey, Value>, BatchError>> + Send,
{
    pub fn new(batch_fn: F) -> Self {
        Self { batch_fn }
    }
}

#[async_trait]
impl<F, Fut> BatchLoader for FnBatchLoader<F>
where
    F: Fn(Vec<BatchKey>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<FxHashMap<BatchKey, Value>, BatchError>> + Send,
{
    async fn load(&self, keys: Vec<BatchKey>) -> Result<FxHashMap<BatchKey, Value>, BatchError> {
        (self.batch_fn)(keys).await
    }
}

type PendingHandle = oneshot::Sender<Result<Option<Value>, BatchError>>;

/// Per-loader request-scoped state.
#[derive(Default)]
struct LoaderState {
    /// Results seen this request. `None` records a key the backend reported
    /// as missing, so repeat loads do not refetch it.
    cache: FxHashMap<BatchKey, Option<Value>>,
    /// Keys collected in the current wave, with their wakeup handles.
    pending: Vec<(BatchKey, PendingHandle)>,
    /// A dispatcher task has been spawned for the current wave.
    dispatch_scheduled: bool,
}

/// Collects loads across one resolution wave and dispatches one batched
/// call per loader identity. Scoped to a single request; never shared
/// across requests.
pub struct BatchCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    loaders: Arc<FxHashMap<String, Arc<dyn BatchLoader>>>,
    states: Mutex<FxHashMap<String, LoaderState>>,
}

impl BatchCoordinator {
    /// Creates a coordinator over the engine's registered loaders.
    pub fn new(loaders: Arc<FxHashMap<String, Arc<dyn BatchLoader>>>) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                loaders,
                states: Mutex::new(FxHashMap::default()),
            }),
        }
    }

    /// Loads one key through the named loader.
    ///
    /// Returns immediately from the request cache when the key has been
    /// seen; otherwise the key joins the current wave's batch and the call
    /// suspends until dispatch.
    pub async fn load(
        &self,
        loader_id: &str,
        key: impl Into<BatchKey>,
    ) -> Result<Value, LoadError> {
        let key = key.into();
        let loader = self
            .inner
            .loaders
            .get(loader_id)
            .cloned()
            .ok_or_else(|| LoadError::UnknownLoader(loader_id.to_string()))?;

        let rx = {
            let mut states = self.inner.states.lock().unwrap();
            let state = states.entry(loader_id.to_string()).or_default();

            if let Some(cached) = state.cache.get(&key) {
                return match cached {
                    Some(value) => Ok(value.clone()),
                    None => Err(LoadError::MissingKey(key)),
                };
            }

            let (tx, rx) = oneshot::channel();
            let schedule = !state.dispatch_scheduled;
            state.pending.push((key.clone(), tx));
            if schedule {
                state.dispatch_scheduled = true;
                let inner = Arc::clone(&self.inner);
                let loader_id = loader_id.to_string();
                tokio::spawn(async move {
                    // Let the requesting task park every sibling resolver on
                    // the coordinator before the batch goes out. Two yields
                    // also cover siblings running as separate tasks.
                    tokio::task::yield_now().await;
                    tokio::task::yield_now().await;
                    inner.dispatch(&loader_id, loader).await;
                });
            }
            rx
        };

        match rx.await {
            Ok(Ok(Some(value))) => Ok(value),
            Ok(Ok(None)) => Err(LoadError::MissingKey(key)),
            Ok(Err(error)) => Err(LoadError::Batch(error)),
            Err(_) => Err(LoadError::Batch(BatchError::new(
                "batch dispatcher dropped before resolving",
            ))),
        }
    }

    /// Seeds the request cache for a key, bypassing the loader.
    pub fn prime(&self, loader_id: &str, key: impl Into<BatchKey>, value: Value) {
        let mut states = self.inner.states.lock().unwrap();
        let state = states.entry(loader_id.to_string()).or_default();
        state.cache.insert(key.into(), Some(value));
    }
}

impl CoordinatorInner {
    /// Fires the batched call for one loader's collected wave.
    async fn dispatch(&self, loader_id: &str, loader: Arc<dyn BatchLoader>) {
        let pending = {
            let mut states = self.states.lock().unwrap();
            let state = states.entry(loader_id.to_string()).or_default();
            state.dispatch_scheduled = false;
            std::mem::take(&mut state.pending)
        };
        if pending.is_empty() {
            return;
        }

        // Deduplicate in first-seen order.
        let mut seen = FxHashSet::default();
        let keys: Vec<BatchKey> = pending
            .iter()
            .filter(|(key, _)| seen.insert(key.clone()))
            .map(|(key, _)| key.clone())
            .collect();

        tracing::debug!(loader = loader_id, keys = keys.len(), "dispatching batch");
        let result = loader.load(keys.clone()).await;

        match result {
            Ok(mut values) => {
                let mut states = self.states.lock().unwrap();
                let state = states.entry(loader_id.to_string()).or_default();
                for key in &keys {
                    state.cache.insert(key.clone(), values.remove(key));
                }
                for (key, tx) in pending {
                    let value = state.cache.get(&key).cloned().flatten();
                    let _ = tx.send(Ok(value));
                }
            }
            Err(error) => {
                // The whole batch failed: every pending handle fails with
                // the same error, and nothing is cached so a later wave may
                // retry.
                tracing::warn!(loader = loader_id, error = %error, "batch load failed");
                for (_, tx) in pending {
                    let _ = tx.send(Err(error.clone()));
                }
            }
        }
    }
}

impl std::fmt::Debug for BatchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCoordinator")
            .field("loaders", &self.inner.loaders.len())
            .finish()
    }
}
