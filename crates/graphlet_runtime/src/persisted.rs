//! Persisted queries for graphlet.
//!
//! A client may reference a stored operation by identifier instead of
//! shipping the full text. The storage backend is external; this module
//! defines the lookup contract the engine consumes, plus an in-memory
//! implementation for tests and single-process deployments. Because the
//! engine consumes parsed selection trees, the store yields [`Operation`]s —
//! turning stored query text into a tree is the external parser's job, done
//! once at registration time.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use std::sync::RwLock;

use crate::selection::Operation;

/// Lookup contract for a persisted-query store.
#[async_trait]
pub trait PersistedQueryStore: Send + Sync {
    /// Returns the operation registered under `hash`, if any.
    async fn lookup(&self, hash: &str) -> Option<Operation>;
}

/// An in-memory persisted-query store.
#[derive(Default)]
pub struct InMemoryPersistedQueries {
    entries: RwLock<FxHashMap<String, Operation>>,
}

impl InMemoryPersistedQueries {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an operation under an identifier.
    pub fn register(&self, hash: impl Into<String>, operation: Operation) {
        self.entries
            .write()
            .unwrap()
            .insert(hash.into(), operation);
    }

    /// Number of registered operations.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// True if no operation is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PersistedQueryStore for InMemoryPersistedQueries {
    async fn lookup(&self, hash: &str) -> Option<Operation> {
        self.entries.read().unwrap().get(hash).cloned()
    }
}
