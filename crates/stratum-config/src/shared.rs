//! Single-writer/multi-reader facade over a [`ConfigStore`].
//!
//! The bare store is synchronous and lock-free: concurrent reads are
//! safe only while no writer mutates the same instance. `SharedConfig`
//! makes that discipline explicit: writers serialize behind a lock,
//! readers either run a short closure under the read lock or take a
//! [`SharedConfig::snapshot`] deep clone and never observe a partial
//! mutation.

use std::sync::{Arc, PoisonError, RwLock};

use crate::error::Result;
use crate::store::ConfigStore;

/// Thread-safe handle to a configuration store.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    inner: Arc<RwLock<ConfigStore>>,
}

impl SharedConfig {
    pub fn new(store: ConfigStore) -> Self {
        SharedConfig {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    /// A deep copy of the current store, detached from future writes.
    pub fn snapshot(&self) -> ConfigStore {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Runs a read-only closure under the read lock.
    pub fn with_read<R>(&self, f: impl FnOnce(&ConfigStore) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Runs a mutating closure under the write lock. On error the
    /// closure must leave the store unchanged, matching the
    /// no-partial-mutation contract of the store operations themselves.
    pub fn apply<R>(&self, f: impl FnOnce(&mut ConfigStore) -> Result<R>) -> Result<R> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Replaces the store wholesale, e.g. after a migration produced a
    /// new one.
    pub fn replace(&self, store: ConfigStore) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = store;
    }
}
