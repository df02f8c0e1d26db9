//! Snapshot distribution to consumers.
//!
//! Consumers never hold the store directly. They go through a
//! [`CacheChannel`], which hands out the store's capability interface when a
//! store is mounted and an explicit null object when none is. Rendering a
//! consumer outside a store's scope is therefore safe: the refresh handles
//! are callable no-ops and the data is an empty snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::warn;

use crate::store::{CacheStore, Snapshot};

/// Capability interface of the cache as seen by consumers.
pub trait CacheAccess: Send + Sync {
    /// Current snapshot of the cache state. Consumers must not mutate it.
    fn data(&self) -> Snapshot;

    /// Trigger a re-fetch of every configured endpoint.
    fn refresh_cache(&self);

    /// Trigger a re-fetch of exactly one endpoint.
    fn refresh_cache_piece(&self, name: &str);
}

/// Handle backed by a mounted store.
struct StoreAccess {
    store: CacheStore,
}

impl CacheAccess for StoreAccess {
    fn data(&self) -> Snapshot {
        self.store.snapshot()
    }

    fn refresh_cache(&self) {
        self.store.initialize_all();
    }

    fn refresh_cache_piece(&self, name: &str) {
        self.store.refresh_one(name);
    }
}

/// Null object handed out while no store is mounted.
struct DetachedAccess {
    empty: Snapshot,
}

impl CacheAccess for DetachedAccess {
    fn data(&self) -> Snapshot {
        self.empty.clone()
    }

    fn refresh_cache(&self) {
        warn!("refresh_cache called with no cache store mounted");
    }

    fn refresh_cache_piece(&self, name: &str) {
        warn!(%name, "refresh_cache_piece called with no cache store mounted");
    }
}

/// Read-only broadcast point between one store and many consumers.
pub struct CacheChannel {
    mounted: RwLock<Option<CacheStore>>,
    empty_tx: watch::Sender<Snapshot>,
}

impl CacheChannel {
    pub fn new() -> Self {
        let (empty_tx, _) = watch::channel(Arc::new(HashMap::new()));
        Self {
            mounted: RwLock::new(None),
            empty_tx,
        }
    }

    /// Back the channel with a store. Called by the controller on attach.
    pub fn mount(&self, store: CacheStore) {
        *self.mounted.write() = Some(store);
    }

    /// Drop the mounted store; handles revert to the null object.
    pub fn unmount(&self) {
        *self.mounted.write() = None;
    }

    /// Handle for consumers. Reflects whatever is mounted right now.
    pub fn handle(&self) -> Arc<dyn CacheAccess> {
        match &*self.mounted.read() {
            Some(store) => Arc::new(StoreAccess {
                store: store.clone(),
            }),
            None => Arc::new(DetachedAccess {
                empty: self.empty_tx.borrow().clone(),
            }),
        }
    }

    /// Subscribe to snapshot updates.
    ///
    /// With no store mounted, the receiver observes a persistent empty
    /// snapshot and never updates.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        match &*self.mounted.read() {
            Some(store) => store.subscribe(),
            None => self.empty_tx.subscribe(),
        }
    }

    /// Number of active snapshot subscribers on the mounted store.
    pub fn subscriber_count(&self) -> usize {
        match &*self.mounted.read() {
            Some(store) => store.subscriber_count(),
            None => self.empty_tx.receiver_count(),
        }
    }
}

impl Default for CacheChannel {
    fn default() -> Self {
        Self::new()
    }
}
