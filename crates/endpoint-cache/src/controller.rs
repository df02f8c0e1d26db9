//! Explicit lifecycle for the cache store.
//!
//! Instead of hiding the fetch lifecycle behind implicit component hooks,
//! the lifecycle is a set of explicit events on a controller: attaching
//! populates the cache, a configuration update reconciles against the
//! previous value, and detaching unmounts the channel and discards writes
//! from fetches that are still in flight.

use std::sync::Arc;

use tracing::debug;

use crate::channel::CacheChannel;
use crate::config::EndpointConfig;
use crate::store::CacheStore;
use crate::transport::EndpointTransport;

/// Owns a [`CacheStore`] and drives its lifecycle.
pub struct CacheController {
    store: CacheStore,
}

impl CacheController {
    /// Build the store with pre-seeded pending entries. Nothing is fetched
    /// until [`attach`](Self::attach).
    pub fn new(config: EndpointConfig, transport: Arc<dyn EndpointTransport>) -> Self {
        Self {
            store: CacheStore::new(config, transport),
        }
    }

    /// Mount the store into `channel` and populate the cache.
    pub fn attach(&self, channel: &CacheChannel) {
        channel.mount(self.store.clone());
        debug!("cache controller attached, populating cache");
        self.store.initialize_all();
    }

    /// Replace the configuration and refetch only the changed or added
    /// endpoints.
    pub fn update_config(&self, config: EndpointConfig) {
        let previous = self.store.replace_config(config);
        self.store.reconcile(&previous);
    }

    /// Unmount from `channel` and stop accepting writes from in-flight
    /// fetches. The fetches themselves are not aborted.
    pub fn detach(&self, channel: &CacheChannel) {
        channel.unmount();
        self.store.mark_detached();
        debug!("cache controller detached");
    }

    /// Direct access to the owned store.
    pub fn store(&self) -> &CacheStore {
        &self.store
    }
}
