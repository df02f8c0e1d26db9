//! Cache store: state ownership, configuration diffing, fetch lifecycle.
//!
//! The store owns the `name -> CacheEntry` state and the endpoint
//! configuration. Fetches are spawned tasks; each completion flows back in
//! as a keyed write, and every write publishes a fresh snapshot through a
//! watch channel.

mod entry;

pub use entry::CacheEntry;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::EndpointConfig;
use crate::error::FetchError;
use crate::transport::EndpointTransport;

/// Read-only view of the full cache state at one instant.
pub type Snapshot = Arc<HashMap<String, CacheEntry>>;

/// Owns the cache state and drives the fetch/update lifecycle.
///
/// Cloning is cheap and shares the same state; the distribution channel and
/// spawned fetch tasks rely on this. Methods that trigger fetches
/// (`initialize_all`, `reconcile`, `refresh_one`) spawn onto the ambient
/// tokio runtime and must be called from within one.
#[derive(Clone)]
pub struct CacheStore {
    config: Arc<RwLock<EndpointConfig>>,
    state: Arc<RwLock<HashMap<String, CacheEntry>>>,
    snapshot_tx: watch::Sender<Snapshot>,
    transport: Arc<dyn EndpointTransport>,
    detached: CancellationToken,
}

impl CacheStore {
    /// Create a store with one pending entry per configured endpoint.
    ///
    /// Nothing is fetched until `initialize_all` is called.
    pub fn new(config: EndpointConfig, transport: Arc<dyn EndpointTransport>) -> Self {
        let state: HashMap<String, CacheEntry> = config
            .names()
            .map(|name| (name.to_string(), CacheEntry::default()))
            .collect();
        let (snapshot_tx, _) = watch::channel(Arc::new(state.clone()));

        Self {
            config: Arc::new(RwLock::new(config)),
            state: Arc::new(RwLock::new(state)),
            snapshot_tx,
            transport,
            detached: CancellationToken::new(),
        }
    }

    /// Subscribe to snapshot updates. Every mutation publishes a new value.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_tx.subscribe()
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Number of active snapshot subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.snapshot_tx.receiver_count()
    }

    /// Trigger a fetch for every currently configured endpoint.
    ///
    /// All fetches run concurrently; there is no ordering between their
    /// completions.
    pub fn initialize_all(&self) {
        let targets: Vec<(String, String)> = self
            .config
            .read()
            .iter()
            .map(|(name, address)| (name.to_string(), address.to_string()))
            .collect();

        debug!(count = targets.len(), "populating cache");
        for (name, address) in targets {
            self.spawn_fetch(name, address);
        }
    }

    /// Refetch the endpoints whose address changed or that were added since
    /// `previous`.
    ///
    /// Unchanged endpoints are left untouched. Endpoints present only in
    /// `previous` are not processed; their stale entries remain until
    /// overwritten.
    pub fn reconcile(&self, previous: &EndpointConfig) {
        let current = self.config.read().clone();
        for (name, address) in current.changed_since(previous) {
            debug!(%name, %address, "endpoint added or changed, refetching");
            self.spawn_fetch(name.to_string(), address.to_string());
        }
    }

    /// Trigger a fetch for exactly one endpoint, regardless of whether its
    /// address changed.
    ///
    /// An unconfigured `name` resolves to the empty address; the fetch fails
    /// and the failure is recorded under that name. Callers are expected to
    /// pass configured names.
    pub fn refresh_one(&self, name: &str) {
        let address = self
            .config
            .read()
            .address(name)
            .unwrap_or_default()
            .to_string();
        self.spawn_fetch(name.to_string(), address);
    }

    /// Swap in a new configuration and return the previous one.
    ///
    /// The caller is expected to follow up with `reconcile(&previous)`.
    pub fn replace_config(&self, config: EndpointConfig) -> EndpointConfig {
        std::mem::replace(&mut *self.config.write(), config)
    }

    /// Stop accepting writes from fetches that are still in flight.
    ///
    /// Issued fetches are not aborted; their completions are discarded.
    pub(crate) fn mark_detached(&self) {
        self.detached.cancel();
    }

    /// Issue the fetch for one endpoint and store its outcome.
    ///
    /// Overlapping fetches for one name resolve last-write-wins; there is no
    /// sequencing between them, so callers that care about ordering should
    /// avoid triggering overlapping refreshes of the same name.
    fn spawn_fetch(&self, name: String, address: String) {
        let transport = Arc::clone(&self.transport);
        let store = self.clone();

        tokio::spawn(async move {
            debug!(%name, %address, "fetching endpoint");
            let outcome = transport.fetch_json(&address).await;
            store.record(&name, outcome);
        });
    }

    /// Replace the entry for `name` with the settled outcome and publish a
    /// fresh snapshot.
    fn record(&self, name: &str, outcome: Result<Value, FetchError>) {
        if self.detached.is_cancelled() {
            debug!(%name, "store detached, discarding fetch outcome");
            return;
        }

        let entry = match outcome {
            Ok(value) => CacheEntry::success(value),
            Err(error) => {
                warn!(%name, %error, "endpoint fetch failed");
                CacheEntry::failure(error)
            }
        };

        // Publish while still holding the lock so concurrent completions
        // cannot publish out of order.
        let mut state = self.state.write();
        state.insert(name.to_string(), entry);
        self.snapshot_tx.send_replace(Arc::new(state.clone()));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::transport::MockEndpointTransport;

    fn config(pairs: &[(&str, &str)]) -> EndpointConfig {
        pairs
            .iter()
            .map(|(n, a)| (n.to_string(), a.to_string()))
            .collect()
    }

    /// Wait until the published snapshot satisfies `pred`, observing every
    /// intermediate update.
    async fn wait_until(
        rx: &mut watch::Receiver<Snapshot>,
        pred: impl Fn(&Snapshot) -> bool,
    ) -> Snapshot {
        loop {
            {
                let snapshot = rx.borrow_and_update().clone();
                if pred(&snapshot) {
                    return snapshot;
                }
            }
            tokio::time::timeout(Duration::from_secs(2), rx.changed())
                .await
                .expect("timed out waiting for snapshot update")
                .expect("snapshot sender dropped");
        }
    }

    fn all_settled(snapshot: &Snapshot) -> bool {
        !snapshot.is_empty() && snapshot.values().all(|entry| !entry.is_pending())
    }

    #[test]
    fn construction_seeds_one_pending_entry_per_endpoint() {
        let store = CacheStore::new(
            config(&[("a", "/x"), ("b", "/y")]),
            Arc::new(MockEndpointTransport::new()),
        );

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot["a"].is_pending());
        assert!(snapshot["b"].is_pending());
    }

    #[tokio::test]
    async fn initialize_all_records_result_or_error_per_endpoint() {
        let mut transport = MockEndpointTransport::new();
        transport
            .expect_fetch_json()
            .withf(|address| address == "/ok")
            .returning(|_| Ok(json!({"v": 1})));
        transport
            .expect_fetch_json()
            .withf(|address| address == "/fail")
            .returning(|_| Err(FetchError::status(500)));

        let store = CacheStore::new(config(&[("a", "/ok"), ("b", "/fail")]), Arc::new(transport));
        let mut rx = store.subscribe();

        store.initialize_all();
        let snapshot = wait_until(&mut rx, all_settled).await;

        assert_eq!(snapshot["a"].result, Some(json!({"v": 1})));
        assert_eq!(snapshot["a"].error, None);
        assert_eq!(snapshot["b"].result, None);
        assert_eq!(snapshot["b"].error, Some(FetchError::status(500)));
    }

    #[tokio::test]
    async fn failing_endpoint_never_touches_other_entries() {
        let mut transport = MockEndpointTransport::new();
        transport
            .expect_fetch_json()
            .withf(|address| address == "/fail")
            .returning(|_| Err(FetchError::transport("connection refused")));

        let store = CacheStore::new(config(&[("a", "/x"), ("b", "/fail")]), Arc::new(transport));
        let mut rx = store.subscribe();

        store.refresh_one("b");
        let snapshot = wait_until(&mut rx, |s| !s["b"].is_pending()).await;

        assert!(snapshot["b"].error.is_some());
        assert!(snapshot["a"].is_pending());
    }

    #[tokio::test]
    async fn refresh_one_refetches_unconditionally() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);

        let mut transport = MockEndpointTransport::new();
        transport
            .expect_fetch_json()
            .withf(|address| address == "/x")
            .times(2)
            .returning(move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(json!(42))
            });

        let store = CacheStore::new(config(&[("a", "/x")]), Arc::new(transport));
        let mut rx = store.subscribe();

        store.refresh_one("a");
        store.refresh_one("a");

        wait_until(&mut rx, |s| s["a"].result == Some(json!(42))).await;
        while calls.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn refresh_one_unknown_name_records_failure_under_that_name() {
        let mut transport = MockEndpointTransport::new();
        transport
            .expect_fetch_json()
            .withf(|address| address.is_empty())
            .returning(|_| Err(FetchError::transport("invalid address")));

        let store = CacheStore::new(config(&[("a", "/x")]), Arc::new(transport));
        let mut rx = store.subscribe();

        store.refresh_one("ghost");
        let snapshot = wait_until(&mut rx, |s| s.contains_key("ghost")).await;

        assert!(snapshot["ghost"].error.is_some());
    }

    #[tokio::test]
    async fn reconcile_refetches_changed_address_only() {
        let mut transport = MockEndpointTransport::new();
        // No expectation for "/x": a fetch of the old address would panic.
        transport
            .expect_fetch_json()
            .withf(|address| address == "/y")
            .times(1)
            .returning(|_| Ok(json!("fresh")));

        let store = CacheStore::new(config(&[("a", "/x")]), Arc::new(transport));
        let mut rx = store.subscribe();

        let previous = store.replace_config(config(&[("a", "/y")]));
        store.reconcile(&previous);

        let snapshot = wait_until(&mut rx, |s| !s["a"].is_pending()).await;
        assert_eq!(snapshot["a"].result, Some(json!("fresh")));
    }

    #[tokio::test]
    async fn reconcile_fetches_added_endpoint_and_leaves_unchanged_alone() {
        let mut transport = MockEndpointTransport::new();
        // "a" keeps its address, so only "/z" may ever be fetched.
        transport
            .expect_fetch_json()
            .withf(|address| address == "/z")
            .times(1)
            .returning(|_| Ok(json!({"added": true})));

        let store = CacheStore::new(config(&[("a", "/x")]), Arc::new(transport));
        let mut rx = store.subscribe();

        let previous = store.replace_config(config(&[("a", "/x"), ("b", "/z")]));
        store.reconcile(&previous);

        let snapshot = wait_until(&mut rx, |s| s.contains_key("b") && !s["b"].is_pending()).await;
        assert_eq!(snapshot["b"].result, Some(json!({"added": true})));
        assert!(snapshot["a"].is_pending());
    }

    #[tokio::test]
    async fn reconcile_leaves_entries_of_removed_endpoints_in_place() {
        let mut transport = MockEndpointTransport::new();
        transport
            .expect_fetch_json()
            .withf(|address| address == "/x")
            .returning(|_| Ok(json!("kept")));

        let store = CacheStore::new(config(&[("a", "/x"), ("b", "/z")]), Arc::new(transport));
        let mut rx = store.subscribe();

        store.refresh_one("a");
        wait_until(&mut rx, |s| !s["a"].is_pending()).await;

        let previous = store.replace_config(config(&[("a", "/x")]));
        store.reconcile(&previous);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let snapshot = store.snapshot();
        assert_eq!(snapshot["a"].result, Some(json!("kept")));
        // The removed endpoint's entry persists untouched.
        assert!(snapshot.contains_key("b"));
        assert!(snapshot["b"].is_pending());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_completions_always_publish_the_fully_settled_state() {
        let round = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&round);

        let mut transport = MockEndpointTransport::new();
        transport
            .expect_fetch_json()
            .returning(move |_| Ok(json!(seen.load(Ordering::SeqCst))));

        let store = CacheStore::new(
            config(&[("a", "/a"), ("b", "/b"), ("c", "/c"), ("d", "/d")]),
            Arc::new(transport),
        );
        let mut rx = store.subscribe();

        for r in 1..=50 {
            round.store(r, Ordering::SeqCst);
            store.initialize_all();
            let expected = json!(r);
            // The last published snapshot of each round must contain every
            // entry of that round, whatever order the fetches settled in.
            wait_until(&mut rx, |s| {
                s.values().all(|e| e.result.as_ref() == Some(&expected))
            })
            .await;
        }
    }

    #[tokio::test]
    async fn detached_store_discards_fetch_outcomes() {
        let mut transport = MockEndpointTransport::new();
        transport
            .expect_fetch_json()
            .returning(|_| Ok(json!("late")));

        let store = CacheStore::new(config(&[("a", "/x")]), Arc::new(transport));

        store.mark_detached();
        store.refresh_one("a");
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(store.snapshot()["a"].is_pending());
    }
}
