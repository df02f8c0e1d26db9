//! # Endpoint Cache
//!
//! A small client-side cache for a named set of remote JSON endpoints.
//! Given a mapping of endpoint names to addresses, the cache fetches each
//! endpoint once, re-fetches only the changed or added entries when the
//! mapping is replaced, and lets consumers refresh a single entry on demand.
//! Each entry records either the latest successful result or the latest
//! failure, never both.
//!
//! The crate is split along the same seams as the runtime behavior:
//!
//! - [`store`] owns the state and the fetch/update lifecycle
//! - [`channel`] distributes read-only snapshots and refresh handles to
//!   consumers, with a safe no-op default when no store is mounted
//! - [`controller`] makes the attach/update/detach lifecycle explicit
//! - [`transport`] is the HTTP seam, mockable for tests

pub mod channel;
pub mod config;
pub mod controller;
pub mod error;
pub mod store;
pub mod transport;

pub use channel::{CacheAccess, CacheChannel};
pub use config::EndpointConfig;
pub use controller::CacheController;
pub use error::FetchError;
pub use store::{CacheEntry, CacheStore, Snapshot};
pub use transport::{EndpointTransport, HttpTransport};
