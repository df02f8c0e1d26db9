//! Cache entry type.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FetchError;

/// Latest known outcome for one endpoint.
///
/// At most one of `result`/`error` is set at any observed instant; both
/// `None` is the pre-fetch state. Every settled fetch replaces the whole
/// entry, so observers never see a partial update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Parsed JSON body of the last successful fetch.
    pub result: Option<Value>,
    /// Failure recorded by the last unsuccessful fetch.
    pub error: Option<FetchError>,
}

impl CacheEntry {
    pub fn success(value: Value) -> Self {
        Self {
            result: Some(value),
            error: None,
        }
    }

    pub fn failure(error: FetchError) -> Self {
        Self {
            result: None,
            error: Some(error),
        }
    }

    /// True while no fetch for this endpoint has settled yet.
    pub fn is_pending(&self) -> bool {
        self.result.is_none() && self.error.is_none()
    }
}
