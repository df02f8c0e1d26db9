//! Endpoint configuration.
//!
//! The configuration maps endpoint names to address strings. It is owned by
//! whoever constructs the store and is immutable except by full replacement;
//! the diff between the previous and current value decides which endpoints
//! get refetched.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Mapping from endpoint name to endpoint address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointConfig {
    endpoints: HashMap<String, String>,
}

impl EndpointConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self {
            endpoints: HashMap::new(),
        }
    }

    /// Add or replace an endpoint, builder-style.
    pub fn with_endpoint(mut self, name: impl Into<String>, address: impl Into<String>) -> Self {
        self.endpoints.insert(name.into(), address.into());
        self
    }

    /// Address configured for `name`, if any.
    pub fn address(&self, name: &str) -> Option<&str> {
        self.endpoints.get(name).map(String::as_str)
    }

    /// Iterate over configured endpoint names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }

    /// Iterate over `(name, address)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.endpoints
            .iter()
            .map(|(name, address)| (name.as_str(), address.as_str()))
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Endpoints in `self` that are new or whose address string differs from
    /// `previous`.
    ///
    /// Comparison is by string equality. Names present only in `previous`
    /// are not reported; their stale cache entries are left in place.
    pub fn changed_since<'a>(&'a self, previous: &EndpointConfig) -> Vec<(&'a str, &'a str)> {
        self.endpoints
            .iter()
            .filter(|(name, address)| previous.address(name) != Some(address.as_str()))
            .map(|(name, address)| (name.as_str(), address.as_str()))
            .collect()
    }
}

impl Default for EndpointConfig {
    /// Single placeholder entry.
    fn default() -> Self {
        Self::new().with_endpoint("endpoint1", "")
    }
}

impl FromIterator<(String, String)> for EndpointConfig {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            endpoints: iter.into_iter().collect(),
        }
    }
}
