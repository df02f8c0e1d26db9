//! Fetch failure taxonomy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a fetch for one endpoint failed.
///
/// The value is stored inside the affected cache entry, so it is cloneable
/// and serializable. A failure is terminal only for that one fetch attempt;
/// it stays recorded until the next refresh of the same endpoint.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchError {
    /// The request itself could not be completed.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The transport succeeded but the endpoint returned a non-ok status.
    #[error("endpoint returned HTTP {code}")]
    Status { code: u16 },

    /// The response body could not be parsed as JSON.
    #[error("invalid response body: {message}")]
    Parse { message: String },
}

impl FetchError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn status(code: u16) -> Self {
        Self::Status { code }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }
}
