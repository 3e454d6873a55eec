//! web3.storage API response types

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use w3s_core::error::{StorageError, StorageResult};

/// Outcome of a call to the upload or status endpoints
///
/// `status_code` is only set when the service answered 200. Any other outcome
/// leaves it empty and puts the response body or the error message in
/// `response`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    /// HTTP status, present only on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Compact JSON body, raw body text, or error message
    pub response: String,
}

impl UploadResult {
    /// Result for a successful response
    pub fn success(status_code: u16, response: String) -> Self {
        Self {
            status_code: Some(status_code),
            response,
        }
    }

    /// Result carrying a failure body or message
    pub fn failed(response: String) -> Self {
        Self {
            status_code: None,
            response,
        }
    }

    /// Collapse a typed outcome into a result value
    ///
    /// A status error keeps the service's body; every other error keeps its
    /// message.
    pub fn from_outcome(outcome: StorageResult<UploadResult>) -> Self {
        match outcome {
            Ok(result) => result,
            Err(StorageError::Status { body, .. }) => Self::failed(body),
            Err(error) => Self::failed(error.to_string()),
        }
    }

    /// Check if the service accepted the request
    pub fn is_success(&self) -> bool {
        self.status_code == Some(200)
    }

    /// Parse `response` as JSON
    pub fn json(&self) -> StorageResult<serde_json::Value> {
        serde_json::from_str(&self.response)
            .map_err(|e| StorageError::decode("Response is not JSON".to_string(), e))
    }

    /// Content identifier reported by the service, if any
    pub fn cid(&self) -> Option<String> {
        self.json()
            .ok()?
            .get("cid")?
            .as_str()
            .map(str::to_string)
    }
}

/// Metadata of a stored upload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FileMetadata {
    /// Upload name
    #[serde(default)]
    pub name: String,
    /// Size in bytes
    #[serde(default, alias = "dagSize")]
    pub size: u64,
    /// Root content identifier
    pub cid: String,
    /// Creation timestamp
    #[serde(default)]
    pub created: String,
    /// MIME type
    #[serde(default, rename = "type")]
    pub mime_type: String,
    /// Pin records, one per storage peer
    #[serde(default)]
    pub pins: Vec<PinStatus>,
}

/// Pin record of one peer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PinStatus {
    #[serde(default)]
    pub cid: String,
    pub status: PinState,
    #[serde(default, alias = "updated")]
    pub created: String,
    /// Peer identifiers holding the pin
    #[serde(default)]
    pub delegates: BTreeSet<String>,
}

/// Pin lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PinState {
    #[serde(alias = "PinQueued", alias = "Queued")]
    Queued,
    #[serde(alias = "Pinning")]
    Pinning,
    #[serde(alias = "Pinned")]
    Pinned,
    #[serde(alias = "PinError", alias = "Failed")]
    Failed,
}

impl FileMetadata {
    /// Check if at least one peer holds the content
    pub fn is_pinned(&self) -> bool {
        self.pins.iter().any(|pin| pin.status == PinState::Pinned)
    }
}
