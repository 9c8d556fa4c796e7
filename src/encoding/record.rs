//! Counter record encoding/decoding for storage

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Key of the single page this deployment counts visits for
pub const ROOT_PAGE_KEY: &str = "/";

fn current_version() -> u8 {
    super::CURRENT_VERSION
}

/// Counter record structure for storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRecord {
    /// Format version
    #[serde(default = "current_version")]
    pub version: u8,
    /// Page the count belongs to
    pub page_key: String,
    /// Number of recorded visits
    pub visit_count: u64,
}

impl CounterRecord {
    /// Create a new record at the current format version
    pub fn new(page_key: impl Into<String>, visit_count: u64) -> Self {
        Self {
            version: super::CURRENT_VERSION,
            page_key: page_key.into(),
            visit_count,
        }
    }

    /// Serialize to bytes
    pub fn serialize(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(CodecError::Encode)
    }

    /// Deserialize from bytes
    pub fn deserialize(bytes: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::InvalidData(e.to_string()))
    }

    /// Returns a copy with the count advanced by one
    pub fn incremented(&self) -> Self {
        Self {
            version: super::CURRENT_VERSION,
            page_key: self.page_key.clone(),
            visit_count: self.visit_count.saturating_add(1),
        }
    }
}

/// Errors that can occur during encoding or decoding
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode record: {0}")]
    Encode(serde_json::Error),

    /// Input data is invalid or corrupted
    #[error("invalid data for decoding: {0}")]
    InvalidData(String),
}
