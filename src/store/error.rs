//! Error types for record storage.

use std::io;

use thiserror::Error;

/// Error returned by [`SecureRecordStore`](super::SecureRecordStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Nothing stored under this key. A normal negative result.
    #[error("no record at {namespace}/{key}")]
    NotFound { namespace: String, key: String },

    /// A payload exists but does not decode into the requested record.
    #[error("record at {namespace}/{key} is corrupt: {source}")]
    Corrupt {
        namespace: String,
        key: String,
        source: serde_json::Error,
    },

    #[error("failed to encode record for {namespace}/{key}: {source}")]
    Encode {
        namespace: String,
        key: String,
        source: serde_json::Error,
    },

    #[error("failed to read {namespace}/{key}: {source}")]
    ReadFailed {
        namespace: String,
        key: String,
        source: io::Error,
    },

    /// The backend rejected a write or delete.
    #[error("write to {namespace}/{key} rejected: {source}")]
    WriteFailed {
        namespace: String,
        key: String,
        source: io::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
