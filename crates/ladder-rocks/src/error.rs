//! Error types for the RocksDB store.

use thiserror::Error;

/// Result type for low-level store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised below the [`ladder_core::RecordStore`] boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    /// RocksDB error
    #[error("RocksDB error: {0}")]
    Db(#[from] rocksdb::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document failed to encode or decode
    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl From<StoreError> for ladder_core::Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Codec(e) => ladder_core::Error::Serialization(e),
            other => ladder_core::Error::Unavailable(other.to_string()),
        }
    }
}
