//! Counter storage
//!
//! A store keeps at most one [`CounterRecord`] per page key. Backends must make
//! [`CounterStore::increment`] a single indivisible read-modify-write so that
//! concurrent handlers sharing a store never lose an update.

mod memory;
mod rocks;

use async_trait::async_trait;
use thiserror::Error;

use crate::encoding::{CodecError, CounterRecord};

pub use memory::MemoryStore;
pub use rocks::RocksStore;

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Fetch the record for `page_key`, if one was ever written.
    async fn get(&self, page_key: &str) -> Result<Option<CounterRecord>, StoreError>;

    /// Unconditionally overwrite the record stored under `record.page_key`.
    async fn set(&self, record: CounterRecord) -> Result<(), StoreError>;

    /// Atomically add one to the count for `page_key` and return the new value.
    /// An absent record counts as zero.
    async fn increment(&self, page_key: &str) -> Result<u64, StoreError>;
}

#[derive(Error, Debug)]
pub enum StoreError {
    /// Storage backend failed. If this happens the store is unavailable
    /// (similar to 503 response in http).
    #[error("internal storage error: {description}")]
    Internal { description: String },

    /// Record exists but can not be decoded.
    #[error("corrupted record for key '{key}': {source}")]
    Corrupted {
        key: String,
        #[source]
        source: CodecError,
    },

    #[error("failed to encode record for key '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: CodecError,
    },

    #[error("lock poisoned")]
    LockPoisoned,

    #[error("rocksdb error: {0}")]
    RocksDb(#[from] rocksdb::Error),
}

pub(crate) fn decode(key: &str, bytes: &[u8]) -> Result<CounterRecord, StoreError> {
    CounterRecord::deserialize(bytes).map_err(|source| StoreError::Corrupted {
        key: key.to_string(),
        source,
    })
}

pub(crate) fn encode(record: &CounterRecord) -> Result<Vec<u8>, StoreError> {
    record.serialize().map_err(|source| StoreError::Encode {
        key: record.page_key.clone(),
        source,
    })
}
