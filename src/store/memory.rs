use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{CounterStore, StoreError, decode, encode};
use crate::encoding::CounterRecord;

/// In-memory counter store
pub struct MemoryStore {
    data: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub(crate) fn put_raw(&self, key: &str, bytes: Vec<u8>) {
        self.data.write().unwrap().insert(key.to_string(), bytes);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn get(&self, page_key: &str) -> Result<Option<CounterRecord>, StoreError> {
        let data = self.data.read().map_err(|_| StoreError::LockPoisoned)?;
        data.get(page_key)
            .map(|bytes| decode(page_key, bytes))
            .transpose()
    }

    async fn set(&self, record: CounterRecord) -> Result<(), StoreError> {
        let bytes = encode(&record)?;
        let mut data = self.data.write().map_err(|_| StoreError::LockPoisoned)?;
        data.insert(record.page_key, bytes);
        Ok(())
    }

    async fn increment(&self, page_key: &str) -> Result<u64, StoreError> {
        // write lock is held across the read and the write
        let mut data = self.data.write().map_err(|_| StoreError::LockPoisoned)?;
        let current = match data.get(page_key) {
            Some(bytes) => decode(page_key, bytes)?,
            None => CounterRecord::new(page_key, 0),
        };
        let next = current.incremented();
        data.insert(page_key.to_string(), encode(&next)?);
        Ok(next.visit_count)
    }
}
