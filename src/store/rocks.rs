use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rocksdb::{ColumnFamily, DB, Options};
use tracing::info;

use super::{CounterStore, StoreError, decode, encode};
use crate::encoding::CounterRecord;

/// RocksDB backed counter store. The table is a column family.
pub struct RocksStore {
    db: DB,
    table: String,
    /// Serializes writers. RocksDB holds a LOCK file on the data directory, so
    /// this process is the only writer and the mutex covers all of them.
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open (or create) the database at `path` with `table` as column family
    pub fn open(path: impl AsRef<Path>, table: &str) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        // every existing column family has to be opened alongside ours
        let mut tables = if path.as_ref().join("CURRENT").exists() {
            DB::list_cf(&opts, path.as_ref())?
        } else {
            Vec::new()
        };
        if !tables.iter().any(|t| t == table) {
            tables.push(table.to_string());
        }
        let db = DB::open_cf(&opts, path.as_ref(), &tables)?;
        info!(
            "Opened rocksdb at {} with table '{}'",
            path.as_ref().display(),
            table
        );

        Ok(Self {
            db,
            table: table.to_string(),
            write_lock: Mutex::new(()),
        })
    }

    fn cf(&self) -> Result<&ColumnFamily, StoreError> {
        self.db
            .cf_handle(&self.table)
            .ok_or_else(|| StoreError::Internal {
                description: format!("missing column family '{}'", self.table),
            })
    }

    fn read(&self, page_key: &str) -> Result<Option<CounterRecord>, StoreError> {
        self.db
            .get_cf(self.cf()?, page_key.as_bytes())?
            .map(|bytes| decode(page_key, &bytes))
            .transpose()
    }

    fn write(&self, record: &CounterRecord) -> Result<(), StoreError> {
        self.db
            .put_cf(self.cf()?, record.page_key.as_bytes(), encode(record)?)?;
        Ok(())
    }
}

#[async_trait]
impl CounterStore for RocksStore {
    async fn get(&self, page_key: &str) -> Result<Option<CounterRecord>, StoreError> {
        self.read(page_key)
    }

    async fn set(&self, record: CounterRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        self.write(&record)
    }

    async fn increment(&self, page_key: &str) -> Result<u64, StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let next = match self.read(page_key)? {
            Some(current) => current.incremented(),
            None => CounterRecord::new(page_key, 1),
        };
        self.write(&next)?;
        Ok(next.visit_count)
    }
}
