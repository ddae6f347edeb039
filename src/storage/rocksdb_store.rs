use crate::Result;
use rocksdb::{IteratorMode, Options, WriteOptions, DB};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// JSON-encoded records in one RocksDB database.
///
/// Iteration follows byte order of the keys, which is why job keys are
/// zero padded.
pub struct RocksDBStore {
    db: DB,
}

impl RocksDBStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_keep_log_file_num(4);
        opts.set_max_open_files(256);

        let db = DB::open(&opts, path)?;
        debug!("Opened RocksDB store at {}", path.display());
        Ok(Self { db })
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.db
            .get_pinned(key)?
            .map(|bytes| serde_json::from_slice(&bytes))
            .transpose()
            .map_err(Into::into)
    }

    /// Write through the WAL without an fsync per record.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(false);
        self.db.put_opt(key, bytes, &write_opts)?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        self.db.delete(key)?;
        Ok(())
    }

    pub fn values<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.db
            .iterator(IteratorMode::Start)
            .map(|item| -> Result<T> {
                let (_, bytes) = item?;
                Ok(serde_json::from_slice(&bytes)?)
            })
            .collect()
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl Drop for RocksDBStore {
    fn drop(&mut self) {
        if let Err(e) = self.db.flush() {
            warn!("Failed to flush RocksDB store on close: {}", e);
        }
    }
}
