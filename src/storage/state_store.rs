use crate::{Result, RocksDBStore, StoreBackendKind, StoreConfig};
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::Arc;

/// A named store of `V` records keyed by string.
///
/// Clones share the same data. Both backends list values in key order.
pub enum StateStoreBackend<V> {
    InMemory(Arc<DashMap<String, V>>),
    RocksDB(Arc<RocksDBStore>),
}

impl<V> StateStoreBackend<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    pub fn in_memory() -> Self {
        Self::InMemory(Arc::new(DashMap::new()))
    }

    pub fn rocksdb<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::RocksDB(Arc::new(RocksDBStore::open(path)?)))
    }

    /// Open the store called `name` on the configured backend. RocksDB
    /// stores live in `<state_dir>/<name>`.
    pub fn open(config: &StoreConfig, name: &str) -> Result<Self> {
        match config.backend {
            StoreBackendKind::Memory => Ok(Self::in_memory()),
            StoreBackendKind::RocksDB => {
                let path = Path::new(&config.state_dir).join(name);
                std::fs::create_dir_all(&path)?;
                Self::rocksdb(path)
            }
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<V>> {
        match self {
            Self::InMemory(map) => Ok(map.get(key).map(|entry| entry.value().clone())),
            Self::RocksDB(db) => db.get(key),
        }
    }

    pub fn put(&self, key: &str, value: &V) -> Result<()> {
        match self {
            Self::InMemory(map) => {
                map.insert(key.to_string(), value.clone());
                Ok(())
            }
            Self::RocksDB(db) => db.put(key, value),
        }
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        match self {
            Self::InMemory(map) => {
                map.remove(key);
                Ok(())
            }
            Self::RocksDB(db) => db.delete(key),
        }
    }

    pub fn values(&self) -> Result<Vec<V>> {
        match self {
            Self::InMemory(map) => {
                let mut entries: Vec<(String, V)> = map
                    .iter()
                    .map(|entry| (entry.key().clone(), entry.value().clone()))
                    .collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                Ok(entries.into_iter().map(|(_, value)| value).collect())
            }
            Self::RocksDB(db) => db.values(),
        }
    }

    pub fn flush(&self) -> Result<()> {
        match self {
            Self::InMemory(_) => Ok(()),
            Self::RocksDB(db) => db.flush(),
        }
    }
}

impl<V> Clone for StateStoreBackend<V> {
    fn clone(&self) -> Self {
        match self {
            Self::InMemory(map) => Self::InMemory(Arc::clone(map)),
            Self::RocksDB(db) => Self::RocksDB(Arc::clone(db)),
        }
    }
}
