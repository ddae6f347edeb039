use crate::{Decrement, ReservationError, Result, StateStoreBackend};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

/// A single named integer, the available seat count.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// The persisted value, `None` if it was never set.
    async fn current(&self) -> Result<Option<i64>>;

    /// Unconditional write; last writer wins.
    async fn set(&self, value: i64) -> Result<()>;

    /// Decrement by one only if the value is positive, as a single step.
    async fn decrement_if_positive(&self) -> Result<Decrement>;

    /// The current value, or 0 when uninitialized.
    async fn get(&self) -> Result<i64> {
        Ok(self.current().await?.unwrap_or(0))
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// [`CounterStore`] over a key-value [`StateStoreBackend`].
///
/// Writes go through `write_lock` so a `set` can never land between the read
/// and the write of a `decrement_if_positive`.
pub struct KvCounterStore {
    key: String,
    backend: StateStoreBackend<i64>,
    write_lock: Mutex<()>,
}

impl KvCounterStore {
    pub fn new(key: &str, backend: StateStoreBackend<i64>) -> Self {
        Self {
            key: key.to_string(),
            backend,
            write_lock: Mutex::new(()),
        }
    }

    pub fn in_memory(key: &str) -> Self {
        Self::new(key, StateStoreBackend::in_memory())
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded section only touches the backend, a poisoned lock holds no broken state.
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read(&self) -> Result<Option<i64>> {
        self.backend
            .get(&self.key)
            .map_err(ReservationError::into_store_unavailable)
    }

    fn write(&self, value: i64) -> Result<()> {
        self.backend
            .put(&self.key, &value)
            .map_err(ReservationError::into_store_unavailable)
    }
}

#[async_trait]
impl CounterStore for KvCounterStore {
    async fn current(&self) -> Result<Option<i64>> {
        self.read()
    }

    async fn set(&self, value: i64) -> Result<()> {
        let _guard = self.lock();
        self.write(value)
    }

    async fn decrement_if_positive(&self) -> Result<Decrement> {
        let _guard = self.lock();
        let current = self.read()?.unwrap_or(0);
        if current <= 0 {
            return Ok(Decrement::Exhausted { current });
        }

        let remaining = current - 1;
        self.write(remaining)?;
        Ok(Decrement::Applied { remaining })
    }

    async fn flush(&self) -> Result<()> {
        self.backend
            .flush()
            .map_err(ReservationError::into_store_unavailable)
    }
}
