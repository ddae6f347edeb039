use crate::{ReservationError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StoreBackendKind {
    Memory,
    RocksDB,
}

impl FromStr for StoreBackendKind {
    type Err = ReservationError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "memory" | "in_memory" | "in-memory" => Ok(Self::Memory),
            "rocksdb" => Ok(Self::RocksDB),
            other => Err(ReservationError::InvalidArgument(format!(
                "Invalid store backend: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackendKind,
    pub state_dir: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackendKind::Memory,
            state_dir: "/tmp/seat-reservation".to_string(),
        }
    }
}

/// What happens to a job whose handler outlives `job_timeout_ms`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimeoutPolicy {
    /// Mark the job failed. Each job runs at most once.
    Fail,
    /// Put the job back at the tail of its lane until `max_attempts` is
    /// reached. A handler cut off mid-way may run again.
    Requeue,
}

impl FromStr for TimeoutPolicy {
    type Err = ReservationError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "requeue" | "retry" => Ok(Self::Requeue),
            other => Err(ReservationError::InvalidArgument(format!(
                "Invalid timeout policy: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub job_timeout_ms: u64,
    pub timeout_policy: TimeoutPolicy,
    pub max_attempts: u32,
    pub remove_on_complete: bool,
    pub process_on_startup: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            job_timeout_ms: 5_000,
            timeout_policy: TimeoutPolicy::Fail,
            max_attempts: 3,
            remove_on_complete: false,
            process_on_startup: true,
        }
    }
}

impl QueueConfig {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_millis(self.job_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub application_id: String,
    pub initial_seats: i64,
    pub reset_seats_on_start: bool,
    pub port: u16,
    pub shutdown_timeout_ms: u64,
    pub store: StoreConfig,
    pub queue: QueueConfig,
    pub additional_properties: HashMap<String, String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            application_id: "seat-reservation".to_string(),
            initial_seats: 50,
            reset_seats_on_start: true,
            port: 1245,
            shutdown_timeout_ms: 30_000,
            store: StoreConfig::default(),
            queue: QueueConfig::default(),
            additional_properties: HashMap::new(),
        }
    }
}

impl ServiceConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
