use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReservationError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error("Not enough seats available")]
    NotEnoughSeats,

    #[error("Processor already registered for job type: {0}")]
    ProcessorAlreadyRegistered(String),

    #[error("RocksDB error: {0}")]
    RocksDB(#[from] rocksdb::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Properties error: {0}")]
    Properties(#[from] java_properties::PropertiesError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ReservationError {
    /// Collapse a backend failure into the counter store's error kind.
    pub fn into_store_unavailable(self) -> Self {
        match self {
            Self::StoreUnavailable(_) => self,
            other => Self::StoreUnavailable(other.to_string()),
        }
    }

    /// Collapse a backend failure into the job queue's error kind.
    pub fn into_queue_unavailable(self) -> Self {
        match self {
            Self::QueueUnavailable(_) => self,
            other => Self::QueueUnavailable(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReservationError>;
