pub mod config;
pub mod config_parser;
pub mod domain;
pub mod error;
pub mod gate;
pub mod http;
pub mod metrics;
pub mod queue;
pub mod retry;
pub mod service;
pub mod shutdown;
pub mod storage;
pub mod worker;

pub use self::config::*;
pub use config_parser::*;
pub use domain::*;
pub use error::*;
pub use gate::*;
pub use metrics::*;
pub use queue::*;
pub use retry::*;
pub use service::*;
pub use shutdown::*;
pub use storage::*;
pub use worker::*;
