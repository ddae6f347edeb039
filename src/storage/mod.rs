pub mod counter;
pub mod rocksdb_store;
pub mod state_store;

pub use counter::*;
pub use rocksdb_store::*;
pub use state_store::*;
