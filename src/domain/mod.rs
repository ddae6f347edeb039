pub mod job;
pub mod reservation;
pub mod schemas;

pub use job::*;
pub use reservation::*;
pub use schemas::*;
