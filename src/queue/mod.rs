pub mod completion;
pub mod handler;
pub mod job_queue;
pub mod repository;

pub use completion::*;
pub use handler::*;
pub use job_queue::*;
pub use repository::*;
