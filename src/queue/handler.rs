use crate::{Job, Result};
use async_trait::async_trait;

/// Processes jobs of one type.
///
/// `Ok(())` completes the job, an error fails it with the error's message.
/// Each call runs in its own task, so a panic fails the job as well.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: &Job) -> Result<()>;
}
