use crate::{Job, JobId, JobOutcome, ReservationError, Result};
use tokio::sync::watch;

/// A job as returned by `JobQueue::enqueue`, plus a handle on its outcome.
#[derive(Debug)]
pub struct EnqueuedJob {
    pub job: Job,
    pub completion: JobCompletion,
}

/// Observer for the terminal state of one job.
///
/// Clones observe the same job. Every observer fires at most once, and
/// registering one never blocks the caller.
#[derive(Debug, Clone)]
pub struct JobCompletion {
    job_id: JobId,
    outcome: watch::Receiver<Option<JobOutcome>>,
}

impl JobCompletion {
    pub(crate) fn new(job_id: JobId, outcome: watch::Receiver<Option<JobOutcome>>) -> Self {
        Self { job_id, outcome }
    }

    /// The outcome if the job already finished.
    pub fn outcome(&self) -> Option<JobOutcome> {
        self.outcome.borrow().clone()
    }

    /// Wait for the job to reach `completed` or `failed`.
    pub async fn wait(mut self) -> Result<JobOutcome> {
        let job_id = self.job_id;
        let outcome = self
            .outcome
            .wait_for(Option::is_some)
            .await
            .map_err(|_| {
                ReservationError::QueueUnavailable(format!(
                    "Queue dropped before job {} finished",
                    job_id
                ))
            })?
            .clone();

        outcome.ok_or_else(|| {
            ReservationError::QueueUnavailable(format!("Job {} finished without an outcome", job_id))
        })
    }

    /// Run `callback` once if the job completes.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(JobId) + Send + 'static,
    {
        let completion = self.clone();
        tokio::spawn(async move {
            let job_id = completion.job_id;
            if let Ok(JobOutcome::Completed) = completion.wait().await {
                callback(job_id);
            }
        });
    }

    /// Run `callback` once with the failure reason if the job fails.
    pub fn on_failed<F>(&self, callback: F)
    where
        F: FnOnce(JobId, String) + Send + 'static,
    {
        let completion = self.clone();
        tokio::spawn(async move {
            let job_id = completion.job_id;
            if let Ok(JobOutcome::Failed { reason }) = completion.wait().await {
                callback(job_id, reason);
            }
        });
    }
}
