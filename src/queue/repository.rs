use crate::{
    job_key, Job, JobCounts, JobId, JobState, Keys, Result, StateStoreBackend, StoreConfig, Stores,
};

/// Persistent job records, keyed by [`job_key`], plus the id high-water mark.
#[derive(Clone)]
pub struct JobRepository {
    jobs: StateStoreBackend<Job>,
    sequence: StateStoreBackend<u64>,
}

impl JobRepository {
    pub fn new(jobs: StateStoreBackend<Job>, sequence: StateStoreBackend<u64>) -> Self {
        Self { jobs, sequence }
    }

    /// Open the job and sequence stores on the configured backend.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        Ok(Self::new(
            StateStoreBackend::open(config, Stores::JOBS)?,
            StateStoreBackend::open(config, Stores::JOB_SEQUENCE)?,
        ))
    }

    pub fn in_memory() -> Self {
        Self::new(StateStoreBackend::in_memory(), StateStoreBackend::in_memory())
    }

    pub fn save(&self, job: &Job) -> Result<()> {
        self.jobs.put(&job_key(job.id), job)
    }

    pub fn get(&self, id: JobId) -> Result<Option<Job>> {
        self.jobs.get(&job_key(id))
    }

    pub fn remove(&self, id: JobId) -> Result<()> {
        self.jobs.remove(&job_key(id))
    }

    /// Every job, oldest first.
    pub fn all(&self) -> Result<Vec<Job>> {
        self.jobs.values()
    }

    pub fn counts(&self) -> Result<JobCounts> {
        let mut counts = JobCounts::default();
        for job in self.jobs.values()? {
            match job.state {
                JobState::Created => counts.created += 1,
                JobState::Active => counts.active += 1,
                JobState::Completed => counts.completed += 1,
                JobState::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }

    /// The first id never handed out, if one was recorded.
    pub fn next_id(&self) -> Result<Option<u64>> {
        self.sequence.get(Keys::NEXT_JOB_ID)
    }

    pub fn save_next_id(&self, next: u64) -> Result<()> {
        self.sequence.put(Keys::NEXT_JOB_ID, &next)
    }

    pub fn flush(&self) -> Result<()> {
        self.jobs.flush()?;
        self.sequence.flush()
    }
}
