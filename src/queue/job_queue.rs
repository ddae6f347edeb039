use crate::{
    retry_job_state_write, EnqueuedJob, Job, JobCompletion, JobCounts, JobEvent, JobHandler,
    JobId, JobOutcome, JobRepository, JobState, Metrics, QueueConfig, ReservationError, Result,
    TimeoutPolicy,
};
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Ordered work queue of typed jobs.
///
/// Every job type has one FIFO lane and at most one consumer task, so jobs
/// of a type are processed one at a time in creation order. Job records are
/// persisted in a [`JobRepository`]; reopening a queue over a persistent
/// backend picks up the jobs that were still pending.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    config: QueueConfig,
    jobs: JobRepository,
    lanes: DashMap<String, Lane>,
    // Next id to hand out; its high-water mark is persisted with the jobs.
    next_id: Mutex<u64>,
    watchers: DashMap<JobId, watch::Sender<Option<JobOutcome>>>,
    events: broadcast::Sender<JobEvent>,
    shutdown: watch::Sender<bool>,
    consumers: Mutex<Vec<JoinHandle<()>>>,
    metrics: Metrics,
}

struct Lane {
    tx: mpsc::UnboundedSender<JobId>,
    // Taken by the consumer when a processor registers.
    rx: Option<mpsc::UnboundedReceiver<JobId>>,
}

impl Lane {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx: Some(rx) }
    }
}

impl JobQueue {
    /// Open a queue over `jobs`, recovering unfinished jobs.
    pub fn open(config: QueueConfig, jobs: JobRepository, metrics: Metrics) -> Result<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown, _) = watch::channel(false);

        let inner = Arc::new(QueueInner {
            config,
            jobs,
            lanes: DashMap::new(),
            next_id: Mutex::new(1),
            watchers: DashMap::new(),
            events,
            shutdown,
            consumers: Mutex::new(Vec::new()),
            metrics,
        });

        inner.recover()?;

        Ok(Self { inner })
    }

    pub fn in_memory(config: QueueConfig, metrics: Metrics) -> Result<Self> {
        Self::open(config, JobRepository::in_memory(), metrics)
    }

    /// Create and persist a job in `created` state and hand it to its lane.
    ///
    /// Returns as soon as the job is stored; processing happens on the
    /// consumer task registered for `job_type`, if any.
    pub fn enqueue(&self, job_type: &str, payload: serde_json::Value) -> Result<EnqueuedJob> {
        let stopping = *self.inner.shutdown.borrow();
        if stopping {
            self.inner.metrics.record_enqueue(false);
            return Err(ReservationError::QueueUnavailable(
                "Queue is shutting down".to_string(),
            ));
        }

        let id = match self.inner.allocate_id() {
            Ok(id) => id,
            Err(e) => {
                self.inner.metrics.record_enqueue(false);
                return Err(e.into_queue_unavailable());
            }
        };
        let job = Job::new(id, job_type, payload);

        if let Err(e) = self.inner.jobs.save(&job) {
            self.inner.metrics.record_enqueue(false);
            return Err(e.into_queue_unavailable());
        }

        // The watcher must exist before the consumer can see the id.
        let (tx, rx) = watch::channel(None);
        self.inner.watchers.insert(id, tx);

        if let Err(e) = self.inner.push(job_type, id) {
            self.inner.watchers.remove(&id);
            if let Err(remove_err) = self.inner.jobs.remove(id) {
                warn!("Failed to discard unqueued job {}: {}", id, remove_err);
            }
            self.inner.metrics.record_enqueue(false);
            return Err(e);
        }

        self.inner.metrics.record_enqueue(true);
        self.inner.emit(JobEvent::Enqueued {
            id,
            job_type: job_type.to_string(),
        });
        debug!("Enqueued {} job {}", job_type, id);

        Ok(EnqueuedJob {
            job,
            completion: JobCompletion::new(id, rx),
        })
    }

    /// Install the handler for `job_type` and start its consumer.
    ///
    /// Only one handler per job type: a second registration fails with
    /// [`ReservationError::ProcessorAlreadyRegistered`] and the first one
    /// keeps running.
    pub fn register_processor(&self, job_type: &str, handler: Arc<dyn JobHandler>) -> Result<()> {
        let rx = {
            let mut lane = self
                .inner
                .lanes
                .entry(job_type.to_string())
                .or_insert_with(Lane::new);
            lane.rx
                .take()
                .ok_or_else(|| ReservationError::ProcessorAlreadyRegistered(job_type.to_string()))?
        };

        let inner = Arc::clone(&self.inner);
        let lane_type = job_type.to_string();
        let consumer = tokio::spawn(async move {
            inner.consume(lane_type, rx, handler).await;
        });

        self.inner
            .consumers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(consumer);

        info!("Registered processor for {} jobs", job_type);
        Ok(())
    }

    /// Queue-wide lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    pub fn job(&self, id: JobId) -> Result<Option<Job>> {
        self.inner.jobs.get(id).map_err(ReservationError::into_queue_unavailable)
    }

    pub fn counts(&self) -> Result<JobCounts> {
        self.inner.jobs.counts().map_err(ReservationError::into_queue_unavailable)
    }

    /// Stop every consumer after the job it is running, then flush the store.
    ///
    /// Observers of jobs that never ran are released: their `wait()` returns
    /// [`ReservationError::QueueUnavailable`].
    pub async fn shutdown(&self) -> Result<()> {
        self.inner.shutdown.send_replace(true);

        let consumers = std::mem::take(
            &mut *self
                .inner
                .consumers
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        for consumer in consumers {
            if let Err(e) = consumer.await {
                error!("Queue consumer ended abnormally: {}", e);
            }
        }

        let pending = self.inner.watchers.len();
        self.inner.watchers.clear();
        if pending > 0 {
            info!("Released observers of {} unfinished jobs", pending);
        }

        self.inner.jobs.flush()
    }
}

impl QueueInner {
    fn lock_next_id(&self) -> std::sync::MutexGuard<'_, u64> {
        self.next_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reserve the next id, persisting the new high-water mark first so a
    /// restart never hands the same id out twice.
    fn allocate_id(&self) -> Result<JobId> {
        let mut next = self.lock_next_id();
        let id = *next;
        self.jobs.save_next_id(id + 1)?;
        *next = id + 1;
        Ok(JobId::new(id))
    }

    fn push(&self, job_type: &str, id: JobId) -> Result<()> {
        let lane = self
            .lanes
            .entry(job_type.to_string())
            .or_insert_with(Lane::new);
        lane.tx.send(id).map_err(|_| {
            ReservationError::QueueUnavailable(format!("Lane for {} jobs is closed", job_type))
        })
    }

    fn emit(&self, event: JobEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn recover(&self) -> Result<()> {
        let jobs = self.jobs.all()?;
        let mut next_id = self.jobs.next_id()?.unwrap_or(1);
        let mut pending = 0;

        for mut job in jobs {
            next_id = next_id.max(job.id.value() + 1);

            match job.state {
                JobState::Created => {
                    self.push(&job.job_type, job.id)?;
                    pending += 1;
                }
                JobState::Active => {
                    let retry = self.config.timeout_policy == TimeoutPolicy::Requeue
                        && job.attempts < self.config.max_attempts;
                    if retry {
                        warn!("Job {} was interrupted while active, requeueing", job.id);
                        job.requeue();
                        self.jobs.save(&job)?;
                        self.push(&job.job_type, job.id)?;
                        pending += 1;
                    } else {
                        warn!("Job {} was interrupted while active, marking failed", job.id);
                        job.finish(&JobOutcome::Failed {
                            reason: "Interrupted by restart".to_string(),
                        });
                        self.jobs.save(&job)?;
                    }
                }
                JobState::Completed | JobState::Failed => {}
            }
        }

        *self.lock_next_id() = next_id;

        if pending > 0 {
            info!("Recovered {} pending jobs", pending);
        }
        Ok(())
    }

    async fn consume(
        self: Arc<Self>,
        job_type: String,
        mut rx: mpsc::UnboundedReceiver<JobId>,
        handler: Arc<dyn JobHandler>,
    ) {
        let mut shutdown = self.shutdown.subscribe();
        info!("Processing {} jobs", job_type);

        loop {
            let stopping = *shutdown.borrow_and_update();
            if stopping {
                break;
            }

            let id = tokio::select! {
                biased;
                _ = shutdown.changed() => continue,
                next = rx.recv() => match next {
                    Some(id) => id,
                    None => break,
                },
            };

            self.process(id, &handler).await;
        }

        info!("Stopped processing {} jobs", job_type);
    }

    async fn process(&self, id: JobId, handler: &Arc<dyn JobHandler>) {
        let mut job = match self.jobs.get(id) {
            Ok(Some(job)) => job,
            Ok(None) => {
                warn!("Job {} vanished before processing", id);
                return;
            }
            Err(e) => {
                error!("Failed to load job {}: {}", id, e);
                self.settle_unloaded(id, e);
                return;
            }
        };

        if job.state != JobState::Created {
            debug!("Skipping job {} in state {:?}", id, job.state);
            return;
        }

        job.activate();
        if let Err(e) = self.persist(&job).await {
            self.finish(job, JobOutcome::Failed { reason: e.to_string() }).await;
            return;
        }
        self.emit(JobEvent::Started {
            id,
            attempt: job.attempts,
        });
        self.metrics.record_job_started();
        let started = Instant::now();

        let mut task = {
            let handler = Arc::clone(handler);
            let job = job.clone();
            tokio::spawn(async move { handler.handle(&job).await })
        };

        let joined = match tokio::time::timeout(self.config.job_timeout(), &mut task).await {
            Ok(joined) => Some(joined),
            Err(_) => {
                // Abort only lands at the handler's next await point. The
                // lane stays busy until the task has really stopped.
                task.abort();
                match (&mut task).await {
                    Err(join_error) if join_error.is_cancelled() => None,
                    late => {
                        debug!("Job {} handler returned after its deadline", id);
                        Some(late)
                    }
                }
            }
        };

        let outcome = match joined {
            Some(Ok(Ok(()))) => JobOutcome::Completed,
            Some(Ok(Err(e))) => JobOutcome::Failed { reason: e.to_string() },
            Some(Err(join_error)) if join_error.is_panic() => JobOutcome::Failed {
                reason: "Job handler panicked".to_string(),
            },
            Some(Err(join_error)) => JobOutcome::Failed {
                reason: format!("Job handler was cancelled: {}", join_error),
            },
            None => {
                self.metrics.record_job_timeout();
                warn!(
                    "Job {} timed out after {:?} (attempt {})",
                    id,
                    self.config.job_timeout(),
                    job.attempts
                );

                let retry = self.config.timeout_policy == TimeoutPolicy::Requeue
                    && job.attempts < self.config.max_attempts;
                if retry {
                    self.metrics.record_job_finished(started.elapsed(), None);
                    self.requeue(job).await;
                    return;
                }

                JobOutcome::Failed {
                    reason: format!(
                        "Job timed out after {} ms",
                        self.config.job_timeout_ms
                    ),
                }
            }
        };

        self.metrics
            .record_job_finished(started.elapsed(), Some(outcome.is_completed()));
        self.finish(job, outcome).await;
    }

    async fn requeue(&self, mut job: Job) {
        job.requeue();
        let id = job.id;
        let attempts = job.attempts;

        if let Err(e) = self.persist(&job).await {
            self.finish(job, JobOutcome::Failed { reason: e.to_string() }).await;
            return;
        }
        if let Err(e) = self.push(&job.job_type, id) {
            self.finish(job, JobOutcome::Failed { reason: e.to_string() }).await;
            return;
        }

        self.emit(JobEvent::Requeued { id, attempts });
        info!("Requeued job {} after {} attempts", id, attempts);
    }

    async fn finish(&self, mut job: Job, outcome: JobOutcome) {
        job.finish(&outcome);
        let id = job.id;

        let stored = if outcome.is_completed() && self.config.remove_on_complete {
            retry_job_state_write("remove completed job", || {
                std::future::ready(self.jobs.remove(id))
            })
            .await
        } else {
            self.persist(&job).await
        };
        if let Err(e) = stored {
            error!("Failed to store final state of job {}: {}", id, e);
        }

        match &outcome {
            JobOutcome::Completed => {
                info!("Job {} completed", id);
                self.emit(JobEvent::Completed { id });
            }
            JobOutcome::Failed { reason } => {
                warn!("Job {} failed: {}", id, reason);
                self.emit(JobEvent::Failed {
                    id,
                    reason: reason.clone(),
                });
            }
        }

        if let Some((_, watcher)) = self.watchers.remove(&id) {
            watcher.send_replace(Some(outcome));
        }
    }

    // A job whose record cannot be read still has to reach its observers.
    fn settle_unloaded(&self, id: JobId, e: ReservationError) {
        let reason = e.to_string();
        self.emit(JobEvent::Failed {
            id,
            reason: reason.clone(),
        });
        if let Some((_, watcher)) = self.watchers.remove(&id) {
            watcher.send_replace(Some(JobOutcome::Failed { reason }));
        }
    }

    async fn persist(&self, job: &Job) -> Result<()> {
        retry_job_state_write("persist job state", || std::future::ready(self.jobs.save(job)))
            .await
    }
}
