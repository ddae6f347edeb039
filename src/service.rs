use crate::{
    CounterStore, JobQueue, JobRepository, JobTypes, Keys, KvCounterStore, Metrics,
    ReservationError, ReservationGate, ReservationWorker, ReserveStatus, Result, ServiceConfig,
    StateStoreBackend, Stores,
};
use std::sync::Arc;
use tracing::{error, info};

/// Owns the seat counter, the gate and the job queue, and exposes the
/// operations the request layer needs.
#[derive(Clone)]
pub struct ReservationService {
    seats: Arc<dyn CounterStore>,
    gate: ReservationGate,
    queue: JobQueue,
    metrics: Metrics,
}

impl ReservationService {
    pub async fn new(config: &ServiceConfig) -> Result<Self> {
        let metrics = Metrics::new()?;

        let seats: Arc<dyn CounterStore> = Arc::new(KvCounterStore::new(
            Keys::AVAILABLE_SEATS,
            StateStoreBackend::open(&config.store, Stores::SEATS)?,
        ));

        let jobs = JobRepository::open(&config.store)?;
        let queue = JobQueue::open(config.queue.clone(), jobs, metrics.clone())?;

        let service = Self::with_components(seats, ReservationGate::new(), queue, metrics);
        service
            .initialize_seats(config.initial_seats, config.reset_seats_on_start)
            .await?;

        Ok(service)
    }

    pub fn with_components(
        seats: Arc<dyn CounterStore>,
        gate: ReservationGate,
        queue: JobQueue,
        metrics: Metrics,
    ) -> Self {
        Self {
            seats,
            gate,
            queue,
            metrics,
        }
    }

    /// Seed the seat count. A persisted count is kept unless `reset` is set.
    pub async fn initialize_seats(&self, capacity: i64, reset: bool) -> Result<()> {
        let current = self.seats.current().await?;
        let seats = match current {
            Some(existing) if !reset => {
                info!("Keeping persisted seat count: {}", existing);
                existing
            }
            _ => {
                self.seats.set(capacity).await?;
                info!("Initialized seat count to {}", capacity);
                capacity
            }
        };
        self.metrics.update_available_seats(seats);
        Ok(())
    }

    pub async fn available_seats(&self) -> Result<i64> {
        self.seats.get().await
    }

    /// Accept a reservation request: enqueue a `reserve_seat` job unless the
    /// gate is closed. Never waits for the job to run.
    pub async fn reserve(&self) -> ReserveStatus {
        if !self.gate.is_open() {
            self.metrics.record_blocked_request();
            return ReserveStatus::Blocked;
        }

        match self.queue.enqueue(JobTypes::RESERVE_SEAT, serde_json::json!({})) {
            Ok(enqueued) => {
                enqueued.completion.on_complete(|id| {
                    info!("Seat reservation job {} completed", id);
                });
                enqueued.completion.on_failed(|id, reason| {
                    info!("Seat reservation job {} failed: {}", id, reason);
                });
                ReserveStatus::InProcess {
                    job: enqueued.job,
                    completion: enqueued.completion,
                }
            }
            Err(e) => {
                error!("Failed to enqueue reservation: {}", e);
                ReserveStatus::Failed
            }
        }
    }

    /// Register the reservation worker. Returns `false` if it was already
    /// registered, which leaves the running worker untouched.
    pub fn start_processing(&self) -> Result<bool> {
        let worker = ReservationWorker::new(
            Arc::clone(&self.seats),
            self.gate.clone(),
            self.metrics.clone(),
        );

        match self
            .queue
            .register_processor(JobTypes::RESERVE_SEAT, Arc::new(worker))
        {
            Ok(()) => Ok(true),
            Err(ReservationError::ProcessorAlreadyRegistered(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn seats(&self) -> Arc<dyn CounterStore> {
        Arc::clone(&self.seats)
    }

    pub fn gate(&self) -> &ReservationGate {
        &self.gate
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}
