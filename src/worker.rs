use crate::{CounterStore, Decrement, Job, JobHandler, Metrics, ReservationError, ReservationGate, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Handler for `reserve_seat` jobs: takes one seat, or closes the gate when
/// none are left.
pub struct ReservationWorker {
    seats: Arc<dyn CounterStore>,
    gate: ReservationGate,
    metrics: Metrics,
}

impl ReservationWorker {
    pub fn new(seats: Arc<dyn CounterStore>, gate: ReservationGate, metrics: Metrics) -> Self {
        Self {
            seats,
            gate,
            metrics,
        }
    }
}

#[async_trait]
impl JobHandler for ReservationWorker {
    async fn handle(&self, job: &Job) -> Result<()> {
        match self.seats.decrement_if_positive().await? {
            Decrement::Applied { remaining } => {
                info!("Job {} reserved a seat, {} left", job.id, remaining);
                self.metrics.update_available_seats(remaining);
                self.metrics.record_reservation(true);
                Ok(())
            }
            Decrement::Exhausted { current } => {
                warn!("Job {} found no seat available ({})", job.id, current);
                self.gate.close();
                self.metrics.update_gate(false);
                self.metrics.record_reservation(false);
                Err(ReservationError::NotEnoughSeats)
            }
        }
    }
}
