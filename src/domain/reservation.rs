use super::job::Job;
use crate::queue::JobCompletion;

/// Result of a seat decrement attempt on the counter store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decrement {
    Applied { remaining: i64 },
    Exhausted { current: i64 },
}

/// What the acceptance path did with a reservation request.
#[derive(Debug)]
pub enum ReserveStatus {
    Blocked,
    InProcess { job: Job, completion: JobCompletion },
    Failed,
}

impl ReserveStatus {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Blocked => "Reservations are blocked",
            Self::InProcess { .. } => "Reservation in process",
            Self::Failed => "Reservation failed",
        }
    }
}
