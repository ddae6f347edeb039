use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Process-wide switch that stops new reservations once seats run out.
///
/// Clones share the same flag. Starts open; nothing in this crate reopens it.
#[derive(Debug, Clone)]
pub struct ReservationGate {
    enabled: Arc<AtomicBool>,
}

impl ReservationGate {
    pub fn new() -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_open(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Close the gate. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        let was_open = self.enabled.swap(false, Ordering::AcqRel);
        if was_open {
            warn!("No seats left, blocking new reservations");
        }
        was_open
    }
}

impl Default for ReservationGate {
    fn default() -> Self {
        Self::new()
    }
}
