use prometheus::{
    Counter, Histogram, Gauge, Registry, Opts, HistogramOpts,
    register_counter_with_registry, register_histogram_with_registry,
    register_gauge_with_registry, Encoder, TextEncoder,
};
use std::sync::Arc;
use crate::Result;

/// Metrics collector for the reservation system
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    // Queue metrics
    pub jobs_enqueued: Counter,
    pub enqueue_failures: Counter,
    pub jobs_completed: Counter,
    pub jobs_failed: Counter,
    pub jobs_timed_out: Counter,
    pub jobs_requeued: Counter,
    pub active_jobs: Gauge,
    pub job_duration: Histogram,

    // Business metrics
    pub reservations_successful: Counter,
    pub reservations_rejected: Counter,
    pub reservations_blocked: Counter,
    pub available_seats: Gauge,
    pub gate_open: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        // Queue metrics
        let jobs_enqueued = register_counter_with_registry!(
            Opts::new("jobs_enqueued_total", "Total number of jobs enqueued"),
            registry
        )?;

        let enqueue_failures = register_counter_with_registry!(
            Opts::new("enqueue_failures_total", "Total number of jobs that could not be enqueued"),
            registry
        )?;

        let jobs_completed = register_counter_with_registry!(
            Opts::new("jobs_completed_total", "Total number of jobs completed"),
            registry
        )?;

        let jobs_failed = register_counter_with_registry!(
            Opts::new("jobs_failed_total", "Total number of jobs failed"),
            registry
        )?;

        let jobs_timed_out = register_counter_with_registry!(
            Opts::new("jobs_timed_out_total", "Total number of job attempts that hit the timeout"),
            registry
        )?;

        let jobs_requeued = register_counter_with_registry!(
            Opts::new("jobs_requeued_total", "Total number of jobs put back in their lane"),
            registry
        )?;

        let active_jobs = register_gauge_with_registry!(
            Opts::new("active_jobs", "Number of jobs currently being processed"),
            registry
        )?;

        let job_duration = register_histogram_with_registry!(
            HistogramOpts::new("job_duration_seconds", "Time spent processing a job")
                .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            registry
        )?;

        // Business metrics
        let reservations_successful = register_counter_with_registry!(
            Opts::new("reservations_successful_total", "Total number of seats reserved"),
            registry
        )?;

        let reservations_rejected = register_counter_with_registry!(
            Opts::new("reservations_rejected_total", "Total number of reservation jobs that found no seat"),
            registry
        )?;

        let reservations_blocked = register_counter_with_registry!(
            Opts::new("reservations_blocked_total", "Total number of requests refused by the closed gate"),
            registry
        )?;

        let available_seats = register_gauge_with_registry!(
            Opts::new("available_seats", "Current number of available seats"),
            registry
        )?;

        let gate_open = register_gauge_with_registry!(
            Opts::new("reservation_gate_open", "1 while reservations are accepted, 0 once blocked"),
            registry
        )?;
        gate_open.set(1.0);

        Ok(Self {
            registry,
            jobs_enqueued,
            enqueue_failures,
            jobs_completed,
            jobs_failed,
            jobs_timed_out,
            jobs_requeued,
            active_jobs,
            job_duration,
            reservations_successful,
            reservations_rejected,
            reservations_blocked,
            available_seats,
            gate_open,
        })
    }

    /// Export metrics in Prometheus format
    pub fn export(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Record an enqueue attempt
    pub fn record_enqueue(&self, success: bool) {
        if success {
            self.jobs_enqueued.inc();
        } else {
            self.enqueue_failures.inc();
        }
    }

    pub fn record_job_started(&self) {
        self.active_jobs.inc();
    }

    /// Record the end of one processing attempt
    pub fn record_job_finished(&self, duration: std::time::Duration, completed: Option<bool>) {
        self.active_jobs.dec();
        self.job_duration.observe(duration.as_secs_f64());
        match completed {
            Some(true) => self.jobs_completed.inc(),
            Some(false) => self.jobs_failed.inc(),
            None => self.jobs_requeued.inc(),
        }
    }

    pub fn record_job_timeout(&self) {
        self.jobs_timed_out.inc();
    }

    /// Record business events
    pub fn record_reservation(&self, success: bool) {
        if success {
            self.reservations_successful.inc();
        } else {
            self.reservations_rejected.inc();
        }
    }

    pub fn record_blocked_request(&self) {
        self.reservations_blocked.inc();
    }

    pub fn update_available_seats(&self, count: i64) {
        self.available_seats.set(count as f64);
    }

    pub fn update_gate(&self, open: bool) {
        self.gate_open.set(if open { 1.0 } else { 0.0 });
    }
}
