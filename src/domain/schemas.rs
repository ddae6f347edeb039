use super::job::JobId;

// Job type definitions
pub struct JobTypes;

impl JobTypes {
    pub const RESERVE_SEAT: &'static str = "reserve_seat";
}

// Single-value keys
pub struct Keys;

impl Keys {
    pub const AVAILABLE_SEATS: &'static str = "available_seats";
    pub const NEXT_JOB_ID: &'static str = "next_job_id";
}

// State store definitions
pub struct Stores;

impl Stores {
    pub const SEATS: &'static str = "seats";
    pub const JOBS: &'static str = "jobs";
    pub const JOB_SEQUENCE: &'static str = "job_sequence";
}

/// Storage key for a job record. Zero padded so that key order is id order.
pub fn job_key(id: JobId) -> String {
    format!("job:{:020}", id.value())
}
