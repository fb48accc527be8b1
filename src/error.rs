// Domain errors. Single-record faults (ValidationError) are isolated by callers;
// SequencingError aborts a whole aggregation run.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Raw scheduler state that cannot be turned into a deployment record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("job {job_id}: missing required field `{field}`")]
    MissingField { job_id: String, field: &'static str },
    #[error("job {job_id}: no primary task `{task}`")]
    MissingPrimaryTask { job_id: String, task: String },
    #[error("job {job_id}: allocation {alloc_id} has no resources for task `{task}`")]
    MissingAllocatedResources {
        job_id: String,
        alloc_id: String,
        task: String,
    },
    #[error("job {job_id}: unrecognized allocation status `{status}`")]
    UnrecognizedStatus { job_id: String, status: String },
}

/// Snapshots fed to an aggregation must be strictly increasing in time.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("snapshot {current} does not come after {previous}; snapshot sequence is out of order")]
pub struct SequencingError {
    pub previous: DateTime<Utc>,
    pub current: DateTime<Utc>,
}

/// Scheduler API failures.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("scheduler request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("scheduler returned {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
}

/// Failure to produce one deployment record; the caller skips that job.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Api(#[from] ApiError),
}
