use jobkit_comms::CommsError;
use thiserror::Error;

use crate::lock::LockError;

/// Failure raised by a job from `setup` or `run`.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("{0}")]
    Failed(String),

    #[error("communications: {0}")]
    Comms(#[from] CommsError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl JobError {
    pub fn failed(reason: impl Into<String>) -> Self {
        JobError::Failed(reason.into())
    }
}

/// Errors that end a run without an [`ExitStatus`](jobkit_model::ExitStatus).
///
/// Lock contention is not an error: it yields `ExitStatus::LockContention`.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("lock: {0}")]
    Lock(#[from] LockError),

    #[error("job setup failed: {0}")]
    Setup(#[source] JobError),

    #[error("runner already drove a job in this process")]
    AlreadyRan,
}
