//! Single-instance job runner.
//!
//! A [`Runner`] drives one [`Job`] through its lifecycle per process: it takes the host-local
//! execution lock of the job identity, runs `setup` and `run`, always releases the lock and
//! reports every step through the lifecycle log.

pub mod error;
pub use error::{JobError, RunnerError};

pub mod lock;
pub use lock::{
    AcquireMode, FileLockManager, LockError, LockGuard, LockManager, LockToken, MemoryLockManager,
};

pub mod job;
pub use job::{Job, JobContext};

pub mod runner;
pub use runner::{Runner, RunnerBuilder};

pub mod prelude {
    pub use crate::{Job, JobContext, JobError, Runner, RunnerError};
    pub use jobkit_model::{ErrorInfo, ExitStatus, IntervalMicros, JobIdentity, KillAfterSecs};
}
