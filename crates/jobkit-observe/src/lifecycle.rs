//! Log view of the job lifecycle.
//!
//! The runner and the lock managers describe what happens to a run with a [`Lifecycle`] record;
//! [`log_event`] decides the level and the structured fields of the resulting log line.
//! Routine steps are logged at `debug`/`info`, lock contention at `warn` and failures at `error`.

use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleKind {
    // lock
    LockRequested,
    LockAcquired,
    LockContended,
    LockFailed,
    LockReleased,

    // runner
    Initialized,
    StateChanged,
    SetupFailed,
    JobSucceeded,
    JobFailed,
    JobErrorsReported,
    Terminating,
}

/// One lifecycle record, borrowed from the caller for the duration of the log call.
#[derive(Debug, Clone, Copy)]
pub struct Lifecycle<'a> {
    pub kind: LifecycleKind,
    pub job: &'a str,
    pub run_id: &'a str,
    pub reason: Option<&'a str>,
    pub started_at: Option<&'a str>,
    pub host: Option<&'a str>,
    pub state: Option<&'static str>,
}

impl<'a> Lifecycle<'a> {
    pub fn new(kind: LifecycleKind, job: &'a str, run_id: &'a str) -> Self {
        Self {
            kind,
            job,
            run_id,
            reason: None,
            started_at: None,
            host: None,
            state: None,
        }
    }

    pub fn with_reason(mut self, reason: &'a str) -> Self {
        self.reason = Some(reason);
        self
    }

    pub fn with_start(mut self, started_at: &'a str, host: &'a str) -> Self {
        self.started_at = Some(started_at);
        self.host = Some(host);
        self
    }

    pub fn with_state(mut self, state: &'static str) -> Self {
        self.state = Some(state);
        self
    }

    #[inline]
    fn as_reason(&self) -> &str {
        self.reason.unwrap_or("unknown")
    }
    #[inline]
    fn as_started_at(&self) -> &str {
        self.started_at.unwrap_or("unknown")
    }
    #[inline]
    fn as_host(&self) -> &str {
        self.host.unwrap_or("unknown")
    }
    #[inline]
    fn as_state(&self) -> &str {
        self.state.unwrap_or("unknown")
    }
}

#[inline]
pub fn message_for(kind: LifecycleKind) -> &'static str {
    match kind {
        // lock
        LifecycleKind::LockRequested => "trying to acquire lock",
        LifecycleKind::LockAcquired => "lock acquired",
        LifecycleKind::LockContended => "lock could not be acquired; another instance is running",
        LifecycleKind::LockFailed => "lock acquisition failed",
        LifecycleKind::LockReleased => "lock released",

        // runner
        LifecycleKind::Initialized => "++++ initialized job ++++",
        LifecycleKind::StateChanged => "run state changed",
        LifecycleKind::SetupFailed => "job setup failed",
        LifecycleKind::JobSucceeded => "job finished successfully",
        LifecycleKind::JobFailed => "job failed",
        LifecycleKind::JobErrorsReported => "job reported errors",
        LifecycleKind::Terminating => "++++ terminating job ++++",
    }
}

pub fn log_event(e: &Lifecycle<'_>) {
    let msg = message_for(e.kind);

    match e.kind {
        // lock
        LifecycleKind::LockRequested => debug!(job = e.job, run_id = e.run_id, "{msg}"),
        LifecycleKind::LockAcquired => info!(job = e.job, run_id = e.run_id, "{msg}"),
        LifecycleKind::LockContended => warn!(job = e.job, run_id = e.run_id, "{msg}"),
        LifecycleKind::LockFailed => {
            error!(job = e.job, run_id = e.run_id, reason = e.as_reason(), "{msg}")
        }
        LifecycleKind::LockReleased => debug!(job = e.job, run_id = e.run_id, "{msg}"),

        // runner
        LifecycleKind::Initialized => info!(
            job = e.job,
            run_id = e.run_id,
            started_at = e.as_started_at(),
            host = e.as_host(),
            "{msg}"
        ),
        LifecycleKind::StateChanged => {
            trace!(job = e.job, run_id = e.run_id, state = e.as_state(), "{msg}")
        }
        LifecycleKind::SetupFailed => {
            error!(job = e.job, run_id = e.run_id, reason = e.as_reason(), "{msg}")
        }
        LifecycleKind::JobSucceeded => info!(job = e.job, run_id = e.run_id, "{msg}"),
        LifecycleKind::JobFailed => {
            error!(job = e.job, run_id = e.run_id, reason = e.as_reason(), "{msg}")
        }
        LifecycleKind::JobErrorsReported => {
            error!(job = e.job, run_id = e.run_id, errors = e.as_reason(), "{msg}")
        }
        LifecycleKind::Terminating => info!(job = e.job, run_id = e.run_id, "{msg}"),
    }
}
