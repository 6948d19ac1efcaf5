mod identity;
pub use identity::JobIdentity;

mod run;
pub use run::{RunHandle, RunId};

mod run_state;
pub use run_state::RunState;

mod exit_status;
pub use exit_status::ExitStatus;

mod error_info;
pub use error_info::ErrorInfo;

/// Advisory number of seconds after which an external supervisor should kill a job.
pub type KillAfterSecs = u64;

/// Advisory interval, in microseconds, between two scheduled runs of a job.
pub type IntervalMicros = u64;
