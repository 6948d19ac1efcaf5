use std::process::ExitCode;

/// Process exit status produced by a job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Job completed (exit code `0`).
    Success,
    /// Another instance holds the execution lock (exit code `1`, reserved).
    LockContention,
    /// Job reported a failure or raised a fault during `run` (exit code `2`).
    JobFailed,
}

impl ExitStatus {
    pub fn code(&self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::LockContention => 1,
            ExitStatus::JobFailed => 2,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}
