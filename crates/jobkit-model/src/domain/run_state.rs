use serde::{Deserialize, Serialize};

/// Lifecycle state of a single job run.
///
/// ```text
/// Created -> LockPending -> LockFailed
/// Created -> LockPending -> Initialized -> SettingUp -> Running -> Finishing -> Finished
/// ```
///
/// A failing `setup` skips `Running` and goes straight to `Finishing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunState {
    /// Runner constructed, nothing attempted yet.
    Created,
    /// Execution lock is being acquired.
    LockPending,
    /// Lock could not be acquired; another instance is running.
    LockFailed,
    /// Lock held, run handle logged.
    Initialized,
    /// Job setup in progress.
    SettingUp,
    /// Job body in progress.
    Running,
    /// Releasing the lock.
    Finishing,
    /// Run complete, lock released.
    Finished,
}

impl RunState {
    /// Returns `true` if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::LockFailed | RunState::Finished)
    }

    /// Returns `true` if `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Created, LockPending)
                | (LockPending, LockFailed)
                | (LockPending, Initialized)
                | (Initialized, SettingUp)
                | (SettingUp, Running)
                | (SettingUp, Finishing)
                | (Running, Finishing)
                | (Finishing, Finished)
        )
    }

    /// Short label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Created => "created",
            RunState::LockPending => "lock_pending",
            RunState::LockFailed => "lock_failed",
            RunState::Initialized => "initialized",
            RunState::SettingUp => "setting_up",
            RunState::Running => "running",
            RunState::Finishing => "finishing",
            RunState::Finished => "finished",
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        RunState::Created
    }
}
