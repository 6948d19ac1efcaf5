//! Host-local execution locks keyed by job identity.
//!
//! At most one [`LockToken`] per identity is held at a time. [`LockGuard`] ties a token to a
//! scope: the lock is released exactly once when the guard goes away, on every exit path.

mod file;
pub use file::{AcquireMode, FileLockManager};

mod memory;
pub use memory::MemoryLockManager;
use memory::MemorySlot;

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use jobkit_model::{JobIdentity, RunId};
use jobkit_observe::{Lifecycle, LifecycleKind, log_event};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LockError {
    #[error("job '{identity}' is already running")]
    Contended { identity: String },

    #[error("lock file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LockError {
    pub fn is_contended(&self) -> bool {
        matches!(self, LockError::Contended { .. })
    }
}

/// Proof of ownership of an identity's execution slot.
///
/// Only lock managers mint tokens. Dropping a token frees the slot it holds, so a token that is
/// never released still does not outlive its lock.
#[derive(Debug)]
pub struct LockToken {
    identity: JobIdentity,
    run_id: RunId,
    file: Option<File>,
    slot: Option<MemorySlot>,
    held: bool,
}

impl LockToken {
    pub(crate) fn new(identity: JobIdentity, run_id: RunId) -> Self {
        Self {
            identity,
            run_id,
            file: None,
            slot: None,
            held: true,
        }
    }

    pub(crate) fn with_file(identity: JobIdentity, run_id: RunId, file: File) -> Self {
        Self {
            file: Some(file),
            ..Self::new(identity, run_id)
        }
    }

    pub(crate) fn with_slot(identity: JobIdentity, run_id: RunId, slot: MemorySlot) -> Self {
        Self {
            slot: Some(slot),
            ..Self::new(identity, run_id)
        }
    }

    pub fn identity(&self) -> &JobIdentity {
        &self.identity
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Flip the token to released. Returns `false` if it was already released.
    pub fn mark_released(&mut self) -> bool {
        std::mem::replace(&mut self.held, false)
    }

    pub(crate) fn take_file(&mut self) -> Option<File> {
        self.file.take()
    }

    pub(crate) fn take_slot(&mut self) -> Option<MemorySlot> {
        self.slot.take()
    }
}

/// Acquires and releases execution locks.
pub trait LockManager: Send + Sync {
    /// Take the lock of `identity`.
    ///
    /// Fails with [`LockError::Contended`] when another live holder owns it.
    fn acquire(&self, identity: &JobIdentity, run_id: &RunId) -> Result<LockToken, LockError>;

    /// Give the lock back. Releasing an already released token is a no-op.
    fn release(&self, token: &mut LockToken);
}

/// Scoped lock ownership: releases the token through its manager when dropped.
pub struct LockGuard {
    manager: Arc<dyn LockManager>,
    token: LockToken,
    job: String,
    run_id: String,
}

impl LockGuard {
    /// Acquire the lock of `identity` and report the outcome to the lifecycle log.
    pub fn acquire(
        manager: Arc<dyn LockManager>,
        identity: &JobIdentity,
        run_id: &RunId,
    ) -> Result<Self, LockError> {
        let job = identity.to_string();
        let run = run_id.to_string();

        log_event(&Lifecycle::new(LifecycleKind::LockRequested, &job, &run));
        match manager.acquire(identity, run_id) {
            Ok(token) => {
                log_event(&Lifecycle::new(LifecycleKind::LockAcquired, &job, &run));
                Ok(Self {
                    manager,
                    token,
                    job,
                    run_id: run,
                })
            }
            Err(e) if e.is_contended() => {
                log_event(&Lifecycle::new(LifecycleKind::LockContended, &job, &run));
                Err(e)
            }
            Err(e) => {
                let reason = e.to_string();
                log_event(
                    &Lifecycle::new(LifecycleKind::LockFailed, &job, &run).with_reason(&reason),
                );
                Err(e)
            }
        }
    }

    pub fn token(&self) -> &LockToken {
        &self.token
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.manager.release(&mut self.token);
        log_event(&Lifecycle::new(
            LifecycleKind::LockReleased,
            &self.job,
            &self.run_id,
        ));
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("job", &self.job)
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_releases_on_drop() {
        let manager = Arc::new(MemoryLockManager::new());
        let identity = JobIdentity::new("guarded").unwrap();
        let run = RunId::new();

        {
            let guard = LockGuard::acquire(manager.clone(), &identity, &run).unwrap();
            assert!(guard.token().is_held());
            assert!(manager.is_locked(&identity));
        }
        assert!(!manager.is_locked(&identity));
    }

    #[test]
    fn contended_guard_is_an_error() {
        let manager = Arc::new(MemoryLockManager::new());
        let identity = JobIdentity::new("guarded").unwrap();

        let _first = LockGuard::acquire(manager.clone(), &identity, &RunId::new()).unwrap();
        let second = LockGuard::acquire(manager.clone(), &identity, &RunId::new());
        assert!(matches!(second, Err(LockError::Contended { .. })));
    }

    #[test]
    fn mark_released_is_one_shot() {
        let mut token = LockToken::new(JobIdentity::new("x").unwrap(), RunId::new());
        assert!(token.mark_released());
        assert!(!token.mark_released());
        assert!(!token.is_held());
    }
}
