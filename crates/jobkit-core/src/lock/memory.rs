use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use jobkit_model::{JobIdentity, RunId};

use super::{LockError, LockManager, LockToken};

type HeldTable = Mutex<HashMap<JobIdentity, RunId>>;

/// Locks held in process memory.
///
/// Only excludes runners sharing the same manager instance; use [`super::FileLockManager`]
/// to exclude other processes.
#[derive(Debug, Default)]
pub struct MemoryLockManager {
    held: Arc<HeldTable>,
}

impl MemoryLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self, identity: &JobIdentity) -> bool {
        self.held
            .lock()
            .map(|held| held.contains_key(identity))
            .unwrap_or(false)
    }
}

impl LockManager for MemoryLockManager {
    fn acquire(&self, identity: &JobIdentity, run_id: &RunId) -> Result<LockToken, LockError> {
        let mut held = self.held.lock().unwrap_or_else(|p| p.into_inner());
        if held.contains_key(identity) {
            return Err(LockError::Contended {
                identity: identity.to_string(),
            });
        }
        held.insert(identity.clone(), *run_id);

        let slot = MemorySlot {
            table: Arc::downgrade(&self.held),
            identity: identity.clone(),
            run_id: *run_id,
        };
        Ok(LockToken::with_slot(identity.clone(), *run_id, slot))
    }

    fn release(&self, token: &mut LockToken) {
        if !token.mark_released() {
            return;
        }
        // Tokens minted elsewhere carry no slot and free nothing here.
        drop(token.take_slot());
    }
}

/// Entry of one holder in a [`MemoryLockManager`] table, removed when dropped.
#[derive(Debug)]
pub(crate) struct MemorySlot {
    table: Weak<HeldTable>,
    identity: JobIdentity,
    run_id: RunId,
}

impl Drop for MemorySlot {
    fn drop(&mut self) {
        let Some(table) = self.table.upgrade() else {
            return;
        };
        let mut held = table.lock().unwrap_or_else(|p| p.into_inner());
        if held.get(&self.identity) == Some(&self.run_id) {
            held.remove(&self.identity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> JobIdentity {
        JobIdentity::new(name).unwrap()
    }

    #[test]
    fn second_acquire_fails_immediately() {
        let locks = MemoryLockManager::new();
        let _held = locks.acquire(&id("a"), &RunId::new()).unwrap();
        let err = locks.acquire(&id("a"), &RunId::new()).unwrap_err();
        assert!(err.is_contended());
    }

    #[test]
    fn identities_are_independent() {
        let locks = MemoryLockManager::new();
        let _a = locks.acquire(&id("a"), &RunId::new()).unwrap();
        assert!(locks.acquire(&id("b"), &RunId::new()).is_ok());
    }

    #[test]
    fn release_is_idempotent() {
        let locks = MemoryLockManager::new();
        let mut token = locks.acquire(&id("a"), &RunId::new()).unwrap();
        locks.release(&mut token);
        locks.release(&mut token);
        assert!(!locks.is_locked(&id("a")));

        // A stale token must not release a newer holder.
        let _newer = locks.acquire(&id("a"), &RunId::new()).unwrap();
        locks.release(&mut token);
        assert!(locks.is_locked(&id("a")));
    }

    #[test]
    fn foreign_token_does_not_free_the_holder() {
        let locks = MemoryLockManager::new();
        let _held = locks.acquire(&id("a"), &RunId::new()).unwrap();

        let mut forged = LockToken::new(id("a"), RunId::new());
        locks.release(&mut forged);
        assert!(locks.is_locked(&id("a")));
        assert!(locks.acquire(&id("a"), &RunId::new()).unwrap_err().is_contended());
    }

    #[test]
    fn token_from_another_manager_does_not_free_the_holder() {
        let locks = MemoryLockManager::new();
        let other = MemoryLockManager::new();
        let _held = locks.acquire(&id("a"), &RunId::new()).unwrap();

        let mut foreign = other.acquire(&id("a"), &RunId::new()).unwrap();
        locks.release(&mut foreign);
        assert!(locks.is_locked(&id("a")));
    }

    #[test]
    fn dropped_token_frees_the_lock() {
        let locks = MemoryLockManager::new();
        drop(locks.acquire(&id("b"), &RunId::new()).unwrap());

        assert!(!locks.is_locked(&id("b")));
        assert!(locks.acquire(&id("b"), &RunId::new()).is_ok());
    }

    #[test]
    fn token_outliving_its_manager_is_harmless() {
        let locks = MemoryLockManager::new();
        let mut token = locks.acquire(&id("a"), &RunId::new()).unwrap();
        drop(locks);
        assert!(token.is_held());
        drop(token.take_slot());
    }
}
