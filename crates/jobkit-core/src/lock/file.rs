use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use jobkit_model::{JobIdentity, RunId};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{LockError, LockManager, LockToken};

const MAX_STEM_LEN: usize = 64;

/// How [`FileLockManager::acquire`] treats a lock that is already held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquireMode {
    /// Fail with [`LockError::Contended`] right away.
    #[default]
    NonBlocking,
    /// Block until the current holder lets go.
    Wait,
}

/// Advisory `flock(2)` locks on files in a shared directory.
///
/// The kernel drops the lock when the holding process dies, so a crashed run never leaves a
/// stale lock behind. Every process that agrees on the directory sees the same locks.
#[derive(Debug, Clone)]
pub struct FileLockManager {
    dir: PathBuf,
    mode: AcquireMode,
}

impl Default for FileLockManager {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl FileLockManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            mode: AcquireMode::NonBlocking,
        }
    }

    pub fn with_mode(mut self, mode: AcquireMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lock file of `identity`: a readable stem plus a hash so distinct identities never collide
    /// after sanitizing.
    pub fn lock_path(&self, identity: &JobIdentity) -> PathBuf {
        let stem: String = identity
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .take(MAX_STEM_LEN)
            .collect();
        let digest = Uuid::new_v5(&Uuid::NAMESPACE_OID, identity.as_str().as_bytes())
            .simple()
            .to_string();
        self.dir.join(format!("{stem}.{}.lock", &digest[..12]))
    }

    fn open(&self, path: &Path) -> Result<File, LockError> {
        let io_err = |source| LockError::Io {
            path: path.to_path_buf(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(io_err)?;
        OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(io_err)
    }
}

impl LockManager for FileLockManager {
    fn acquire(&self, identity: &JobIdentity, run_id: &RunId) -> Result<LockToken, LockError> {
        let path = self.lock_path(identity);
        let mut file = self.open(&path)?;

        let locked = match self.mode {
            AcquireMode::NonBlocking => try_flock_exclusive(&file),
            AcquireMode::Wait => flock_exclusive(&file).map(|()| true),
        }
        .map_err(|source| LockError::Io {
            path: path.clone(),
            source,
        })?;

        if !locked {
            return Err(LockError::Contended {
                identity: identity.to_string(),
            });
        }

        // Owner pid is informational only; the flock is what excludes.
        if let Err(e) = write_owner(&mut file) {
            warn!(path = %path.display(), error = %e, "failed to record lock owner");
        }
        debug!(path = %path.display(), "lock file held");
        Ok(LockToken::with_file(identity.clone(), *run_id, file))
    }

    fn release(&self, token: &mut LockToken) {
        if !token.mark_released() {
            return;
        }
        if let Some(file) = token.take_file() {
            if let Err(e) = unlock(&file) {
                // Closing the descriptor below drops the lock anyway.
                warn!(job = %token.identity(), error = %e, "explicit unlock failed");
            }
            drop(file);
        }
    }
}

fn write_owner(file: &mut File) -> io::Result<()> {
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    file.flush()
}

fn try_flock_exclusive(file: &File) -> io::Result<bool> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: fd is a valid descriptor owned by `file` for the duration of the call.
        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if result == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK)
        {
            return Ok(false);
        }
        Err(err)
    }
    #[cfg(not(unix))]
    {
        let _ = file;
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "file locks require a unix host",
        ))
    }
}

fn flock_exclusive(file: &File) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        loop {
            // SAFETY: see `try_flock_exclusive`.
            let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
            if result == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = file;
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "file locks require a unix host",
        ))
    }
}

fn unlock(file: &File) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: see `try_flock_exclusive`.
        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
    #[cfg(not(unix))]
    {
        let _ = file;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    fn id(name: &str) -> JobIdentity {
        JobIdentity::new(name).unwrap()
    }

    #[test]
    fn second_holder_is_contended() {
        let dir = tempfile::tempdir().unwrap();
        let locks = FileLockManager::new(dir.path());

        let _held = locks.acquire(&id("jobs::Backup"), &RunId::new()).unwrap();
        let err = locks
            .acquire(&id("jobs::Backup"), &RunId::new())
            .unwrap_err();
        assert!(err.is_contended());
    }

    #[test]
    fn release_frees_the_lock() {
        let dir = tempfile::tempdir().unwrap();
        let locks = FileLockManager::new(dir.path());

        let mut token = locks.acquire(&id("jobs::Backup"), &RunId::new()).unwrap();
        locks.release(&mut token);
        locks.release(&mut token);
        assert!(!token.is_held());

        let again = locks.acquire(&id("jobs::Backup"), &RunId::new());
        assert!(again.is_ok());
    }

    #[test]
    fn dropped_token_frees_the_lock() {
        let dir = tempfile::tempdir().unwrap();
        let locks = FileLockManager::new(dir.path());

        drop(locks.acquire(&id("jobs::Backup"), &RunId::new()).unwrap());
        assert!(locks.acquire(&id("jobs::Backup"), &RunId::new()).is_ok());
    }

    #[test]
    fn lock_file_records_owner() {
        let dir = tempfile::tempdir().unwrap();
        let locks = FileLockManager::new(dir.path());
        let identity = id("jobs::Backup");

        let _held = locks.acquire(&identity, &RunId::new()).unwrap();
        let owner = fs::read_to_string(locks.lock_path(&identity)).unwrap();
        assert_eq!(owner.trim(), std::process::id().to_string());
    }

    #[test]
    fn lock_paths_stay_distinct_after_sanitizing() {
        let locks = FileLockManager::new("/tmp/locks");
        let a = locks.lock_path(&id("jobs::Backup"));
        let b = locks.lock_path(&id("jobs__Backup"));

        assert_ne!(a, b);
        assert!(a.starts_with("/tmp/locks"));
        let name = a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("jobs__Backup."));
        assert!(name.ends_with(".lock"));
    }

    #[test]
    fn long_identities_are_truncated() {
        let locks = FileLockManager::new("/tmp/locks");
        let path = locks.lock_path(&id(&"x".repeat(500)));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.len() <= MAX_STEM_LEN + ".".len() + 12 + ".lock".len());
    }

    #[test]
    fn wait_mode_blocks_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let locks = FileLockManager::new(dir.path()).with_mode(AcquireMode::Wait);
        let mut first = locks.acquire(&id("jobs::Backup"), &RunId::new()).unwrap();

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let locks = locks.clone();
            thread::spawn(move || {
                let token = locks.acquire(&id("jobs::Backup"), &RunId::new());
                tx.send(token.is_ok()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        locks.release(&mut first);
        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
        waiter.join().unwrap();
    }
}
