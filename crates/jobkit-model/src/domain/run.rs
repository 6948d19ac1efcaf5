use std::fmt;

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

/// Random identifier of a single process invocation.
///
/// Every log line of one execution carries it, so runs of the same job can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Per-invocation bookkeeping of the runner.
#[derive(Debug, Clone)]
pub struct RunHandle {
    /// Unique id of this run.
    pub run_id: RunId,
    /// When the runner started driving the job (UTC).
    pub started_at: OffsetDateTime,
    /// Host the job runs on.
    pub host: String,
    /// Whether the execution lock has been acquired for this run.
    pub lock_acquired: bool,
}

impl RunHandle {
    pub fn new() -> Self {
        Self {
            run_id: RunId::new(),
            started_at: OffsetDateTime::now_utc(),
            host: hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown-host".to_string()),
            lock_acquired: false,
        }
    }

    /// Start timestamp formatted as RFC 3339.
    pub fn started_at_rfc3339(&self) -> String {
        self.started_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.started_at.unix_timestamp().to_string())
    }
}

impl Default for RunHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_unique() {
        let a = RunHandle::new();
        let b = RunHandle::new();
        assert_ne!(a.run_id, b.run_id);
        assert!(!a.lock_acquired);
    }

    #[test]
    fn started_at_is_rfc3339() {
        let handle = RunHandle::new();
        let ts = handle.started_at_rfc3339();
        assert!(ts.contains('T'));
        assert!(ts.ends_with('Z'));
    }

    #[test]
    fn run_id_serializes_as_plain_uuid() {
        let id = RunId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }
}
