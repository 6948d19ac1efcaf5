use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use jobkit_model::JobIdentity;
use uuid::Uuid;

/// Client identifier presented to the broker.
///
/// Built as `<job>-<unix seconds>-<random>` so concurrent instances and repeated runs of the same
/// job never collide on a broker session. Characters outside `[A-Za-z0-9_.-]` in the job part
/// are replaced by `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    /// Fresh id for one connection attempt of `identity`.
    pub fn generate(identity: &JobIdentity) -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let nonce = Uuid::new_v4().simple().to_string();

        Self(format!(
            "{}-{}-{}",
            sanitize(identity.as_str()),
            secs,
            &nonce[..8]
        ))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
