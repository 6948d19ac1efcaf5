use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Unique name of a job type.
///
/// Used as the key of the host-local execution lock and as the prefix of the transport client id.
/// By default it is the fully-qualified Rust type name of the job (see [`JobIdentity::of`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobIdentity(String);

impl JobIdentity {
    /// Create an identity from any non-empty string.
    pub fn new(value: impl Into<String>) -> Result<Self, ModelError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ModelError::EmptyIdentity);
        }
        Ok(Self(value))
    }

    /// Identity derived from a type name (e.g. `my_jobs::sensors::Thermometer`).
    pub fn of<T: ?Sized>() -> Self {
        Self(std::any::type_name::<T>().to_string())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment of the identity, without generic arguments.
    ///
    /// `my_jobs::sensors::Thermometer` becomes `Thermometer`.
    pub fn simple_name(&self) -> &str {
        let base = self.0.split('<').next().unwrap_or(&self.0);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl fmt::Display for JobIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for JobIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for JobIdentity {
    type Error = ModelError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
