use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Namespace of last-value sensor data topics.
pub const SENSOR_PREFIX: &str = "sensors/";

/// Marker identifying command topics, matched anywhere in the name.
pub const COMMAND_MARKER: &str = "commands";

/// Name of a publish destination.
///
/// Topic names are non-empty and never contain the subscription wildcards `+` and `#`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

impl Topic {
    pub fn new(name: impl Into<String>) -> Result<Self, ModelError> {
        let name = name.into();
        let reason = if name.is_empty() {
            Some("topic must not be empty")
        } else if name.contains(['+', '#']) {
            Some("wildcards are not allowed in topic names")
        } else if name.contains('\0') {
            Some("topic must not contain NUL")
        } else if name.len() > u16::MAX as usize {
            Some("topic is longer than 65535 bytes")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(ModelError::InvalidTopic {
                topic: name,
                reason,
            }),
            None => Ok(Self(name)),
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Topic {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Topic {
    type Error = ModelError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}
