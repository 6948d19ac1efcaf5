use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use jobkit_model::JobIdentity;
use tracing::debug;

use crate::{CommsConfig, CommsError, Communications, Transport};

/// Communication channel kinds the factory knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsKind {
    Mqtt,
}

impl FromStr for CommsKind {
    type Err = CommsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mqtt" => Ok(CommsKind::Mqtt),
            _ => Err(CommsError::UnknownKind(s.to_string())),
        }
    }
}

/// Builds [`Communications`] facades by kind name.
///
/// Every facade gets its own connection; the factory only shares the configuration and the
/// transport used to open connections.
#[derive(Clone)]
pub struct CommsFactory {
    config: CommsConfig,
    transport: Arc<dyn Transport>,
}

impl CommsFactory {
    /// Factory backed by the MQTT transport.
    #[cfg(feature = "mqtt")]
    pub fn new(config: CommsConfig) -> Self {
        Self::with_transport(config, Arc::new(crate::MqttTransport::new()))
    }

    pub fn with_transport(config: CommsConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &CommsConfig {
        &self.config
    }

    /// Create a facade of `kind` (case-insensitive, only `"mqtt"` is supported) for `identity`.
    pub fn create(&self, kind: &str, identity: &JobIdentity) -> Result<Communications, CommsError> {
        match kind.parse::<CommsKind>()? {
            CommsKind::Mqtt => {
                debug!(job = %identity, transport = self.transport.name(), "creating communications");
                Communications::new(
                    self.config.clone(),
                    identity.clone(),
                    Arc::clone(&self.transport),
                )
            }
        }
    }
}

impl fmt::Debug for CommsFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommsFactory")
            .field("config", &self.config)
            .field("transport", &self.transport.name())
            .finish()
    }
}
