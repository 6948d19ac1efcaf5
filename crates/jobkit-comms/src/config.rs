use std::fmt;
use std::time::Duration;

use jobkit_model::QoS;

use crate::{error::ConfigError, policy::DeliveryPolicy};

pub const ENV_HOST: &str = "MQTT_HOST";
pub const ENV_PORT: &str = "MQTT_PORT";
pub const ENV_USERNAME: &str = "MQTT_USERNAME";
pub const ENV_PASSWORD: &str = "MQTT_PASSWORD";
pub const ENV_KEEP_ALIVE: &str = "MQTT_KEEP_ALIVE_SECS";

const MIN_KEEP_ALIVE_SECS: u64 = 5;

/// Username/password pair presented to the broker.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Broker connection settings injected into a communications facade.
#[derive(Debug, Clone)]
pub struct CommsConfig {
    /// Broker host name or address. Required.
    pub host: Option<String>,
    /// Broker port (default: 1883).
    pub port: u16,
    /// Optional credential pair.
    pub credentials: Option<Credentials>,
    /// Keep alive interval in seconds (default: 30).
    pub keep_alive_secs: u64,
    /// Capacity of the outgoing request queue of the client (default: 16).
    pub capacity: usize,
    /// QoS requested for subscriptions (default: 0).
    pub subscribe_qos: QoS,
    /// Topic based retain/QoS rules.
    pub policy: DeliveryPolicy,
}

impl Default for CommsConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 1883,
            credentials: None,
            keep_alive_secs: 30,
            capacity: 16,
            subscribe_qos: QoS::AtMostOnce,
            policy: DeliveryPolicy::default(),
        }
    }
}

impl CommsConfig {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Settings from `MQTT_HOST`, `MQTT_PORT`, `MQTT_USERNAME`, `MQTT_PASSWORD` and
    /// `MQTT_KEEP_ALIVE_SECS`.
    ///
    /// A missing host is not an error here; it is reported by
    /// [`CommsConfig::check_prerequisites`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`CommsConfig::from_env`] with a custom key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self {
            host: lookup(ENV_HOST).filter(|h| !h.trim().is_empty()),
            ..Self::default()
        };

        if let Some(port) = lookup(ENV_PORT) {
            cfg.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port.clone()))?;
        }
        if let Some(keep_alive) = lookup(ENV_KEEP_ALIVE) {
            cfg.keep_alive_secs = keep_alive
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidKeepAlive(keep_alive.clone()))?;
        }
        // Credentials are only used when both halves are present.
        if let (Some(user), Some(pass)) = (lookup(ENV_USERNAME), lookup(ENV_PASSWORD)) {
            cfg.credentials = Some(Credentials::new(user, pass));
        }
        Ok(cfg)
    }

    /// Validate the settings before any connection attempt.
    pub fn check_prerequisites(&self) -> Result<(), ConfigError> {
        match self.host.as_deref() {
            Some(host) if !host.trim().is_empty() => {}
            _ => return Err(ConfigError::MissingHost),
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort("0".to_string()));
        }
        if self.keep_alive_secs < MIN_KEEP_ALIVE_SECS {
            return Err(ConfigError::InvalidKeepAlive(
                self.keep_alive_secs.to_string(),
            ));
        }
        if let Some(creds) = &self.credentials
            && (creds.username.is_empty() || creds.password.is_empty())
        {
            return Err(ConfigError::IncompleteCredentials);
        }
        Ok(())
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn missing_host_fails_prerequisites() {
        let cfg = CommsConfig::from_lookup(env(&[])).unwrap();
        assert_eq!(cfg.check_prerequisites(), Err(ConfigError::MissingHost));

        let blank = CommsConfig::default().with_host("  ");
        assert_eq!(blank.check_prerequisites(), Err(ConfigError::MissingHost));
    }

    #[test]
    fn host_only_is_enough() {
        let cfg = CommsConfig::from_lookup(env(&[(ENV_HOST, "broker.local")])).unwrap();
        assert_eq!(cfg.host.as_deref(), Some("broker.local"));
        assert_eq!(cfg.port, 1883);
        assert!(cfg.credentials.is_none());
        assert!(cfg.check_prerequisites().is_ok());
    }

    #[test]
    fn credentials_need_both_halves() {
        let cfg = CommsConfig::from_lookup(env(&[
            (ENV_HOST, "broker.local"),
            (ENV_USERNAME, "pi"),
        ]))
        .unwrap();
        assert!(cfg.credentials.is_none());

        let cfg = CommsConfig::from_lookup(env(&[
            (ENV_HOST, "broker.local"),
            (ENV_USERNAME, "pi"),
            (ENV_PASSWORD, "raspberry"),
        ]))
        .unwrap();
        let creds = cfg.credentials.unwrap();
        assert_eq!(creds.username(), "pi");
        assert_eq!(creds.password(), "raspberry");
    }

    #[test]
    fn empty_credential_half_is_rejected() {
        let cfg = CommsConfig::default()
            .with_host("broker.local")
            .with_credentials(Credentials::new("pi", ""));
        assert_eq!(
            cfg.check_prerequisites(),
            Err(ConfigError::IncompleteCredentials)
        );
    }

    #[test]
    fn invalid_port_is_reported() {
        let err = CommsConfig::from_lookup(env(&[(ENV_PORT, "mqtt")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidPort("mqtt".into()));

        let cfg = CommsConfig::default().with_host("h").with_port(0);
        assert!(matches!(
            cfg.check_prerequisites(),
            Err(ConfigError::InvalidPort(_))
        ));
    }

    #[test]
    fn short_keep_alive_is_rejected() {
        let cfg = CommsConfig::from_lookup(env(&[(ENV_HOST, "h"), (ENV_KEEP_ALIVE, "1")])).unwrap();
        assert!(matches!(
            cfg.check_prerequisites(),
            Err(ConfigError::InvalidKeepAlive(_))
        ));
    }

    #[test]
    fn password_is_redacted_in_debug() {
        let creds = Credentials::new("pi", "raspberry");
        let dbg = format!("{creds:?}");
        assert!(dbg.contains("pi"));
        assert!(!dbg.contains("raspberry"));
    }
}
