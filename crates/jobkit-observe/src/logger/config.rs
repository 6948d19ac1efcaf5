use std::io::IsTerminal;

use crate::logger::{error::LoggerError, format::LoggerFormat};

/// Environment variable selecting the output format (`text|json|journald`).
pub const ENV_LOG_FORMAT: &str = "JOBKIT_LOG_FORMAT";
/// Environment variable holding an `EnvFilter` directive (e.g. `info,jobkit_comms=debug`).
pub const ENV_LOG_LEVEL: &str = "JOBKIT_LOG_LEVEL";

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        let use_color = cfg!(test) || std::io::stdout().is_terminal();
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color,
        }
    }
}

impl LoggerConfig {
    /// Defaults overridden by `JOBKIT_LOG_FORMAT` / `JOBKIT_LOG_LEVEL`.
    pub fn from_env() -> Result<Self, LoggerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`LoggerConfig::from_env`] with a custom key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LoggerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            cfg.format = format.parse()?;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|l| !l.trim().is_empty()) {
            cfg.level = level;
        }
        if cfg.format != LoggerFormat::Text {
            cfg.use_color = false;
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env() {
        let cfg = LoggerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg.format, LoggerFormat::Text);
        assert_eq!(cfg.level, "info");
    }

    #[test]
    fn env_overrides() {
        let cfg = LoggerConfig::from_lookup(|key| match key {
            ENV_LOG_FORMAT => Some("JSON".into()),
            ENV_LOG_LEVEL => Some("debug,rumqttc=warn".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg.format, LoggerFormat::Json);
        assert_eq!(cfg.level, "debug,rumqttc=warn");
        assert!(!cfg.use_color);
    }

    #[test]
    fn invalid_format_is_reported() {
        let err = LoggerConfig::from_lookup(|key| (key == ENV_LOG_FORMAT).then(|| "xml".into()))
            .unwrap_err();
        assert!(matches!(err, LoggerError::InvalidFormat(f) if f == "xml"));
    }
}
