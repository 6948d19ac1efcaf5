use jobkit_model::ModelError;
use thiserror::Error;

/// Invalid or missing communications configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("a broker host (MQTT_HOST) must be provided")]
    MissingHost,
    #[error("invalid broker port: {0}")]
    InvalidPort(String),
    #[error("credentials need both a username and a password")]
    IncompleteCredentials,
    #[error("invalid keep alive: {0} (expected at least 5 seconds)")]
    InvalidKeepAlive(String),
}

/// Failure reported by the publish/subscribe transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection to broker failed: {0}")]
    Connect(String),
    #[error("broker refused connection: {0}")]
    Refused(String),
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("subscribe failed: {0}")]
    Subscribe(String),
    #[error("disconnected from broker: {0}")]
    Disconnected(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("subscription already ended")]
    SubscriptionClosed,
}

#[derive(Error, Debug)]
pub enum CommsError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("invalid topic: {0}")]
    InvalidTopic(#[from] ModelError),

    #[error("invalid communications type passed to factory (provided: \"{0}\")")]
    UnknownKind(String),
}
