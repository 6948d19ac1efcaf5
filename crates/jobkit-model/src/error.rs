use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("job identity must not be empty")]
    EmptyIdentity,
    #[error("invalid topic name '{topic}': {reason}")]
    InvalidTopic { topic: String, reason: &'static str },
    #[error("invalid topic filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: &'static str },
    #[error("invalid QoS level: {0} (expected 0, 1 or 2)")]
    InvalidQos(u8),
}
