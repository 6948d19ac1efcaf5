mod topic;
pub use topic::{COMMAND_MARKER, SENSOR_PREFIX, Topic};

mod filter;
pub use filter::TopicFilter;

mod qos;
pub use qos::QoS;

/// A single publish/subscribe message.
///
/// Outbound messages are built fresh for every publish call and start with `retain = false` and
/// [`QoS::AtMostOnce`]; the delivery policy of the communications layer may raise both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: Topic,
    pub payload: Vec<u8>,
    pub retain: bool,
    pub qos: QoS,
}

impl Message {
    pub fn new(topic: Topic, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic,
            payload: payload.into(),
            retain: false,
            qos: QoS::default(),
        }
    }

    /// Payload interpreted as UTF-8, replacing invalid sequences.
    pub fn payload_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}
