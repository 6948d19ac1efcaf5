use jobkit_model::{COMMAND_MARKER, Message, QoS, SENSOR_PREFIX};

/// Topic-name driven delivery rules ("house rules") for outbound messages.
///
/// Rules are evaluated in order and are independent of each other:
/// 1. topics starting with the sensor prefix are retained (last known value for new subscribers);
/// 2. topics containing the command marker are retained and sent with the highest QoS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryPolicy {
    pub sensor_prefix: String,
    pub command_marker: String,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            sensor_prefix: SENSOR_PREFIX.to_string(),
            command_marker: COMMAND_MARKER.to_string(),
        }
    }
}

impl DeliveryPolicy {
    /// Raise `retain` / `qos` of `message` according to its topic.
    pub fn apply(&self, message: &mut Message) {
        let topic = message.topic.as_str();

        if topic.starts_with(&self.sensor_prefix) {
            message.retain = true;
        }

        if topic.contains(&self.command_marker) {
            message.qos = QoS::HIGHEST;
            message.retain = true;
        }
    }
}
