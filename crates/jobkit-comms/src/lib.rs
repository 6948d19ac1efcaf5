//! Publish/subscribe communications for jobs.
//!
//! [`Communications`] wraps a [`Transport`] connection, applies the topic based
//! [`DeliveryPolicy`] to every outbound message and exposes publish and subscribe operations.
//! Facades are created by name through [`CommsFactory`]; MQTT is the only supported kind.

mod error;
pub use error::{CommsError, ConfigError, TransportError};

mod config;
pub use config::{CommsConfig, Credentials};

mod policy;
pub use policy::DeliveryPolicy;

mod client_id;
pub use client_id::ClientId;

mod transport;
pub use transport::{ConnectParams, Connection, Transport};

mod facade;
pub use facade::{Communications, Subscription};

mod factory;
pub use factory::{CommsFactory, CommsKind};

#[cfg(feature = "mqtt")]
pub mod mqtt;
#[cfg(feature = "mqtt")]
pub use mqtt::MqttTransport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub mod prelude {
    pub use crate::{
        CommsConfig, CommsError, CommsFactory, Communications, ConfigError, DeliveryPolicy,
        TransportError,
    };
    pub use jobkit_model::{Message, QoS, Topic, TopicFilter};
}
