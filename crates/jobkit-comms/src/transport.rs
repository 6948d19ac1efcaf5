use std::time::Duration;

use async_trait::async_trait;
use jobkit_model::{Message, QoS, TopicFilter};

use crate::{ClientId, Credentials, TransportError};

/// Everything a transport needs to open one broker connection.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    pub client_id: ClientId,
    pub host: String,
    pub port: u16,
    pub credentials: Option<Credentials>,
    pub keep_alive: Duration,
    pub capacity: usize,
}

/// Factory of broker connections.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short transport name for logs.
    fn name(&self) -> &'static str;

    /// Open a connection; returns once the broker accepted the session.
    async fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Connection>, TransportError>;
}

/// One established broker session.
///
/// Operations are issued one at a time; each returns only after the broker side of the
/// exchange completed (or failed).
#[async_trait]
pub trait Connection: Send {
    /// Send `message` with its retain flag and QoS exactly as given.
    async fn publish(&mut self, message: &Message) -> Result<(), TransportError>;

    /// Register `filter`; returns after the broker acknowledged the subscription.
    async fn subscribe(&mut self, filter: &TopicFilter, qos: QoS) -> Result<(), TransportError>;

    /// Wait for the next inbound message.
    ///
    /// Errors mean the connection is gone; no further messages will arrive.
    async fn recv(&mut self) -> Result<Message, TransportError>;
}
