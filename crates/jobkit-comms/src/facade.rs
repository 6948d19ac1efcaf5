use std::ops::ControlFlow;
use std::sync::Arc;

use jobkit_model::{JobIdentity, Message, Topic, TopicFilter};
use tracing::{Instrument, debug, info, info_span, instrument, trace, warn};

use crate::{
    ClientId, CommsConfig, CommsError, ConfigError, Connection, ConnectParams, Transport,
    TransportError,
};

enum ConnectionState {
    Unconnected,
    Connected {
        client_id: ClientId,
        conn: Box<dyn Connection>,
    },
}

/// Policy layer over one broker connection.
///
/// The connection is opened lazily by the first publish/subscribe and reused for the lifetime
/// of the facade. It is owned exclusively by this facade and never shared.
pub struct Communications {
    identity: JobIdentity,
    config: CommsConfig,
    transport: Arc<dyn Transport>,
    state: ConnectionState,
}

impl Communications {
    /// Validate `config` and build an unconnected facade.
    ///
    /// Fails with [`ConfigError`] before any connection attempt when the broker host is missing.
    pub fn new(
        config: CommsConfig,
        identity: JobIdentity,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, CommsError> {
        let comms = Self {
            identity,
            config,
            transport,
            state: ConnectionState::Unconnected,
        };
        comms.check_prerequisites()?;
        Ok(comms)
    }

    /// Checks the injected configuration (broker host, credential pair).
    pub fn check_prerequisites(&self) -> Result<(), ConfigError> {
        self.config.check_prerequisites()
    }

    pub fn identity(&self) -> &JobIdentity {
        &self.identity
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected { .. })
    }

    /// Client id of the open connection, if any.
    pub fn client_id(&self) -> Option<&ClientId> {
        match &self.state {
            ConnectionState::Connected { client_id, .. } => Some(client_id),
            ConnectionState::Unconnected => None,
        }
    }

    async fn connect_if_needed(&mut self) -> Result<&mut dyn Connection, CommsError> {
        if let ConnectionState::Unconnected = self.state {
            let params = self.connect_params();
            let span = info_span!(
                "connect",
                transport = self.transport.name(),
                client_id = %params.client_id
            );
            let conn = async {
                debug!(host = %params.host, port = params.port, "connecting to broker");
                let conn = self.transport.connect(&params).await?;
                info!("connected to broker");
                Ok::<_, TransportError>(conn)
            }
            .instrument(span)
            .await?;

            self.state = ConnectionState::Connected {
                client_id: params.client_id,
                conn,
            };
        }

        match &mut self.state {
            ConnectionState::Connected { conn, .. } => Ok(conn.as_mut()),
            ConnectionState::Unconnected => {
                Err(TransportError::Disconnected("connection not established".into()).into())
            }
        }
    }

    fn connect_params(&self) -> ConnectParams {
        ConnectParams {
            client_id: ClientId::generate(&self.identity),
            host: self.config.host.clone().unwrap_or_default(),
            port: self.config.port,
            credentials: self.config.credentials.clone(),
            keep_alive: self.config.keep_alive(),
            capacity: self.config.capacity,
        }
    }

    /// Publish `payload` on `topic` after applying the delivery policy.
    ///
    /// Returns once the transport accepted the message. The connection is only serviced during
    /// calls, so after a long idle period the broker may have dropped the session and the
    /// publish fails with [`TransportError::Disconnected`]. The facade then discards the
    /// connection; the next call opens a fresh one and the failed message is not resent.
    #[instrument(level = "debug", skip(self, payload), fields(job = %self.identity))]
    pub async fn publish(
        &mut self,
        topic: &str,
        payload: impl Into<Vec<u8>> + Send,
    ) -> Result<(), CommsError> {
        let topic = Topic::new(topic)?;
        let mut message = Message::new(topic, payload);
        self.config.policy.apply(&mut message);

        let conn = self.connect_if_needed().await?;
        let sent = conn.publish(&message).await;
        if let Err(e) = sent {
            warn!(topic = %message.topic, error = %e, "publish failed");
            if matches!(e, TransportError::Disconnected(_)) {
                // Requests still queued on the dead session must not go out on a later reconnect.
                self.state = ConnectionState::Unconnected;
            }
            return Err(e.into());
        }

        debug!(
            topic = %message.topic,
            retain = message.retain,
            qos = message.qos.level(),
            bytes = message.payload.len(),
            "message published"
        );
        Ok(())
    }

    /// Register `filter` and return the inbound message sequence.
    pub async fn subscribe(&mut self, filter: TopicFilter) -> Result<Subscription<'_>, CommsError> {
        let qos = self.config.subscribe_qos;
        let conn = self.connect_if_needed().await?;
        conn.subscribe(&filter, qos).await?;
        info!(filter = %filter, qos = qos.level(), "subscribed");

        Ok(Subscription {
            conn,
            filter,
            delivered: 0,
            closed: false,
        })
    }

    /// Subscribe to `filter` and call `handler` once per inbound message, in arrival order.
    ///
    /// Runs until the transport fails (the error is returned) or the handler returns
    /// [`ControlFlow::Break`] (returns `Ok`).
    pub async fn subscribe_to_topic<F>(
        &mut self,
        filter: TopicFilter,
        mut handler: F,
    ) -> Result<(), CommsError>
    where
        F: FnMut(Message) -> ControlFlow<()> + Send,
    {
        let mut subscription = self.subscribe(filter).await?;
        loop {
            let message = subscription.next().await?;
            if handler(message).is_break() {
                debug!(
                    filter = %subscription.filter(),
                    delivered = subscription.delivered(),
                    "handler stopped subscription"
                );
                return Ok(());
            }
        }
    }
}

impl std::fmt::Debug for Communications {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Communications")
            .field("identity", &self.identity)
            .field("transport", &self.transport.name())
            .field("client_id", &self.client_id())
            .finish()
    }
}

/// Lazy, infinite sequence of inbound messages for one subscription.
///
/// Not restartable: once the transport failed, every further call to [`Subscription::next`]
/// returns [`TransportError::SubscriptionClosed`]. Subscribe again to resume.
pub struct Subscription<'c> {
    conn: &'c mut dyn Connection,
    filter: TopicFilter,
    delivered: u64,
    closed: bool,
}

impl Subscription<'_> {
    /// Wait for the next message.
    pub async fn next(&mut self) -> Result<Message, CommsError> {
        if self.closed {
            return Err(TransportError::SubscriptionClosed.into());
        }

        match self.conn.recv().await {
            Ok(message) => {
                self.delivered += 1;
                trace!(topic = %message.topic, bytes = message.payload.len(), "message received");
                Ok(message)
            }
            Err(e) => {
                self.closed = true;
                warn!(filter = %self.filter, delivered = self.delivered, error = %e, "subscription ended");
                Err(e.into())
            }
        }
    }

    pub fn filter(&self) -> &TopicFilter {
        &self.filter
    }

    /// Number of messages handed out so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
