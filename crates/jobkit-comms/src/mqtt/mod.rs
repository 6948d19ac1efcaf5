//! MQTT 3.1.1 transport on top of `rumqttc`.
//!
//! The client event loop is driven inline by every operation: a publish or subscribe polls the
//! loop until the matching acknowledgement arrives, so calls complete strictly one at a time.
//! Publishes received while waiting for an acknowledgement are buffered for [`Connection::recv`].
//!
//! Between calls nobody polls the loop, so no keep-alive pings are sent while the connection is
//! idle. A broker that gives up on an idle session surfaces as [`TransportError::Disconnected`]
//! on the next operation.

use std::collections::VecDeque;

use async_trait::async_trait;
use jobkit_model::{Message, QoS, Topic, TopicFilter};
use rumqttc::{
    AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet,
    SubscribeReasonCode,
};
use tracing::{debug, trace};

use crate::{ConnectParams, Connection, Transport, TransportError};

#[derive(Debug, Clone, Copy, Default)]
pub struct MqttTransport;

impl MqttTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for MqttTransport {
    fn name(&self) -> &'static str {
        "mqtt"
    }

    async fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Connection>, TransportError> {
        let mut options = MqttOptions::new(params.client_id.as_str(), &params.host, params.port);
        options.set_keep_alive(params.keep_alive);
        options.set_clean_session(true);
        if let Some(creds) = &params.credentials {
            options.set_credentials(creds.username(), creds.password());
        }

        let (client, eventloop) = AsyncClient::new(options, params.capacity.max(1));
        let mut conn = MqttConnection {
            client,
            eventloop,
            inbox: VecDeque::new(),
        };
        conn.await_connack().await?;
        Ok(Box::new(conn))
    }
}

struct MqttConnection {
    client: AsyncClient,
    eventloop: EventLoop,
    inbox: VecDeque<Message>,
}

impl MqttConnection {
    async fn await_connack(&mut self) -> Result<(), TransportError> {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    debug!(session_present = ack.session_present, "connack received");
                    return Ok(());
                }
                Ok(event) => trace!(?event, "event before connack"),
                Err(ConnectionError::ConnectionRefused(code)) => {
                    return Err(TransportError::Refused(format!("{code:?}")));
                }
                Err(e) => return Err(TransportError::Connect(e.to_string())),
            }
        }
    }

    async fn poll(&mut self) -> Result<Event, TransportError> {
        let event = self
            .eventloop
            .poll()
            .await
            .map_err(|e| TransportError::Disconnected(e.to_string()))?;

        match &event {
            Event::Incoming(Packet::Publish(publish)) => {
                let topic = Topic::new(publish.topic.clone())
                    .map_err(|e| TransportError::Protocol(e.to_string()))?;
                self.inbox.push_back(Message {
                    topic,
                    payload: publish.payload.to_vec(),
                    retain: publish.retain,
                    qos: from_mqtt_qos(publish.qos),
                });
            }
            Event::Incoming(Packet::Disconnect) => {
                return Err(TransportError::Disconnected(
                    "broker closed the session".into(),
                ));
            }
            _ => {}
        }
        Ok(event)
    }

    /// Drive the event loop until `done` accepts an event.
    async fn drive_until<F>(&mut self, mut done: F) -> Result<(), TransportError>
    where
        F: FnMut(&Event) -> bool + Send,
    {
        loop {
            let event = self.poll().await?;
            if done(&event) {
                return Ok(());
            }
        }
    }
}

#[async_trait]
impl Connection for MqttConnection {
    async fn publish(&mut self, message: &Message) -> Result<(), TransportError> {
        self.client
            .publish(
                message.topic.as_str(),
                to_mqtt_qos(message.qos),
                message.retain,
                message.payload.clone(),
            )
            .await
            .map_err(|e| TransportError::Publish(e.to_string()))?;

        // QoS 0 is done once written, QoS 1 waits for PUBACK, QoS 2 for PUBCOMP.
        let qos = message.qos;
        self.drive_until(move |event| match qos {
            QoS::AtMostOnce => matches!(event, Event::Outgoing(Outgoing::Publish(_))),
            QoS::AtLeastOnce => matches!(event, Event::Incoming(Packet::PubAck(_))),
            QoS::ExactlyOnce => matches!(event, Event::Incoming(Packet::PubComp(_))),
        })
        .await
    }

    async fn subscribe(&mut self, filter: &TopicFilter, qos: QoS) -> Result<(), TransportError> {
        self.client
            .subscribe(filter.as_str(), to_mqtt_qos(qos))
            .await
            .map_err(|e| TransportError::Subscribe(e.to_string()))?;

        let mut rejected = false;
        self.drive_until(|event| match event {
            Event::Incoming(Packet::SubAck(ack)) => {
                rejected = ack
                    .return_codes
                    .iter()
                    .any(|code| matches!(code, SubscribeReasonCode::Failure));
                true
            }
            _ => false,
        })
        .await?;

        if rejected {
            return Err(TransportError::Subscribe(format!(
                "broker rejected filter '{filter}'"
            )));
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Message, TransportError> {
        loop {
            if let Some(message) = self.inbox.pop_front() {
                return Ok(message);
            }
            self.poll().await?;
        }
    }
}

fn to_mqtt_qos(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

fn from_mqtt_qos(qos: rumqttc::QoS) -> QoS {
    match qos {
        rumqttc::QoS::AtMostOnce => QoS::AtMostOnce,
        rumqttc::QoS::AtLeastOnce => QoS::AtLeastOnce,
        rumqttc::QoS::ExactlyOnce => QoS::ExactlyOnce,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use jobkit_model::JobIdentity;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;
    use crate::{ClientId, DeliveryPolicy};

    const CONNACK_ACCEPTED: u8 = 0x00;
    const CONNACK_NOT_AUTHORIZED: u8 = 0x05;

    #[test]
    fn qos_mapping_is_symmetric() {
        for qos in [QoS::AtMostOnce, QoS::AtLeastOnce, QoS::ExactlyOnce] {
            assert_eq!(from_mqtt_qos(to_mqtt_qos(qos)), qos);
            assert_eq!(to_mqtt_qos(qos) as u8, qos.level());
        }
    }

    async fn listen() -> (TcpListener, ConnectParams) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let params = ConnectParams {
            client_id: ClientId::generate(&JobIdentity::new("jobs::Wire").unwrap()),
            host: "127.0.0.1".into(),
            port,
            credentials: None,
            keep_alive: Duration::from_secs(30),
            capacity: 10,
        };
        (listener, params)
    }

    /// Reads one control packet: fixed header byte and body.
    async fn read_packet(stream: &mut TcpStream) -> (u8, Vec<u8>) {
        let header = stream.read_u8().await.unwrap();
        let mut len = 0usize;
        let mut shift = 0;
        loop {
            let byte = stream.read_u8().await.unwrap();
            len |= usize::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        let mut body = vec![0; len];
        stream.read_exact(&mut body).await.unwrap();
        (header, body)
    }

    async fn accept_session(listener: &TcpListener, return_code: u8) -> TcpStream {
        let (mut stream, _) = listener.accept().await.unwrap();
        let (header, _) = read_packet(&mut stream).await;
        assert_eq!(header >> 4, 1, "CONNECT expected first");
        stream
            .write_all(&[0x20, 0x02, 0x00, return_code])
            .await
            .unwrap();
        stream
    }

    async fn connect(params: &ConnectParams) -> Result<Box<dyn Connection>, TransportError> {
        MqttTransport::new().connect(params).await
    }

    fn outbound(topic: &str, payload: &str) -> Message {
        let mut message = Message::new(Topic::new(topic).unwrap(), payload);
        DeliveryPolicy::default().apply(&mut message);
        message
    }

    #[tokio::test]
    async fn command_publish_goes_out_retained_with_qos2() {
        let (listener, params) = listen().await;
        let broker = tokio::spawn(async move {
            let mut stream = accept_session(&listener, CONNACK_ACCEPTED).await;
            let (header, body) = read_packet(&mut stream).await;
            let topic_len = usize::from(u16::from_be_bytes([body[0], body[1]]));
            let topic = String::from_utf8(body[2..2 + topic_len].to_vec()).unwrap();
            let pkid = [body[2 + topic_len], body[3 + topic_len]];
            let payload = body[4 + topic_len..].to_vec();

            stream.write_all(&[0x50, 0x02, pkid[0], pkid[1]]).await.unwrap();
            let (pubrel, _) = read_packet(&mut stream).await;
            assert_eq!(pubrel, 0x62);
            stream.write_all(&[0x70, 0x02, pkid[0], pkid[1]]).await.unwrap();
            (header, topic, payload, stream)
        });

        let mut conn = match connect(&params).await {
            Ok(conn) => conn,
            Err(e) => panic!("connect failed: {e}"),
        };
        conn.publish(&outbound("devices/commands/x", "reboot"))
            .await
            .unwrap();

        let (header, topic, payload, _stream) = broker.await.unwrap();
        assert_eq!(header >> 4, 3, "PUBLISH");
        assert_eq!((header >> 1) & 0x03, 2, "QoS bits");
        assert_eq!(header & 0x01, 1, "retain bit");
        assert_eq!(topic, "devices/commands/x");
        assert_eq!(payload, b"reboot");
    }

    #[tokio::test]
    async fn sensor_publish_goes_out_retained_with_qos0() {
        let (listener, params) = listen().await;
        let broker = tokio::spawn(async move {
            let mut stream = accept_session(&listener, CONNACK_ACCEPTED).await;
            let (header, _) = read_packet(&mut stream).await;
            (header, stream)
        });

        let mut conn = match connect(&params).await {
            Ok(conn) => conn,
            Err(e) => panic!("connect failed: {e}"),
        };
        conn.publish(&outbound("sensors/host/uptime", "42"))
            .await
            .unwrap();

        let (header, _stream) = broker.await.unwrap();
        assert_eq!(header, 0x31);
    }

    #[tokio::test]
    async fn rejected_subscription_is_an_error() {
        let (listener, params) = listen().await;
        let broker = tokio::spawn(async move {
            let mut stream = accept_session(&listener, CONNACK_ACCEPTED).await;
            let (header, body) = read_packet(&mut stream).await;
            assert_eq!(header, 0x82, "SUBSCRIBE");
            stream
                .write_all(&[0x90, 0x03, body[0], body[1], 0x80])
                .await
                .unwrap();
            stream
        });

        let mut conn = match connect(&params).await {
            Ok(conn) => conn,
            Err(e) => panic!("connect failed: {e}"),
        };
        let filter = TopicFilter::new("sensors/#").unwrap();
        let err = conn.subscribe(&filter, QoS::AtMostOnce).await.unwrap_err();
        assert!(matches!(err, TransportError::Subscribe(_)));
        drop(broker.await.unwrap());
    }

    #[tokio::test]
    async fn refused_connack_is_reported() {
        let (listener, params) = listen().await;
        let broker = tokio::spawn(async move {
            accept_session(&listener, CONNACK_NOT_AUTHORIZED).await
        });

        let err = match connect(&params).await {
            Ok(_) => panic!("connection must be refused"),
            Err(e) => e,
        };
        assert!(matches!(err, TransportError::Refused(_)));
        drop(broker.await.unwrap());
    }

    #[tokio::test]
    async fn inbound_publish_reaches_recv() {
        let (listener, params) = listen().await;
        let broker = tokio::spawn(async move {
            let mut stream = accept_session(&listener, CONNACK_ACCEPTED).await;
            let (_, body) = read_packet(&mut stream).await;
            stream
                .write_all(&[0x90, 0x03, body[0], body[1], 0x00])
                .await
                .unwrap();

            let topic = b"sensors/a";
            let mut packet = vec![0x31, (2 + topic.len() + 2) as u8, 0x00, topic.len() as u8];
            packet.extend_from_slice(topic);
            packet.extend_from_slice(b"M1");
            stream.write_all(&packet).await.unwrap();
            stream
        });

        let mut conn = match connect(&params).await {
            Ok(conn) => conn,
            Err(e) => panic!("connect failed: {e}"),
        };
        let filter = TopicFilter::new("sensors/#").unwrap();
        conn.subscribe(&filter, QoS::AtMostOnce).await.unwrap();

        let message = conn.recv().await.unwrap();
        assert_eq!(message.topic.as_str(), "sensors/a");
        assert_eq!(message.payload, b"M1");
        assert!(message.retain);
        assert_eq!(message.qos, QoS::AtMostOnce);
        drop(broker.await.unwrap());
    }
}
