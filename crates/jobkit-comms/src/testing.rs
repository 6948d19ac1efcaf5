//! In-memory transport for tests and dry runs.
//!
//! Records every connection, publish and subscription, and replays scripted inbound messages to
//! connections whose subscriptions match their topic, like a broker would. Messages nobody
//! subscribed to are dropped. When the inbound queue runs dry the connection reports a
//! disconnect.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use jobkit_model::{Message, QoS, TopicFilter};

use crate::{ConnectParams, Connection, Transport, TransportError};

#[derive(Default)]
struct MemoryState {
    connects: Vec<ConnectParams>,
    published: Vec<Message>,
    subscriptions: Vec<(TopicFilter, QoS)>,
    inbound: VecDeque<Message>,
    fail_connect: Option<String>,
    fail_publish: Option<String>,
    drop_next_publish: Option<String>,
}

/// Shared handle; clones observe the same state.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message delivered to subscribers.
    pub fn push_inbound(&self, message: Message) {
        self.inner.lock().unwrap().inbound.push_back(message);
    }

    /// Make every following connection attempt fail.
    pub fn fail_connect(&self, reason: impl Into<String>) {
        self.inner.lock().unwrap().fail_connect = Some(reason.into());
    }

    /// Make every following publish fail.
    pub fn fail_publish(&self, reason: impl Into<String>) {
        self.inner.lock().unwrap().fail_publish = Some(reason.into());
    }

    /// Make the next publish fail as if the broker had dropped the session.
    pub fn disconnect_next_publish(&self, reason: impl Into<String>) {
        self.inner.lock().unwrap().drop_next_publish = Some(reason.into());
    }

    pub fn connect_count(&self) -> usize {
        self.inner.lock().unwrap().connects.len()
    }

    pub fn connects(&self) -> Vec<ConnectParams> {
        self.inner.lock().unwrap().connects.clone()
    }

    pub fn published(&self) -> Vec<Message> {
        self.inner.lock().unwrap().published.clone()
    }

    pub fn subscriptions(&self) -> Vec<TopicFilter> {
        self.inner
            .lock()
            .unwrap()
            .subscriptions
            .iter()
            .map(|(f, _)| f.clone())
            .collect()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Connection>, TransportError> {
        let mut state = self.inner.lock().unwrap();
        state.connects.push(params.clone());
        if let Some(reason) = &state.fail_connect {
            return Err(TransportError::Connect(reason.clone()));
        }
        Ok(Box::new(MemoryConnection {
            inner: Arc::clone(&self.inner),
            filters: Vec::new(),
        }))
    }
}

struct MemoryConnection {
    inner: Arc<Mutex<MemoryState>>,
    filters: Vec<TopicFilter>,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn publish(&mut self, message: &Message) -> Result<(), TransportError> {
        let mut state = self.inner.lock().unwrap();
        if let Some(reason) = state.drop_next_publish.take() {
            return Err(TransportError::Disconnected(reason));
        }
        if let Some(reason) = &state.fail_publish {
            return Err(TransportError::Publish(reason.clone()));
        }
        state.published.push(message.clone());
        Ok(())
    }

    async fn subscribe(&mut self, filter: &TopicFilter, qos: QoS) -> Result<(), TransportError> {
        self.inner
            .lock()
            .unwrap()
            .subscriptions
            .push((filter.clone(), qos));
        self.filters.push(filter.clone());
        Ok(())
    }

    async fn recv(&mut self) -> Result<Message, TransportError> {
        let mut state = self.inner.lock().unwrap();
        while let Some(message) = state.inbound.pop_front() {
            if self.filters.iter().any(|f| f.matches(&message.topic)) {
                return Ok(message);
            }
        }
        Err(TransportError::Disconnected("no more inbound messages".into()))
    }
}
