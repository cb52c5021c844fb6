//! Operation-log publisher interface and broadcast implementation

use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::StoreResult;

/// Kind of change recorded in the operation log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Create,
    Delete,
}

/// One operation-log message, as consumed by the log processor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub op_name: Operation,
    pub username: String,
    pub todo_id: String,
    #[serde(rename = "zipkinSpan", default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl LogEvent {
    pub fn new(op_name: Operation, username: impl Into<String>, todo_id: impl ToString) -> Self {
        Self {
            op_name,
            username: username.into(),
            todo_id: todo_id.to_string(),
            trace_id: None,
        }
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

/// Pub/sub publisher for the operation log
#[async_trait]
pub trait LogPublisher: Send + Sync {
    /// Publish `event` on `channel`, returning how many subscribers received it
    async fn publish(&self, channel: &str, event: &LogEvent) -> StoreResult<usize>;
}

#[async_trait]
impl<P: LogPublisher + ?Sized> LogPublisher for Arc<P> {
    async fn publish(&self, channel: &str, event: &LogEvent) -> StoreResult<usize> {
        (**self).publish(channel, event).await
    }
}

/// In-process publisher fanning JSON messages out over broadcast channels
#[derive(Clone)]
pub struct BroadcastPublisher {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<String>>>>,
    capacity: usize,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to the raw JSON messages of `channel`
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<String> {
        self.sender(channel).subscribe()
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<String> {
        if let Some(sender) = self.channels.read().get(channel) {
            return sender.clone();
        }
        self.channels
            .write()
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl LogPublisher for BroadcastPublisher {
    async fn publish(&self, channel: &str, event: &LogEvent) -> StoreResult<usize> {
        let payload = serde_json::to_string(event)?;
        match self.sender(channel).send(payload) {
            Ok(receivers) => Ok(receivers),
            Err(_) => {
                debug!("No subscribers on channel '{}'", channel);
                Ok(0)
            }
        }
    }
}
