/*
[INPUT]:  Frames and connection state changes from feed readers
[OUTPUT]: Per-kind broadcast fan-out of feed events to listeners
[POS]:    Feed layer - publish/subscribe registry
[UPDATE]: When adding event variants or changing delivery semantics
*/

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::types::FeedKind;

/// Default number of events buffered per kind before slow listeners lag
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEventBody {
    /// A complete JSON document pushed by the server
    Message(Value),
    /// A frame that could not be decoded; the connection stays up
    MalformedFrame { raw: String, error: String },
    /// The connection ended; no further events follow from it
    Disconnected { reason: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedEvent {
    pub kind: FeedKind,
    /// Identifies the connection that produced the event
    pub connection_id: Uuid,
    pub received_at: DateTime<Utc>,
    pub body: FeedEventBody,
}

impl FeedEvent {
    pub fn new(kind: FeedKind, connection_id: Uuid, body: FeedEventBody) -> Self {
        Self {
            kind,
            connection_id,
            received_at: Utc::now(),
            body,
        }
    }

    pub fn message(&self) -> Option<&Value> {
        match &self.body {
            FeedEventBody::Message(value) => Some(value),
            _ => None,
        }
    }

    /// The `type` field servers put on feed messages (`price`, `trade`, `order`, ...)
    pub fn message_type(&self) -> Option<&str> {
        self.message()?.get("type")?.as_str()
    }
}

/// One broadcast channel per feed kind
#[derive(Debug, Clone)]
pub struct FeedEventBus {
    public: broadcast::Sender<FeedEvent>,
    private: broadcast::Sender<FeedEvent>,
}

impl FeedEventBus {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (public, _) = broadcast::channel(capacity);
        let (private, _) = broadcast::channel(capacity);
        Self { public, private }
    }

    fn sender(&self, kind: FeedKind) -> &broadcast::Sender<FeedEvent> {
        match kind {
            FeedKind::Public => &self.public,
            FeedKind::Private => &self.private,
        }
    }

    /// Listen to events of one kind from now on
    pub fn subscribe(&self, kind: FeedKind) -> broadcast::Receiver<FeedEvent> {
        self.sender(kind).subscribe()
    }

    /// Publish to every listener of `event.kind`; returns how many listeners received it
    pub fn publish(&self, event: FeedEvent) -> usize {
        self.sender(event.kind).send(event).unwrap_or(0)
    }

    pub fn receiver_count(&self, kind: FeedKind) -> usize {
        self.sender(kind).receiver_count()
    }
}

impl Default for FeedEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
