//! Live updates: in-process fan-out of message events to WebSocket clients.
//!
//! Delivery is at-most-once: events published while nobody is subscribed are
//! dropped, and a subscriber that falls behind the channel capacity loses the
//! events it missed.

pub mod ws;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::store::conversations::Message;

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Events pushed to every connected client.
///
/// Wire form: `{"type": "new_message", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum LiveEvent {
    /// A message was stored.
    NewMessage(Message),
    /// A message's delivery status changed.
    StatusUpdate { id: i64, status: String },
}

impl LiveEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewMessage(_) => "new_message",
            Self::StatusUpdate { .. } => "status_update",
        }
    }
}

/// Broadcast hub shared by the HTTP handlers and the socket tasks.
#[derive(Clone)]
pub struct LiveHub {
    tx: broadcast::Sender<LiveEvent>,
}

impl LiveHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BROADCAST_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Each WebSocket connection calls this once on attach.
    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.tx.subscribe()
    }

    /// Fan out `event`; returns how many subscribers it reached.
    pub fn publish(&self, event: LiveEvent) -> usize {
        let kind = event.kind();
        // Err only means nobody is listening
        let reached = self.tx.send(event).unwrap_or(0);
        debug!(event = kind, subscribers = reached, "Live event published");
        reached
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for LiveHub {
    fn default() -> Self {
        Self::new()
    }
}
