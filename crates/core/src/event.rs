//! Domain event system — decoupled observation of the routing pipeline.
//!
//! The streamer publishes events as responses progress. The gateway exposes
//! them over SSE and the CLI can log them; nothing in the core depends on
//! anyone listening.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    /// The router picked a handler for a message
    HandlerSelected {
        handler_id: String,
        score: f32,
        explicit: bool,
        timestamp: DateTime<Utc>,
    },

    /// A response stream reached its `finish` frame
    ResponseCompleted {
        handler_id: String,
        finish_reason: String,
        deltas: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Generation failed (backend error, timeout, or unsupported model)
    GenerationFailed {
        handler_id: Option<String>,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Wire name, matching the serialized `event` tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::HandlerSelected { .. } => "handler_selected",
            Self::ResponseCompleted { .. } => "response_completed",
            Self::GenerationFailed { .. } => "generation_failed",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::HandlerSelected { timestamp, .. }
            | Self::ResponseCompleted { timestamp, .. }
            | Self::GenerationFailed { timestamp, .. } => *timestamp,
        }
    }
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Slow
/// subscribers lag and lose old events rather than blocking publishers.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
