//! Domain event system: decoupled observation of routing decisions.
//!
//! The router publishes an event whenever something interesting happens to
//! an input. Dashboards, tests, and loggers can subscribe without the router
//! knowing about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::source::{ConversationState, SourceKind};

/// Why an event never reached reply generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Score fell below the threshold of the current state
    BelowThreshold,
}

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// An input passed the ingestion boundary and was scored
    EventIngested {
        source: SourceKind,
        score: f64,
        queued: bool,
        timestamp: DateTime<Utc>,
    },

    /// A queued input met the admission threshold
    EventAdmitted {
        source: SourceKind,
        score: f64,
        threshold: f64,
        timestamp: DateTime<Utc>,
    },

    /// A queued input was discarded
    EventDropped {
        source: SourceKind,
        score: f64,
        reason: DropReason,
        timestamp: DateTime<Utc>,
    },

    /// An admitted input matched a recent reply and was skipped
    DuplicateSuppressed {
        source: SourceKind,
        text_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// A reply was generated and handed to the side channels
    ReplyDelivered {
        source: Option<SourceKind>,
        reply_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// Reply generation failed
    ReplyFailed {
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// The operator switched conversation state
    StateChanged {
        state: ConversationState,
        threshold: f64,
        timestamp: DateTime<Utc>,
    },

    /// The admission queue was reset
    QueueCleared {
        discarded: usize,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
/// Components can subscribe to receive all events and filter for what they care about.
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
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::StateChanged {
            state: ConversationState::Busy,
            threshold: 0.9,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::StateChanged { state, threshold, .. } => {
                assert_eq!(*state, ConversationState::Busy);
                assert!((threshold - 0.9).abs() < f64::EPSILON);
            }
            _ => panic!("Expected StateChanged event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::ReplyFailed {
            error_message: "no subscribers".into(),
            timestamp: Utc::now(),
        });
    }
}
