use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use super::types::QueueEvent;

/// Fire-and-forget event publisher for queue lifecycle events.
///
/// Backed by a bounded broadcast channel so a slow subscriber can lag and
/// drop messages without ever blocking a scheduling operation.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub name: &'static str,
    pub event: QueueEvent,
    pub published_at: DateTime<Utc>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event.
    ///
    /// Zero subscribers is success: events are emitted whether or not
    /// anyone is currently listening.
    pub fn publish(&self, event: QueueEvent) -> Result<(), PublishError> {
        let published = PublishedEvent {
            name: event.name(),
            event,
            published_at: Utc::now(),
        };

        match self.sender.send(published) {
            Ok(_) => Ok(()),
            Err(broadcast::error::SendError(_)) => Ok(()),
        }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Error types for event publishing
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Event channel is closed")]
    ChannelClosed,
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}
