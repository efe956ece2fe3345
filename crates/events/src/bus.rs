//! Event bus built on tokio broadcast channels.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::types::{Event, EventEnvelope};

/// Capacity of the broadcast channel; slow subscribers past this lag
/// start losing events rather than backpressuring the publisher.
const DEFAULT_CAPACITY: usize = 512;

/// Broadcast bus for publishing and subscribing to platform events.
///
/// Cloning is cheap; all clones publish into the same channel. Events
/// published while no subscriber exists are dropped, which is the normal
/// case for the earliest startup phases.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    published: Arc<AtomicUsize>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            published: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wrap `event` in an envelope and publish it.
    ///
    /// Returns the envelope so callers can log or correlate its ID.
    pub fn emit(&self, event: Event) -> EventEnvelope {
        let envelope = EventEnvelope::new(event);
        self.publish(envelope.clone());
        envelope
    }

    /// Publish a pre-built envelope to all subscribers.
    ///
    /// Returns the number of subscribers that received it; zero means the
    /// event was dropped.
    pub fn publish(&self, envelope: EventEnvelope) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        self.sender.send(envelope).unwrap_or(0)
    }

    /// Subscribe to events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Total events published over the bus lifetime.
    pub fn published_count(&self) -> usize {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("published", &self.published_count())
            .finish()
    }
}
