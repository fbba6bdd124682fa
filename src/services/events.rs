//! Event system for storage operations
//!
//! Services emit an event after every successful write (and after each
//! trend build) so listeners can audit or invalidate caches without being
//! wired into the write path.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use crate::trend::TrendScope;

/// Storage events emitted by services
#[derive(Debug, Clone, PartialEq)]
pub enum StorageEvent {
    // Hierarchy events
    LevelCreated {
        id: String,
        name: String,
        position: i64,
    },
    LevelMoved {
        id: String,
        position: i64,
    },
    LevelDeleted {
        id: String,
        position: i64,
    },

    // Survey events
    SurveyDataImported {
        sessions: u64,
        responses: u64,
    },
    SessionCompleted {
        id: String,
    },

    // Read-side events
    TrendBuilt {
        scope: TrendScope,
        periods: usize,
        dimensions: usize,
        skipped: usize,
    },
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    /// Handle an event
    fn on_event(&self, event: &StorageEvent);
}

/// Event bus for broadcasting storage events
pub struct EventBus {
    sender: broadcast::Sender<StorageEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a new event bus with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: StorageEvent) {
        trace!(event = ?event, "Emitting storage event");
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging event listener for audit trails
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &StorageEvent) {
        match event {
            StorageEvent::LevelCreated { id, name, position } => {
                info!(id = %id, name = %name, position, "Hierarchy level created");
            }
            StorageEvent::LevelMoved { id, position } => {
                info!(id = %id, position, "Hierarchy level moved");
            }
            StorageEvent::LevelDeleted { id, position } => {
                info!(id = %id, position, "Hierarchy level deleted");
            }
            StorageEvent::TrendBuilt { skipped, scope, .. } if *skipped > 0 => {
                info!(scope = %scope, skipped, "Trend built with skipped rows");
            }
            _ => {
                trace!(event = ?event, "Storage event");
            }
        }
    }
}

/// Spawn a background task that logs all events until the bus is dropped
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}
