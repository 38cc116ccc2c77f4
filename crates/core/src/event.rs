//! Domain event system — decoupled observation of sessions.
//!
//! Events are published when something interesting happens in a session.
//! Other components can subscribe to react without tight coupling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A user utterance was accepted into a turn
    UtteranceReceived {
        session_id: String,
        content_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// The agent produced a final response
    ResponseGenerated {
        session_id: String,
        intent: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool was invoked
    ToolInvoked {
        tool_name: String,
        success: bool,
        error_marker: Option<String>,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Memory was recalled for a user
    MemoryRecalled {
        user_id: String,
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A session-end commit finished (successfully or not)
    MemoryCommitted {
        user_id: String,
        utterances: usize,
        attempts: u32,
        success: bool,
        timestamp: DateTime<Utc>,
    },

    /// A session moved between lifecycle phases
    SessionPhaseChanged {
        session_id: String,
        from: String,
        to: String,
        timestamp: DateTime<Utc>,
    },

    /// A recoverable error occurred
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
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
