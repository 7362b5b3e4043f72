//! Domain event system — decoupled observation of agent runs.
//!
//! Events are published when something interesting happens in a loop.
//! Other components can subscribe to react without tight coupling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A model call finished
    ModelCalled {
        agent: String,
        model: String,
        iteration: usize,
        tokens_used: Option<u32>,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        agent: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A ReAct reply finished
    ReplyCompleted {
        agent: String,
        iterations: usize,
        tool_calls: usize,
        truncated: bool,
        timestamp: DateTime<Utc>,
    },

    /// Memory was compressed into a summary
    MemoryCompressed {
        agent: String,
        messages_before: usize,
        messages_after: usize,
        timestamp: DateTime<Utc>,
    },

    /// The executor reported a conclusion
    ConclusionReached {
        round: usize,
        confidence: f32,
        timestamp: DateTime<Utc>,
    },

    /// The planner decided what happens next
    DecisionMade {
        round: usize,
        action: String,
        timestamp: DateTime<Utc>,
    },

    /// A supervisory loop ended
    SupervisionFinished {
        rounds: usize,
        exit: String,
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
