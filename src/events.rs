//! Lifecycle event bus shared between adapters and the host UI chrome.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::platforms::models::Field;
use crate::platforms::traits::FillPhase;

const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    FillStarted {
        platform: String,
    },
    PhaseChanged {
        platform: String,
        phase: FillPhase,
    },
    FieldFilled {
        platform: String,
        field: Field,
        success: bool,
    },
    FillCompleted {
        platform: String,
        succeeded: usize,
        failed: usize,
    },
    FillAborted {
        platform: String,
        reason: String,
    },
    ContentCopied {
        platform: String,
        success: bool,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: LifecycleEvent,
}

/// Broadcast bus. Cloning shares the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, event: LifecycleEvent) {
        log::debug!("[events] {:?}", event);
        let _ = self.sender.send(EventEnvelope {
            at: Utc::now(),
            event,
        });
    }
}
