//! Controller events
//!
//! Events give a unified stream of what each reconcile pass did. Emission is
//! best-effort: with no subscribers the events are simply dropped.

use box_types::{Identity, ObjectKey};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Channel capacity for controller events
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Envelope wrapping all controller events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerEventEnvelope {
    /// Unique event ID
    pub id: Uuid,

    /// Event timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Parent resource the event concerns
    pub key: ObjectKey,

    /// Event severity
    pub severity: EventSeverity,

    /// The actual event
    pub event: ControllerEvent,
}

impl ControllerEventEnvelope {
    pub fn new(key: ObjectKey, event: ControllerEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            key,
            severity: event.severity(),
            event,
        }
    }
}

/// Event severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSeverity {
    Info,
    Warning,
    Error,
}

/// Controller events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControllerEvent {
    /// A box was created
    UnitCreated { pod: String, id: Identity },

    /// Creating a box failed; retried on a later pass
    UnitCreateFailed { id: Identity, reason: String },

    /// A box was removed
    UnitRemoved { pod: String },

    /// Removing a box failed; retried on a later pass
    UnitRemoveFailed { pod: String, reason: String },

    /// Observed status could not be written back
    StatusUpdateFailed { reason: String },

    /// A pass finished
    PassCompleted {
        desired: u32,
        live: usize,
        created: usize,
        removed: usize,
    },
}

impl ControllerEvent {
    pub fn severity(&self) -> EventSeverity {
        match self {
            ControllerEvent::UnitCreated { .. }
            | ControllerEvent::UnitRemoved { .. }
            | ControllerEvent::PassCompleted { .. } => EventSeverity::Info,
            ControllerEvent::StatusUpdateFailed { .. } => EventSeverity::Warning,
            ControllerEvent::UnitCreateFailed { .. } | ControllerEvent::UnitRemoveFailed { .. } => {
                EventSeverity::Error
            }
        }
    }
}

/// Create a controller event channel
pub fn event_channel() -> (
    broadcast::Sender<ControllerEventEnvelope>,
    broadcast::Receiver<ControllerEventEnvelope>,
) {
    broadcast::channel(EVENT_CHANNEL_CAPACITY)
}
