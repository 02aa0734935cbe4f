//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`ImportEvent`]s. It is
//! shared via `Arc<EventBus>` between the pipeline and its observers.

use chrono::{DateTime, Utc};
use ledgerlift_core::types::DbId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

pub const IMPORT_JOB_CREATED: &str = "import_job.created";
pub const IMPORT_JOB_STARTED: &str = "import_job.started";
pub const IMPORT_JOB_COMPLETED: &str = "import_job.completed";
pub const IMPORT_JOB_FAILED: &str = "import_job.failed";

// ---------------------------------------------------------------------------
// ImportEvent
// ---------------------------------------------------------------------------

/// A lifecycle event of an import job.
///
/// Constructed via [`ImportEvent::new`] and enriched with
/// [`with_actor`](ImportEvent::with_actor) and
/// [`with_payload`](ImportEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportEvent {
    /// Time-ordered unique id.
    pub id: Uuid,

    /// Dot-separated event name, e.g. `"import_job.completed"`.
    pub event_type: String,

    pub tenant_id: DbId,

    pub job_id: DbId,

    /// Id of the operator that triggered the event, when known.
    pub actor_id: Option<DbId>,

    /// Event-specific data (counters, summary, error message).
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl ImportEvent {
    pub fn new(event_type: impl Into<String>, tenant_id: DbId, job_id: DbId) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_type: event_type.into(),
            tenant_id,
            job_id,
            actor_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Attach the acting operator.
    pub fn with_actor(mut self, actor_id: Option<DbId>) -> Self {
        self.actor_id = actor_id;
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out event bus.
pub struct EventBus {
    sender: broadcast::Sender<ImportEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest unconsumed events are dropped and
    /// slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Without subscribers the
    /// event is dropped.
    pub fn publish(&self, event: ImportEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ImportEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
