//! Server event types, envelope schema, and event bus for asynchronous notifications.
//!
//! Completion of a report request and every change of the in-flight working
//! set are published on a single broadcast channel. Downstream consumers (the
//! SSE stream, tests, idle shutdown) subscribe independently.
//!
//! ## Envelope Schema
//!
//! All emissions use [`EventEnvelope`], a versioned, self-describing wrapper
//! around domain events. The envelope carries metadata (event ID, timestamp,
//! actor, entity scope) while the `payload` field contains the domain-specific
//! [`ServerEvent`] data.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::RequestId;

// ============================================================================
// Event Envelope
// ============================================================================

/// Actor metadata for event attribution.
#[derive(Debug, Clone, Serialize)]
pub struct EventActor {
    /// Actor type: `"system"` or `"user"`.
    pub kind: String,
    /// Local account name for user actors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl EventActor {
    /// System actor (tracker bookkeeping, internal processes).
    pub fn system() -> Self {
        Self {
            kind: "system".to_string(),
            id: None,
        }
    }

    /// Local account the report was generated for.
    pub fn user(username: impl Into<String>) -> Self {
        Self {
            kind: "user".to_string(),
            id: Some(username.into()),
        }
    }
}

/// Versioned server event envelope.
///
/// ## Wire Format (SSE)
///
/// ```text
/// event: GenerateReportFinished
/// id: 019508a0-1234-7def-8000-abcdef123456
/// data: {"event_id":"...","event_type":"report.finished","occurred_at":"...","actor":{...},"payload":{...}}
/// ```
///
/// `payload_version` starts at `1` and increments on breaking payload changes.
/// Consumers should ignore unknown fields.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    /// Unique event identifier (UUIDv7 for temporal ordering).
    pub event_id: Uuid,
    /// Namespaced event type (e.g., `"report.finished"`).
    pub event_type: String,
    /// When the event occurred (UTC).
    pub occurred_at: DateTime<Utc>,
    /// Who/what caused this event.
    pub actor: EventActor,
    /// Type of entity this event relates to (`"report"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    /// ID of the entity this event relates to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// Payload schema version.
    pub payload_version: u32,
    /// Domain-specific event data.
    pub payload: ServerEvent,
}

impl EventEnvelope {
    /// Create an envelope attributed to the system actor.
    pub fn new(event: ServerEvent) -> Self {
        Self::with_actor(event, EventActor::system())
    }

    /// Create an envelope with an explicit actor.
    pub fn with_actor(event: ServerEvent, actor: EventActor) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type: event.namespaced_event_type().to_string(),
            occurred_at: Utc::now(),
            actor,
            entity_type: event.entity_type().map(String::from),
            entity_id: event.entity_id().map(|id| id.to_string()),
            payload_version: 1,
            payload: event,
        }
    }
}

// ============================================================================
// Server Event (domain payloads)
// ============================================================================

/// Domain events published by the daemon.
///
/// Serialized as JSON with a `type` tag field, e.g.:
/// `{"type":"GenerateReportFinished","request_id":3,"files":["/tmp/..."]}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// The set of in-flight requests changed. Carries the full snapshot.
    WorkingSetChanged { request_ids: Vec<RequestId> },
    /// A report request finished, successfully or not.
    GenerateReportFinished {
        request_id: RequestId,
        /// Absolute paths of the artifacts found for the request.
        files: Vec<PathBuf>,
    },
}

impl ServerEvent {
    /// SSE event name, as seen by front-ends.
    pub fn event_type(&self) -> &'static str {
        match self {
            ServerEvent::WorkingSetChanged { .. } => "WorkingSetChanged",
            ServerEvent::GenerateReportFinished { .. } => "GenerateReportFinished",
        }
    }

    /// Namespaced event type for the envelope.
    pub fn namespaced_event_type(&self) -> &'static str {
        match self {
            ServerEvent::WorkingSetChanged { .. } => "working_set.changed",
            ServerEvent::GenerateReportFinished { .. } => "report.finished",
        }
    }

    pub fn entity_type(&self) -> Option<&'static str> {
        match self {
            ServerEvent::WorkingSetChanged { .. } => None,
            ServerEvent::GenerateReportFinished { .. } => Some("report"),
        }
    }

    pub fn entity_id(&self) -> Option<RequestId> {
        match self {
            ServerEvent::WorkingSetChanged { .. } => None,
            ServerEvent::GenerateReportFinished { request_id, .. } => Some(*request_id),
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast-based event bus for distributing server events to multiple consumers.
///
/// Uses `tokio::sync::broadcast`; sending never blocks and never fails the
/// caller. Slow receivers that fall behind receive a `Lagged` error and miss
/// events. With no subscribers the event is dropped.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event attributed to the system actor.
    pub fn emit(&self, event: ServerEvent) {
        self.send(EventEnvelope::new(event));
    }

    /// Emit an event attributed to `actor`.
    pub fn emit_as(&self, event: ServerEvent, actor: EventActor) {
        self.send(EventEnvelope::with_actor(event, actor));
    }

    fn send(&self, envelope: EventEnvelope) {
        let subscriber_count = self.tx.receiver_count();
        tracing::debug!(
            event_type = %envelope.event_type,
            event_id = %envelope.event_id,
            subscriber_count,
            "EventBus emit"
        );
        let _ = self.tx.send(envelope);
    }

    /// Subscribe to receive enveloped events. Each subscriber gets its own stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::defaults::EVENT_BUS_CAPACITY)
    }
}

// ============================================================================
// Tests
// ============================================================================
