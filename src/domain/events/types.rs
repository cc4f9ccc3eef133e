//! Fleet events
//!
//! Facts published on the event bus after they happened. Unlike lifecycle
//! proposals these cannot be vetoed.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{EntityRef, EventTrackingId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum FleetEvent {
    ChildAdded(ChildLifecycleEvent),
    ChildUpdated(ChildLifecycleEvent),
    ChildRemoved(ChildLifecycleEvent),
    StatusChanged(StatusChangedEvent),
    BatchCompleted(BatchCompletedEvent),
    QueueFlushed(QueueFlushedEvent),
}

impl FleetEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            FleetEvent::ChildAdded(_) => "child_added",
            FleetEvent::ChildUpdated(_) => "child_updated",
            FleetEvent::ChildRemoved(_) => "child_removed",
            FleetEvent::StatusChanged(_) => "status_changed",
            FleetEvent::BatchCompleted(_) => "batch_completed",
            FleetEvent::QueueFlushed(_) => "queue_flushed",
        }
    }

    /// The entity the event is about, if it is about a single one.
    pub fn entity(&self) -> Option<&EntityRef> {
        match self {
            FleetEvent::ChildAdded(e) | FleetEvent::ChildUpdated(e) | FleetEvent::ChildRemoved(e) => {
                Some(&e.child)
            }
            FleetEvent::StatusChanged(e) => Some(&e.entity),
            FleetEvent::BatchCompleted(_) | FleetEvent::QueueFlushed(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildLifecycleEvent {
    pub parent: EntityRef,
    pub child: EntityRef,
    pub actor: String,
    pub event_id: EventTrackingId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangedEvent {
    pub entity: EntityRef,
    /// "admin", "evse" or "site"
    pub status_kind: String,
    pub old_status: String,
    pub new_status: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchCompletedEvent {
    pub event_id: EventTrackingId,
    pub operation: String,
    pub outcome: String,
    pub items: usize,
    pub outcome_counts: BTreeMap<String, usize>,
    pub runtime_ms: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueFlushedEvent {
    pub adapter: String,
    pub delivered: usize,
    pub requeued: usize,
    pub failed: usize,
    pub remaining: usize,
    pub timestamp: DateTime<Utc>,
}

/// Wrapper for sending events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: FleetEvent,
}

impl EventMessage {
    pub fn new(event: FleetEvent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event,
        }
    }
}
