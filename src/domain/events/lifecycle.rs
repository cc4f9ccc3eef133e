//! Lifecycle events handed to observers of a parent's children

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ids::{Actor, EventTrackingId};

/// Event category an observer subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleKind {
    Addition,
    Update,
    Removal,
}

impl fmt::Display for LifecycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Addition => write!(f, "addition"),
            Self::Update => write!(f, "update"),
            Self::Removal => write!(f, "removal"),
        }
    }
}

/// The child-side payload of a lifecycle event.
#[derive(Debug)]
pub enum ChildChange<'a, C> {
    Added(&'a C),
    Updated { old: &'a C, new: &'a C },
    Removed(&'a C),
}

// Manual impls: a derive would require `C: Clone`.
impl<C> Clone for ChildChange<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for ChildChange<'_, C> {}

impl<'a, C> ChildChange<'a, C> {
    pub fn kind(&self) -> LifecycleKind {
        match self {
            Self::Added(_) => LifecycleKind::Addition,
            Self::Updated { .. } => LifecycleKind::Update,
            Self::Removed(_) => LifecycleKind::Removal,
        }
    }

    /// The child as it is (or will be) after the mutation; the removed child
    /// for removals.
    pub fn subject(&self) -> &'a C {
        match *self {
            Self::Added(child) | Self::Removed(child) => child,
            Self::Updated { new, .. } => new,
        }
    }
}

/// `(timestamp, eventId, actor, parent, child)` as seen by observers.
#[derive(Debug)]
pub struct LifecycleEvent<'a, P, C> {
    pub timestamp: DateTime<Utc>,
    pub event_id: EventTrackingId,
    pub actor: &'a Actor,
    pub parent: &'a P,
    pub change: ChildChange<'a, C>,
}

impl<P, C> LifecycleEvent<'_, P, C> {
    pub fn kind(&self) -> LifecycleKind {
        self.change.kind()
    }
}

/// An observer failed while handling an event.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ObserverFault(pub String);

impl ObserverFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Why one observer blocked a proposed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum VetoCause {
    /// The observer voted no.
    Rejected,
    /// The observer failed; failures count as a veto.
    Fault(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Veto {
    pub observer: String,
    pub cause: VetoCause,
}

impl fmt::Display for Veto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            VetoCause::Rejected => write!(f, "vetoed by {}", self.observer),
            VetoCause::Fault(message) => write!(f, "observer {} failed: {}", self.observer, message),
        }
    }
}

/// Outcome of asking every voter about a proposed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalVerdict {
    Approved,
    Vetoed(Vec<Veto>),
}

impl ProposalVerdict {
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }

    pub fn vetoes(&self) -> &[Veto] {
        match self {
            Self::Approved => &[],
            Self::Vetoed(vetoes) => vetoes,
        }
    }
}
