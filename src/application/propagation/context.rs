//! Per-call propagation context

use std::time::Duration;

use tokio::time::Instant;

use crate::domain::ids::{Actor, EventTrackingId};
use crate::shared::CancellationSignal;

/// Identity, deadline and cancellation of one propagation call.
#[derive(Debug, Clone)]
pub struct PropagationContext {
    pub event_id: EventTrackingId,
    pub actor: Actor,
    /// Limit for a single adapter call; an expired attempt yields `Timeout`
    /// and the batch moves on to the next item.
    pub item_timeout: Option<Duration>,
    /// Limit for the whole batch; items not started by then yield `Timeout`.
    pub deadline: Option<Instant>,
    pub cancel: Option<CancellationSignal>,
}

impl PropagationContext {
    pub fn new(actor: Actor) -> Self {
        Self {
            event_id: EventTrackingId::new(),
            actor,
            item_timeout: None,
            deadline: None,
            cancel: None,
        }
    }

    pub fn system() -> Self {
        Self::new(Actor::system())
    }

    pub fn with_event_id(mut self, event_id: EventTrackingId) -> Self {
        self.event_id = event_id;
        self
    }

    pub fn with_item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout = Some(timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline `budget` from now.
    pub fn with_budget(self, budget: Duration) -> Self {
        self.with_deadline(Instant::now() + budget)
    }

    pub fn with_cancellation(mut self, cancel: CancellationSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// The batch as a whole may no longer start new attempts.
    pub fn is_expired(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationSignal::is_triggered)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves when the batch deadline passes or the batch is cancelled;
    /// never resolves when neither is set.
    pub async fn expired(&self) {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        let cancelled = async {
            match &self.cancel {
                Some(cancel) => cancel.cancelled().await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            _ = deadline => {}
            _ = cancelled => {}
        }
    }
}

impl Default for PropagationContext {
    fn default() -> Self {
        Self::system()
    }
}
