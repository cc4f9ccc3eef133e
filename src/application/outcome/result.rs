//! Outcome of propagating one item to one partner

use chrono::{DateTime, Duration, Utc};

use super::kind::OutcomeKind;
use super::text::{I18nText, Warning};
use crate::application::propagation::PushItem;
use crate::domain::ids::{AuthorizatorId, EntityRef, EventTrackingId};

/// Immutable record of one propagation attempt. Build it with
/// [`OperationResult::builder`].
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResult {
    timestamp: DateTime<Utc>,
    authorizator_id: AuthorizatorId,
    outcome: OutcomeKind,
    event_id: Option<EventTrackingId>,
    payload: Option<PushItem>,
    subject: Option<EntityRef>,
    description: Option<I18nText>,
    warnings: Vec<Warning>,
    location: Option<String>,
    runtime: Option<Duration>,
}

impl OperationResult {
    pub fn builder(authorizator_id: AuthorizatorId, outcome: OutcomeKind) -> OperationResultBuilder {
        OperationResultBuilder {
            result: OperationResult {
                timestamp: Utc::now(),
                authorizator_id,
                outcome,
                event_id: None,
                payload: None,
                subject: None,
                description: None,
                warnings: Vec::new(),
                location: None,
                runtime: None,
            },
        }
    }

    /// Result with the given outcome for `payload`, stamped now.
    pub fn for_item(authorizator_id: AuthorizatorId, outcome: OutcomeKind, payload: PushItem) -> Self {
        Self::builder(authorizator_id, outcome).payload(payload).build()
    }

    pub fn success(authorizator_id: AuthorizatorId, payload: PushItem) -> Self {
        Self::for_item(authorizator_id, OutcomeKind::Success, payload)
    }

    pub fn enqueued(authorizator_id: AuthorizatorId, payload: PushItem) -> Self {
        Self::for_item(authorizator_id, OutcomeKind::Enqueued, payload)
    }

    /// Continue building from this result, e.g. to restamp or re-classify it.
    pub fn rebuild(self) -> OperationResultBuilder {
        OperationResultBuilder { result: self }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn authorizator_id(&self) -> &AuthorizatorId {
        &self.authorizator_id
    }

    pub fn outcome(&self) -> OutcomeKind {
        self.outcome
    }

    pub fn event_id(&self) -> Option<EventTrackingId> {
        self.event_id
    }

    pub fn payload(&self) -> Option<&PushItem> {
        self.payload.as_ref()
    }

    /// The entity the result is about. Set from the payload, or explicitly
    /// when there is nothing to push (e.g. removal of an unknown id).
    pub fn subject(&self) -> Option<&EntityRef> {
        self.subject.as_ref()
    }

    pub fn description(&self) -> Option<&I18nText> {
        self.description.as_ref()
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Where the partner keeps the committed record, if it told us.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn runtime(&self) -> Option<Duration> {
        self.runtime
    }
}

#[derive(Debug, Clone)]
pub struct OperationResultBuilder {
    result: OperationResult,
}

impl OperationResultBuilder {
    pub fn outcome(mut self, outcome: OutcomeKind) -> Self {
        self.result.outcome = outcome;
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.result.timestamp = timestamp;
        self
    }

    pub fn event_id(mut self, event_id: EventTrackingId) -> Self {
        self.result.event_id = Some(event_id);
        self
    }

    pub fn payload(mut self, payload: PushItem) -> Self {
        if self.result.subject.is_none() {
            self.result.subject = Some(payload.entity());
        }
        self.result.payload = Some(payload);
        self
    }

    pub fn subject(mut self, subject: EntityRef) -> Self {
        self.result.subject = Some(subject);
        self
    }

    pub fn description(mut self, description: impl Into<I18nText>) -> Self {
        self.result.description = Some(description.into());
        self
    }

    pub fn warning(mut self, warning: impl Into<I18nText>) -> Self {
        self.result.warnings.push(Warning::new(warning));
        self
    }

    pub fn warnings(mut self, warnings: impl IntoIterator<Item = Warning>) -> Self {
        self.result.warnings.extend(warnings);
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.result.location = Some(location.into());
        self
    }

    pub fn runtime(mut self, runtime: Duration) -> Self {
        self.result.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> OperationResult {
        self.result
    }
}
