//! Folding many item outcomes into one batch outcome
//!
//! A batch is never all-or-nothing: one pool may be rejected while the rest
//! of the batch is delivered. [`BatchResult::combine`] keeps every per-item
//! result, in order, and derives a single verdict on top:
//!
//! - no items → `Error`, zero runtime;
//! - all items share a kind → that kind;
//! - otherwise → `Mixed`.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use super::kind::{BatchOutcomeKind, OutcomeKind};
use super::result::OperationResult;
use super::text::{I18nText, Warning};
use crate::domain::ids::{AuthorizatorId, EventTrackingId};

#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    timestamp: DateTime<Utc>,
    oldest: DateTime<Utc>,
    authorizator_id: AuthorizatorId,
    outcome: BatchOutcomeKind,
    event_id: Option<EventTrackingId>,
    description: Option<I18nText>,
    warnings: Vec<Warning>,
    location: Option<String>,
    runtime: Duration,
    results: Vec<OperationResult>,
}

impl BatchResult {
    /// Combines `results` with the description and warnings of the first item.
    pub fn combine(authorizator_id: AuthorizatorId, results: Vec<OperationResult>) -> Self {
        Self::builder(authorizator_id, results).build()
    }

    pub fn builder(authorizator_id: AuthorizatorId, results: Vec<OperationResult>) -> BatchResultBuilder {
        BatchResultBuilder {
            authorizator_id,
            results,
            event_id: None,
            description: None,
            warnings: None,
            location: None,
        }
    }

    /// Timestamp of the newest item result (creation time for empty batches).
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn newest(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn oldest(&self) -> DateTime<Utc> {
        self.oldest
    }

    pub fn authorizator_id(&self) -> &AuthorizatorId {
        &self.authorizator_id
    }

    pub fn outcome(&self) -> BatchOutcomeKind {
        self.outcome
    }

    pub fn event_id(&self) -> Option<EventTrackingId> {
        self.event_id
    }

    pub fn description(&self) -> Option<&I18nText> {
        self.description.as_ref()
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Newest minus oldest item timestamp.
    pub fn runtime(&self) -> Duration {
        self.runtime
    }

    /// Per-item results in the order they were combined.
    pub fn results(&self) -> &[OperationResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<OperationResult> {
        self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn is_homogeneous(&self) -> bool {
        !self.outcome.is_mixed()
    }

    pub fn count_by_kind(&self) -> BTreeMap<OutcomeKind, usize> {
        let mut counts = BTreeMap::new();
        for result in &self.results {
            *counts.entry(result.outcome()).or_default() += 1;
        }
        counts
    }

    pub fn of_kind(&self, kind: OutcomeKind) -> impl Iterator<Item = &OperationResult> {
        self.results.iter().filter(move |r| r.outcome() == kind)
    }

    /// Results a caller may want to retry.
    pub fn retryable(&self) -> impl Iterator<Item = &OperationResult> {
        self.results.iter().filter(|r| r.outcome().is_retryable())
    }
}

/// Builds a [`BatchResult`]; batch-level description, warnings and
/// location override the ones taken from the first item.
#[derive(Debug, Clone)]
pub struct BatchResultBuilder {
    authorizator_id: AuthorizatorId,
    results: Vec<OperationResult>,
    event_id: Option<EventTrackingId>,
    description: Option<I18nText>,
    warnings: Option<Vec<Warning>>,
    location: Option<String>,
}

impl BatchResultBuilder {
    pub fn event_id(mut self, event_id: EventTrackingId) -> Self {
        self.event_id = Some(event_id);
        self
    }

    pub fn description(mut self, description: impl Into<I18nText>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn warnings(mut self, warnings: Vec<Warning>) -> Self {
        self.warnings = Some(warnings);
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn build(self) -> BatchResult {
        let results = self.results;
        let first = results.first();

        let outcome = match first {
            None => BatchOutcomeKind::Uniform(OutcomeKind::Error),
            Some(first) => {
                let kind = first.outcome();
                if results.iter().all(|r| r.outcome() == kind) {
                    BatchOutcomeKind::Uniform(kind)
                } else {
                    BatchOutcomeKind::Mixed
                }
            }
        };

        let (oldest, newest) = match (
            results.iter().map(OperationResult::timestamp).min(),
            results.iter().map(OperationResult::timestamp).max(),
        ) {
            (Some(oldest), Some(newest)) => (oldest, newest),
            _ => {
                let now = Utc::now();
                (now, now)
            }
        };

        let description = self
            .description
            .or_else(|| first.and_then(|r| r.description().cloned()));
        let warnings = self
            .warnings
            .unwrap_or_else(|| first.map(|r| r.warnings().to_vec()).unwrap_or_default());
        let event_id = self.event_id.or_else(|| first.and_then(OperationResult::event_id));

        BatchResult {
            timestamp: newest,
            oldest,
            authorizator_id: self.authorizator_id,
            outcome,
            event_id,
            description,
            warnings,
            location: self.location,
            runtime: newest - oldest,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn item(kind: OutcomeKind, at: i64) -> OperationResult {
        OperationResult::builder("partner".into(), kind)
            .timestamp(t(at))
            .description(format!("{kind} at {at}"))
            .build()
    }

    #[test]
    fn empty_batch_is_error_with_zero_runtime() {
        let batch = BatchResult::combine("hub".into(), Vec::new());
        assert_eq!(batch.outcome(), OutcomeKind::Error);
        assert_eq!(batch.runtime(), Duration::zero());
        assert!(batch.is_empty());
    }

    #[test]
    fn homogeneous_batch_keeps_the_shared_kind() {
        for kind in OutcomeKind::ALL {
            let batch = BatchResult::combine("hub".into(), vec![item(kind, 0), item(kind, 1)]);
            assert_eq!(batch.outcome(), BatchOutcomeKind::Uniform(kind));
            assert!(batch.is_homogeneous());
        }
    }

    #[test]
    fn two_successes_and_unknown_location_is_mixed() {
        let items = vec![
            item(OutcomeKind::Success, 0),
            item(OutcomeKind::Success, 1),
            item(OutcomeKind::UnknownLocation, 2),
        ];
        let batch = BatchResult::combine("hub".into(), items.clone());

        assert_eq!(batch.outcome(), BatchOutcomeKind::Mixed);
        assert_eq!(batch.results(), items.as_slice());
        assert_eq!(batch.count_by_kind()[&OutcomeKind::Success], 2);
        assert_eq!(batch.of_kind(OutcomeKind::UnknownLocation).count(), 1);
    }

    #[test]
    fn runtime_spans_oldest_to_newest() {
        let batch = BatchResult::combine(
            "hub".into(),
            vec![item(OutcomeKind::Success, 5), item(OutcomeKind::Success, 2), item(OutcomeKind::Success, 9)],
        );
        assert_eq!(batch.timestamp(), t(9));
        assert_eq!(batch.oldest(), t(2));
        assert_eq!(batch.runtime(), Duration::seconds(7));
    }

    #[test]
    fn description_defaults_to_first_item_unless_overridden() {
        let items = vec![item(OutcomeKind::Timeout, 0), item(OutcomeKind::Error, 1)];

        let batch = BatchResult::combine("hub".into(), items.clone());
        assert_eq!(batch.description().unwrap().to_string(), "Timeout at 0");
        assert_eq!(batch.retryable().count(), 2);

        let overridden = BatchResult::builder("hub".into(), items)
            .description("partner maintenance window")
            .warnings(vec![Warning::new("retry after 02:00")])
            .build();
        assert_eq!(overridden.description().unwrap().to_string(), "partner maintenance window");
        assert_eq!(overridden.warnings()[0].to_string(), "retry after 02:00");
    }

    #[test]
    fn result_map_preserves_order_and_length() {
        let kinds = [
            OutcomeKind::Filtered,
            OutcomeKind::Success,
            OutcomeKind::Enqueued,
            OutcomeKind::Filtered,
            OutcomeKind::AdminDown,
        ];
        let items: Vec<_> = kinds.iter().enumerate().map(|(i, k)| item(*k, i as i64)).collect();
        let batch = BatchResult::combine("hub".into(), items);
        let outcomes: Vec<_> = batch.results().iter().map(OperationResult::outcome).collect();
        assert_eq!(outcomes, kinds);
    }
}
