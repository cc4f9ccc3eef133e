//! Deferred delivery
//!
//! [`DeferredAdapter`] puts a queue in front of another adapter. Pushes are
//! accepted immediately (`Enqueued`) and delivered later by [`flush`],
//! either on demand or from the periodic flush loop. Transient failures are
//! retried with exponential backoff; everything else is final.
//!
//! [`flush`]: DeferredAdapter::flush

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::adapter::{AdapterError, RoamingAdapter, SharedAdapter};
use super::context::PropagationContext;
use super::item::{PushItem, PushKind};
use crate::application::events::SharedEventBus;
use crate::application::outcome::{OperationResult, OutcomeKind};
use crate::domain::events::{FleetEvent, QueueFlushedEvent};
use crate::domain::ids::AuthorizatorId;
use crate::shared::{CancellationSignal, RetryConfig};

pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
struct QueuedItem {
    item: PushItem,
    kind: PushKind,
    /// Failed delivery attempts so far.
    attempts: u32,
    due: Instant,
}

/// What one flush did.
#[derive(Debug, Clone, Default)]
pub struct FlushReport {
    /// One result per item looked at, in queue order.
    pub results: Vec<OperationResult>,
    pub delivered: usize,
    pub requeued: usize,
    pub failed: usize,
    /// Queue length after the flush.
    pub remaining: usize,
}

enum Delivery {
    Final(OperationResult),
    Transient { kind: OutcomeKind, reason: String },
}

/// Queue in front of another adapter.
///
/// Status updates are coalesced per entity and status kind: a newer update
/// replaces the queued one in place, keeping its queue position. The
/// replaced update is never delivered on its own. Its `Enqueued` result is
/// the last word on it, and it is settled by whatever result the flush
/// reports for its replacement. The replacement's `Enqueued` result carries
/// a warning saying it replaced a queued update.
pub struct DeferredAdapter {
    inner: SharedAdapter,
    retry: RetryConfig,
    capacity: usize,
    queue: Mutex<VecDeque<QueuedItem>>,
    flushing: tokio::sync::Mutex<()>,
    event_bus: Option<SharedEventBus>,
}

impl std::fmt::Debug for DeferredAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredAdapter")
            .field("inner", self.inner.id())
            .field("retry", &self.retry)
            .field("queued", &self.len())
            .finish()
    }
}

impl DeferredAdapter {
    pub fn new(inner: SharedAdapter, retry: RetryConfig) -> Self {
        Self {
            inner,
            retry,
            capacity: DEFAULT_QUEUE_CAPACITY,
            queue: Mutex::new(VecDeque::new()),
            flushing: tokio::sync::Mutex::new(()),
            event_bus: None,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn with_event_bus(mut self, event_bus: SharedEventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn inner(&self) -> &SharedAdapter {
        &self.inner
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<QueuedItem>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of the queued items in delivery order.
    pub fn pending(&self) -> Vec<PushItem> {
        self.lock().iter().map(|q| q.item.clone()).collect()
    }

    fn record_queue_length(&self, len: usize) {
        metrics::gauge!("roaming_deferred_queue_length", "adapter" => self.inner.id().to_string())
            .set(len as f64);
    }

    /// Queues `item`; a queued status update for the same entity and status
    /// kind is replaced in place.
    fn enqueue(&self, item: &PushItem, kind: PushKind) -> Result<OperationResult, AdapterError> {
        let mut queue = self.lock();
        let entry = QueuedItem {
            item: item.clone(),
            kind,
            attempts: 0,
            due: Instant::now(),
        };

        let key = item.coalesce_key();
        let existing = key
            .as_ref()
            .and_then(|key| queue.iter_mut().find(|q| q.item.coalesce_key().as_ref() == Some(key)));
        let superseded = match existing {
            Some(slot) => {
                *slot = entry;
                true
            }
            None => {
                if queue.len() >= self.capacity {
                    warn!(adapter = %self.inner.id(), capacity = self.capacity, "Deferred queue full");
                    return Err(AdapterError::transport("deferred delivery queue is full"));
                }
                queue.push_back(entry);
                false
            }
        };
        let len = queue.len();
        drop(queue);

        self.record_queue_length(len);
        debug!(adapter = %self.inner.id(), %item, superseded, queued = len, "Item enqueued");

        let mut result = OperationResult::builder(self.inner.id().clone(), OutcomeKind::Enqueued)
            .payload(item.clone())
            .description("queued for delivery");
        if superseded {
            result = result.warning("replaced a queued update for the same entity");
        }
        Ok(result.build())
    }

    /// Delivers every due item in FIFO order.
    pub async fn flush(&self, ctx: &PropagationContext) -> FlushReport {
        let _flushing = self.flushing.lock().await;
        let id = self.inner.id().clone();

        if self.inner.is_admin_down() || self.inner.is_out_of_service() {
            let queue = self.lock();
            let results = queue
                .iter()
                .map(|q| {
                    OperationResult::builder(id.clone(), OutcomeKind::Enqueued)
                        .payload(q.item.clone())
                        .event_id(ctx.event_id)
                        .warning("partner unavailable, kept in queue")
                        .build()
                })
                .collect();
            let remaining = queue.len();
            drop(queue);
            debug!(adapter = %id, remaining, "Partner unavailable, flush skipped");
            return self.report(FlushReport {
                results,
                remaining,
                ..FlushReport::default()
            });
        }

        let now = Instant::now();
        let due: Vec<QueuedItem> = {
            let mut queue = self.lock();
            let (due, later): (Vec<_>, Vec<_>) = queue.drain(..).partition(|q| q.due <= now);
            queue.extend(later);
            due
        };

        let mut report = FlushReport::default();
        let mut requeue = Vec::new();
        let mut entries = due.into_iter();

        while let Some(mut entry) = entries.next() {
            if ctx.is_expired() {
                debug!(adapter = %id, "Flush interrupted, keeping remaining items");
                requeue.push(entry);
                requeue.extend(entries.by_ref());
                break;
            }

            match self.deliver(&entry, ctx).await {
                Delivery::Final(result) => {
                    if result.outcome().is_accepted() {
                        report.delivered += 1;
                    } else {
                        report.failed += 1;
                        warn!(adapter = %id, item = %entry.item, outcome = %result.outcome(), "Queued item rejected");
                    }
                    report.results.push(result);
                }
                Delivery::Transient { kind, reason } => {
                    entry.attempts += 1;
                    if self.retry.is_exhausted(entry.attempts) {
                        warn!(
                            adapter = %id,
                            item = %entry.item,
                            attempts = entry.attempts,
                            error = %reason,
                            "Giving up on queued item"
                        );
                        report.failed += 1;
                        report.results.push(
                            OperationResult::builder(id.clone(), kind)
                                .payload(entry.item.clone())
                                .event_id(ctx.event_id)
                                .description(format!("gave up after {} attempts: {reason}", entry.attempts))
                                .build(),
                        );
                    } else {
                        let delay = self.retry.delay_for_attempt(entry.attempts);
                        debug!(
                            adapter = %id,
                            item = %entry.item,
                            attempts = entry.attempts,
                            retry_in_ms = delay.as_millis() as u64,
                            "Transient failure, requeued"
                        );
                        report.requeued += 1;
                        report.results.push(
                            OperationResult::builder(id.clone(), OutcomeKind::Enqueued)
                                .payload(entry.item.clone())
                                .event_id(ctx.event_id)
                                .warning(format!("attempt {} failed: {reason}", entry.attempts))
                                .build(),
                        );
                        entry.due = Instant::now() + delay;
                        requeue.push(entry);
                    }
                }
            }
        }

        report.remaining = self.requeue_front(requeue);
        info!(
            adapter = %id,
            delivered = report.delivered,
            requeued = report.requeued,
            failed = report.failed,
            remaining = report.remaining,
            "Deferred queue flushed"
        );
        self.report(report)
    }

    async fn deliver(&self, entry: &QueuedItem, ctx: &PropagationContext) -> Delivery {
        let call = self.inner.propagate(&entry.item, entry.kind);
        let outcome = match ctx.item_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => Err(AdapterError::Timeout(limit)),
            },
            None => call.await,
        };

        match outcome {
            Ok(result) if result.outcome().is_retryable() => Delivery::Transient {
                kind: result.outcome(),
                reason: result
                    .description()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| result.outcome().to_string()),
            },
            Ok(result) => {
                let missing_payload = result.payload().is_none();
                let mut builder = result.rebuild().event_id(ctx.event_id);
                if missing_payload {
                    builder = builder.payload(entry.item.clone());
                }
                Delivery::Final(builder.build())
            }
            Err(err) if err.outcome_kind().is_retryable() => Delivery::Transient {
                kind: err.outcome_kind(),
                reason: err.to_string(),
            },
            Err(err) => Delivery::Final(
                OperationResult::builder(self.inner.id().clone(), err.outcome_kind())
                    .payload(entry.item.clone())
                    .event_id(ctx.event_id)
                    .description(err.to_string())
                    .build(),
            ),
        }
    }

    /// Puts retried items back ahead of anything enqueued during the flush,
    /// unless a newer update for the same entity arrived meanwhile.
    fn requeue_front(&self, requeue: Vec<QueuedItem>) -> usize {
        let mut queue = self.lock();
        for entry in requeue.into_iter().rev() {
            let superseded = entry
                .item
                .coalesce_key()
                .is_some_and(|key| queue.iter().any(|q| q.item.coalesce_key().as_ref() == Some(&key)));
            if superseded {
                debug!(item = %entry.item, "Dropping retried update superseded by a newer one");
                continue;
            }
            queue.push_front(entry);
        }
        let len = queue.len();
        drop(queue);
        self.record_queue_length(len);
        len
    }

    fn report(&self, report: FlushReport) -> FlushReport {
        if let Some(bus) = &self.event_bus {
            bus.publish(FleetEvent::QueueFlushed(QueueFlushedEvent {
                adapter: self.inner.id().to_string(),
                delivered: report.delivered,
                requeued: report.requeued,
                failed: report.failed,
                remaining: report.remaining,
                timestamp: Utc::now(),
            }));
        }
        report
    }

    /// Flushes every `interval` until `shutdown` is triggered.
    pub fn spawn_flush_loop(
        self: Arc<Self>,
        interval: Duration,
        item_timeout: Option<Duration>,
        shutdown: CancellationSignal,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let id = self.inner.id().clone();
            info!(adapter = %id, interval_ms = interval.as_millis() as u64, "📮 Deferred flush loop started");

            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if self.is_empty() {
                            continue;
                        }
                        let mut ctx = PropagationContext::system().with_cancellation(shutdown.clone());
                        ctx.item_timeout = item_timeout;
                        self.flush(&ctx).await;
                    }
                    _ = shutdown.cancelled() => {
                        info!(adapter = %id, remaining = self.len(), "📮 Deferred flush loop shutting down");
                        break;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl RoamingAdapter for DeferredAdapter {
    fn id(&self) -> &AuthorizatorId {
        self.inner.id()
    }

    fn is_admin_down(&self) -> bool {
        self.inner.is_admin_down()
    }

    /// Never: outages of the partner are absorbed by the queue.
    fn is_out_of_service(&self) -> bool {
        false
    }

    fn accepts(&self, item: &PushItem, kind: PushKind) -> bool {
        self.inner.accepts(item, kind)
    }

    async fn propagate(&self, item: &PushItem, kind: PushKind) -> Result<OperationResult, AdapterError> {
        self.enqueue(item, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::propagation::testing::ScriptedAdapter;
    use crate::application::propagation::{Pushable, PropagationPipeline};
    use crate::domain::fleet::{Evse, StatusSeed};
    use crate::domain::status::EvseStatus;

    fn retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::ZERO,
            backoff_multiplier: 2.0,
            max_delay: Duration::ZERO,
        }
    }

    fn evse(id: &str) -> Evse {
        Evse::new(id.into(), "ST1".into(), StatusSeed::default())
    }

    fn deferred(inner: &Arc<ScriptedAdapter>, max_attempts: u32) -> DeferredAdapter {
        DeferredAdapter::new(inner.clone(), retry(max_attempts))
    }

    #[tokio::test]
    async fn propagate_answers_enqueued_without_calling_partner() {
        let inner = Arc::new(ScriptedAdapter::new("partner"));
        let queue = deferred(&inner, 3);

        let result = queue.propagate(&evse("E1").push_item(), PushKind::Add).await.unwrap();

        assert_eq!(result.outcome(), OutcomeKind::Enqueued);
        assert_eq!(queue.len(), 1);
        assert_eq!(inner.call_count(), 0);
    }

    #[tokio::test]
    async fn status_updates_for_same_entity_coalesce() {
        let inner = Arc::new(ScriptedAdapter::new("partner"));
        let queue = deferred(&inner, 3);
        let e1 = evse("E1");

        let first = PushItem::EvseStatus(e1.set_status(EvseStatus::Charging, Utc::now()));
        let second = PushItem::EvseStatus(e1.set_status(EvseStatus::Available, Utc::now()));
        queue.propagate(&first, PushKind::Update).await.unwrap();
        let result = queue.propagate(&second, PushKind::Update).await.unwrap();
        queue.propagate(&evse("E2").push_item(), PushKind::Add).await.unwrap();

        assert_eq!(result.warnings().len(), 1);
        assert_eq!(queue.pending()[0], second);
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn replaced_update_is_settled_by_its_replacement() {
        let inner = Arc::new(ScriptedAdapter::new("partner"));
        let queue = deferred(&inner, 3);
        let e1 = evse("E1");

        let first = PushItem::EvseStatus(e1.set_status(EvseStatus::Charging, Utc::now()));
        let second = PushItem::EvseStatus(e1.set_status(EvseStatus::Available, Utc::now()));
        queue.propagate(&first, PushKind::Update).await.unwrap();
        queue.propagate(&second, PushKind::Update).await.unwrap();

        let report = queue.flush(&PropagationContext::system()).await;

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].payload(), Some(&second));
        assert_eq!(inner.calls(), vec![second]);
    }

    #[tokio::test]
    async fn flush_delivers_in_fifo_order() {
        let inner = Arc::new(ScriptedAdapter::new("partner"));
        let queue = deferred(&inner, 3);
        for id in ["E1", "E2", "E3"] {
            queue.propagate(&evse(id).push_item(), PushKind::Add).await.unwrap();
        }

        let report = queue.flush(&PropagationContext::system()).await;

        assert_eq!(report.delivered, 3);
        assert_eq!(report.remaining, 0);
        let delivered: Vec<_> = inner.calls().iter().map(|i| i.entity().id().to_string()).collect();
        assert_eq!(delivered, vec!["E1", "E2", "E3"]);
    }

    #[tokio::test]
    async fn transient_failures_retry_until_exhausted() {
        let inner = Arc::new(ScriptedAdapter::new("partner").with_script(vec![
            Err(AdapterError::transport("connection reset")),
            Err(AdapterError::transport("connection reset")),
        ]));
        let queue = deferred(&inner, 2);
        queue.propagate(&evse("E1").push_item(), PushKind::Add).await.unwrap();
        let ctx = PropagationContext::system();

        let first = queue.flush(&ctx).await;
        assert_eq!(first.requeued, 1);
        assert_eq!(first.results[0].outcome(), OutcomeKind::Enqueued);
        assert_eq!(queue.len(), 1);

        let second = queue.flush(&ctx).await;
        assert_eq!(second.failed, 1);
        assert_eq!(second.results[0].outcome(), OutcomeKind::Error);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn rejections_are_final() {
        let inner = Arc::new(ScriptedAdapter::new("partner").with_script(vec![Ok(OutcomeKind::UnknownLocation)]));
        let queue = deferred(&inner, 5);
        queue.propagate(&evse("E1").push_item(), PushKind::Add).await.unwrap();

        let report = queue.flush(&PropagationContext::system()).await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.results[0].outcome(), OutcomeKind::UnknownLocation);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn unavailable_partner_keeps_queue() {
        let inner = Arc::new(ScriptedAdapter::new("partner"));
        let queue = deferred(&inner, 3);
        queue.propagate(&evse("E1").push_item(), PushKind::Add).await.unwrap();
        inner.switches.set_out_of_service(true);

        let report = queue.flush(&PropagationContext::system()).await;

        assert_eq!(report.results[0].outcome(), OutcomeKind::Enqueued);
        assert_eq!(report.results[0].warnings().len(), 1);
        assert_eq!(report.remaining, 1);
        assert_eq!(inner.call_count(), 0);
    }

    #[tokio::test]
    async fn pipeline_sees_out_of_service_partner_as_enqueued() {
        let inner = Arc::new(ScriptedAdapter::new("partner"));
        inner.switches.set_out_of_service(true);
        let pipeline = PropagationPipeline::new("hub".into());
        pipeline.register_adapter(Arc::new(deferred(&inner, 3)));

        let batch = pipeline
            .execute(vec![evse("E1").push_item()], PushKind::Add, &PropagationContext::system())
            .await;
        assert_eq!(batch.outcome(), OutcomeKind::Enqueued);

        inner.switches.set_admin_down(true);
        let batch = pipeline
            .execute(vec![evse("E2").push_item()], PushKind::Add, &PropagationContext::system())
            .await;
        assert_eq!(batch.outcome(), OutcomeKind::AdminDown);
    }

    #[tokio::test]
    async fn full_queue_rejects_new_items() {
        let inner = Arc::new(ScriptedAdapter::new("partner"));
        let queue = deferred(&inner, 3).with_capacity(1);
        queue.propagate(&evse("E1").push_item(), PushKind::Add).await.unwrap();
        let err = queue.propagate(&evse("E2").push_item(), PushKind::Add).await.unwrap_err();
        assert_eq!(err.outcome_kind(), OutcomeKind::Error);
    }

    #[tokio::test]
    async fn flush_loop_stops_on_shutdown() {
        let inner = Arc::new(ScriptedAdapter::new("partner"));
        let queue = Arc::new(deferred(&inner, 3));
        queue.propagate(&evse("E1").push_item(), PushKind::Add).await.unwrap();
        let shutdown = CancellationSignal::new();

        let handle = queue
            .clone()
            .spawn_flush_loop(Duration::from_millis(10), None, shutdown.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop should stop")
            .unwrap();

        assert!(queue.is_empty());
        assert_eq!(inner.call_count(), 1);
    }
}
