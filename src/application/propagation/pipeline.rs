//! Propagation pipeline
//!
//! Fans local fleet mutations out to every registered roaming adapter and
//! folds the per-item outcomes into one [`BatchResult`].
//!
//! Per adapter and batch:
//!
//! 1. health is checked once (`AdminDown` before `OutOfService`); an
//!    unavailable adapter gets every item short-circuited, no transport call;
//! 2. items are attempted strictly in order, one at a time, under the
//!    adapter's gate so concurrent batches do not interleave;
//! 3. one item's failure never stops its siblings.
//!
//! Different adapters run concurrently unless configured otherwise. Results
//! are ordered adapter by adapter (registration order), items in submission
//! order within each adapter.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tracing::{debug, info, warn};

use super::adapter::{AdapterError, SharedAdapter};
use super::context::PropagationContext;
use super::item::{ChargeDetailRecord, PushItem, PushKind, Pushable, PushableStatus};
use crate::application::events::SharedEventBus;
use crate::application::outcome::{BatchResult, I18nText, OperationResult, OutcomeKind};
use crate::domain::error::FleetError;
use crate::domain::events::{BatchCompletedEvent, FleetEvent, StatusChangedEvent};
use crate::domain::fleet::{
    ChargingPool, ChargingStation, ChargingStationOperator, Evse, FleetChild, FleetEntity,
    FleetParent, RoamingNetwork, StatusOwner,
};
use crate::domain::ids::{
    AuthorizatorId, ChargingPoolId, ChargingStationId, EntityRef, EvseId, OperatorId,
};
use crate::domain::status::{AdminStatus, StatusUpdate};

/// Record item outcome and transport latency to Prometheus.
fn record_outcome(adapter: &AuthorizatorId, outcome: OutcomeKind, latency: Option<Duration>) {
    metrics::counter!(
        "roaming_propagation_results_total",
        "adapter" => adapter.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
    if let Some(latency) = latency {
        metrics::histogram!("roaming_propagation_latency_seconds", "adapter" => adapter.to_string())
            .record(latency.as_secs_f64());
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Run different adapters concurrently.
    pub parallel_adapters: bool,
    /// Per-attempt timeout used when the context does not carry one.
    pub item_timeout: Option<Duration>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            parallel_adapters: true,
            item_timeout: None,
        }
    }
}

struct AdapterSlot {
    adapter: SharedAdapter,
    /// Serializes batches against this adapter.
    gate: tokio::sync::Mutex<()>,
}

enum Attempt {
    Done(Result<OperationResult, AdapterError>),
    TimedOut(Duration),
    Cancelled,
}

/// A child mutation that passed the local checks and awaits propagation.
enum Staged<C> {
    Added(Arc<C>),
    Updated { old: Arc<C>, new: Arc<C> },
    Removed(Arc<C>),
}

impl<C: Pushable> Staged<C> {
    fn push_item(&self) -> PushItem {
        match self {
            Staged::Added(child) | Staged::Removed(child) => child.push_item(),
            Staged::Updated { new, .. } => new.push_item(),
        }
    }
}

pub struct PropagationPipeline {
    hub_id: AuthorizatorId,
    adapters: RwLock<Vec<Arc<AdapterSlot>>>,
    options: PipelineOptions,
    event_bus: Option<SharedEventBus>,
}

impl std::fmt::Debug for PropagationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropagationPipeline")
            .field("hub_id", &self.hub_id)
            .field("adapters", &self.adapter_ids())
            .field("options", &self.options)
            .finish()
    }
}

impl PropagationPipeline {
    /// `hub_id` authors results the hub produces itself (vetoes, structural
    /// errors, batches without adapters).
    pub fn new(hub_id: AuthorizatorId) -> Self {
        Self {
            hub_id,
            adapters: RwLock::new(Vec::new()),
            options: PipelineOptions::default(),
            event_bus: None,
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_event_bus(mut self, event_bus: SharedEventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn hub_id(&self) -> &AuthorizatorId {
        &self.hub_id
    }

    // ── Adapter registry ───────────────────────────────────────

    /// Registers `adapter`, replacing any adapter with the same id.
    pub fn register_adapter(&self, adapter: SharedAdapter) {
        let mut adapters = self.adapters.write().unwrap_or_else(PoisonError::into_inner);
        let slot = Arc::new(AdapterSlot {
            adapter,
            gate: tokio::sync::Mutex::new(()),
        });
        let id = slot.adapter.id().clone();
        match adapters.iter_mut().find(|s| s.adapter.id() == &id) {
            Some(existing) => {
                warn!(adapter = %id, "Replacing registered adapter");
                *existing = slot;
            }
            None => {
                info!(adapter = %id, "Adapter registered");
                adapters.push(slot);
            }
        }
    }

    pub fn unregister_adapter(&self, id: &AuthorizatorId) -> Option<SharedAdapter> {
        let mut adapters = self.adapters.write().unwrap_or_else(PoisonError::into_inner);
        let index = adapters.iter().position(|s| s.adapter.id() == id)?;
        info!(adapter = %id, "Adapter unregistered");
        Some(adapters.remove(index).adapter.clone())
    }

    pub fn adapter_ids(&self) -> Vec<AuthorizatorId> {
        self.slots().iter().map(|s| s.adapter.id().clone()).collect()
    }

    pub fn adapter_count(&self) -> usize {
        self.adapters.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn slots(&self) -> Vec<Arc<AdapterSlot>> {
        self.adapters.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    // ── Batch execution ────────────────────────────────────────

    /// Pushes `items` to every registered adapter. Never fails; partial
    /// failures are reported per item.
    pub async fn execute(&self, items: Vec<PushItem>, kind: PushKind, ctx: &PropagationContext) -> BatchResult {
        let results = self.propagate(&items, kind, ctx).await;
        self.finish_batch(kind.as_str(), results, ctx)
    }

    async fn propagate(&self, items: &[PushItem], kind: PushKind, ctx: &PropagationContext) -> Vec<OperationResult> {
        if items.is_empty() {
            return Vec::new();
        }

        let slots = self.slots();
        if slots.is_empty() {
            debug!(items = items.len(), "No adapters registered");
            return items
                .iter()
                .map(|item| {
                    self.hub_result(OutcomeKind::NoOperation, item, ctx, "no roaming adapters registered")
                })
                .collect();
        }

        let per_adapter = if self.options.parallel_adapters {
            join_all(slots.iter().map(|slot| self.run_adapter(slot, items, kind, ctx))).await
        } else {
            let mut per_adapter = Vec::with_capacity(slots.len());
            for slot in &slots {
                per_adapter.push(self.run_adapter(slot, items, kind, ctx).await);
            }
            per_adapter
        };

        per_adapter.into_iter().flatten().collect()
    }

    async fn run_adapter(
        &self,
        slot: &AdapterSlot,
        items: &[PushItem],
        kind: PushKind,
        ctx: &PropagationContext,
    ) -> Vec<OperationResult> {
        let adapter = &slot.adapter;
        let id = adapter.id();

        let unavailable = if adapter.is_admin_down() {
            Some((OutcomeKind::AdminDown, "adapter is administratively disabled"))
        } else if adapter.is_out_of_service() {
            Some((OutcomeKind::OutOfService, "adapter is out of service"))
        } else {
            None
        };
        if let Some((outcome, reason)) = unavailable {
            info!(adapter = %id, %outcome, items = items.len(), "Skipping unavailable adapter");
            return items
                .iter()
                .map(|item| {
                    record_outcome(id, outcome, None);
                    local_result(id, outcome, item, ctx, reason)
                })
                .collect();
        }

        let gate = tokio::select! {
            guard = slot.gate.lock() => Some(guard),
            _ = ctx.expired() => None,
        };
        if gate.is_none() {
            warn!(adapter = %id, "Batch expired while waiting for adapter");
            return items
                .iter()
                .map(|item| {
                    record_outcome(id, OutcomeKind::Timeout, None);
                    local_result(id, OutcomeKind::Timeout, item, ctx, "batch expired before the attempt started")
                })
                .collect();
        }

        let item_timeout = ctx.item_timeout.or(self.options.item_timeout);
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let result = self.attempt(adapter, item, kind, ctx, item_timeout).await;
            debug!(adapter = %id, %item, outcome = %result.outcome(), "Item propagated");
            results.push(result);
        }
        results
    }

    async fn attempt(
        &self,
        adapter: &SharedAdapter,
        item: &PushItem,
        kind: PushKind,
        ctx: &PropagationContext,
        item_timeout: Option<Duration>,
    ) -> OperationResult {
        let id = adapter.id();

        if ctx.is_expired() {
            record_outcome(id, OutcomeKind::Timeout, None);
            return local_result(id, OutcomeKind::Timeout, item, ctx, "batch expired before the attempt started");
        }
        if !adapter.accepts(item, kind) {
            record_outcome(id, OutcomeKind::Filtered, None);
            return local_result(id, OutcomeKind::Filtered, item, ctx, "filtered by adapter");
        }

        let started = Instant::now();
        let call = async {
            match item_timeout {
                Some(limit) => match tokio::time::timeout(limit, adapter.propagate(item, kind)).await {
                    Ok(result) => Attempt::Done(result),
                    Err(_) => Attempt::TimedOut(limit),
                },
                None => Attempt::Done(adapter.propagate(item, kind).await),
            }
        };
        let attempt = tokio::select! {
            biased;
            attempt = call => attempt,
            _ = ctx.expired() => Attempt::Cancelled,
        };
        let elapsed = started.elapsed();
        let runtime = chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero());

        let result = match attempt {
            Attempt::Done(Ok(result)) => {
                let missing_payload = result.payload().is_none();
                let missing_event = result.event_id().is_none();
                let missing_runtime = result.runtime().is_none();
                let mut builder = result.rebuild();
                if missing_payload {
                    builder = builder.payload(item.clone());
                }
                if missing_event {
                    builder = builder.event_id(ctx.event_id);
                }
                if missing_runtime {
                    builder = builder.runtime(runtime);
                }
                builder.build()
            }
            Attempt::Done(Err(err)) => {
                warn!(adapter = %id, %item, error = %err, "Propagation failed");
                attempt_result(id, err.outcome_kind(), item, ctx, runtime, err.to_string())
            }
            Attempt::TimedOut(limit) => {
                warn!(adapter = %id, %item, timeout_ms = limit.as_millis() as u64, "Propagation timed out");
                attempt_result(id, OutcomeKind::Timeout, item, ctx, runtime, format!("no answer within {limit:?}"))
            }
            Attempt::Cancelled => {
                warn!(adapter = %id, %item, "Propagation cancelled");
                attempt_result(id, OutcomeKind::Timeout, item, ctx, runtime, "cancelled")
            }
        };
        record_outcome(id, result.outcome(), Some(elapsed));
        result
    }

    fn hub_result(
        &self,
        outcome: OutcomeKind,
        item: &PushItem,
        ctx: &PropagationContext,
        description: impl Into<I18nText>,
    ) -> OperationResult {
        local_result(&self.hub_id, outcome, item, ctx, description)
    }

    fn finish_batch(&self, operation: &str, results: Vec<OperationResult>, ctx: &PropagationContext) -> BatchResult {
        let batch = BatchResult::builder(self.hub_id.clone(), results)
            .event_id(ctx.event_id)
            .build();

        info!(
            event_id = %ctx.event_id,
            actor = %ctx.actor,
            operation,
            outcome = %batch.outcome(),
            items = batch.len(),
            "Batch propagated"
        );

        if let Some(bus) = &self.event_bus {
            bus.publish(FleetEvent::BatchCompleted(BatchCompletedEvent {
                event_id: ctx.event_id,
                operation: operation.to_string(),
                outcome: batch.outcome().to_string(),
                items: batch.len(),
                outcome_counts: batch
                    .count_by_kind()
                    .into_iter()
                    .map(|(kind, count)| (kind.to_string(), count))
                    .collect(),
                runtime_ms: batch.runtime().num_milliseconds(),
                timestamp: Utc::now(),
            }));
        }
        batch
    }

    // ── Lifecycle batches ──────────────────────────────────────
    //
    // Result order: hub-authored rejections first, in submission order,
    // then the adapter results (adapter by adapter, submission order within
    // each). Every result names its entity through `subject()`.

    /// Proposes and applies every addition locally, pushes the approved
    /// ones, then informs commit observers. Vetoed children yield
    /// `NoOperation`, structural errors yield `Error`.
    pub async fn add_children<P, C>(&self, parent: &P, children: Vec<C>, ctx: &PropagationContext) -> BatchResult
    where
        P: FleetParent<C>,
        C: FleetChild<Parent = P> + Pushable,
    {
        let registry = parent.children();
        let mut rejected = Vec::new();
        let mut staged = Vec::new();
        for child in children {
            let child = Arc::new(child);
            let applied = registry
                .propose_add(parent, &child, &ctx.actor, ctx.event_id)
                .and_then(|()| registry.apply_add(child.clone()));
            match applied {
                Ok(child) => staged.push(Staged::Added(child)),
                Err(err) => rejected.push(self.rejection(&err, C::ref_for(child.id()), Some(child.push_item()), ctx)),
            }
        }
        self.propagate_staged(parent, staged, rejected, PushKind::Add, ctx).await
    }

    pub async fn update_children<P, C>(&self, parent: &P, children: Vec<C>, ctx: &PropagationContext) -> BatchResult
    where
        P: FleetParent<C>,
        C: FleetChild<Parent = P> + Pushable,
    {
        let registry = parent.children();
        let mut rejected = Vec::new();
        let mut staged = Vec::new();
        for child in children {
            let new = Arc::new(child);
            let applied = registry
                .propose_update(parent, &new, &ctx.actor, ctx.event_id)
                .and_then(|_| registry.apply_update(new.clone()));
            match applied {
                Ok(old) => staged.push(Staged::Updated { old, new }),
                Err(err) => rejected.push(self.rejection(&err, C::ref_for(new.id()), Some(new.push_item()), ctx)),
            }
        }
        self.propagate_staged(parent, staged, rejected, PushKind::Update, ctx).await
    }

    /// Unknown ids yield `Error` results without a payload; their
    /// [`OperationResult::subject`] names the requested id.
    pub async fn remove_children<P, C>(&self, parent: &P, ids: Vec<C::Id>, ctx: &PropagationContext) -> BatchResult
    where
        P: FleetParent<C>,
        C: FleetChild<Parent = P> + Pushable,
    {
        let registry = parent.children();
        let mut rejected = Vec::new();
        let mut staged = Vec::new();
        for id in ids {
            let proposed = registry.propose_remove(parent, &id, &ctx.actor, ctx.event_id);
            let applied = proposed.and_then(|child| registry.apply_remove(child.id()).map(|_| child));
            match applied {
                Ok(child) => staged.push(Staged::Removed(child)),
                Err(err) => {
                    let payload = registry.get(&id).map(|child| child.push_item());
                    rejected.push(self.rejection(&err, C::ref_for(&id), payload, ctx));
                }
            }
        }
        self.propagate_staged(parent, staged, rejected, PushKind::Remove, ctx).await
    }

    async fn propagate_staged<P, C>(
        &self,
        parent: &P,
        staged: Vec<Staged<C>>,
        rejected: Vec<OperationResult>,
        kind: PushKind,
        ctx: &PropagationContext,
    ) -> BatchResult
    where
        P: FleetParent<C>,
        C: FleetChild<Parent = P> + Pushable,
    {
        let items: Vec<PushItem> = staged.iter().map(Staged::push_item).collect();
        let propagated = self.propagate(&items, kind, ctx).await;

        let registry = parent.children();
        for change in &staged {
            match change {
                Staged::Added(child) => registry.commit_add(parent, child, &ctx.actor, ctx.event_id),
                Staged::Updated { old, new } => {
                    registry.commit_update(parent, old, new, &ctx.actor, ctx.event_id)
                }
                Staged::Removed(child) => registry.commit_remove(parent, child, &ctx.actor, ctx.event_id),
            }
        }

        let mut results = rejected;
        results.extend(propagated);
        let operation = format!("{}_{}", kind, C::KIND.replace(' ', "_"));
        self.finish_batch(&operation, results, ctx)
    }

    fn rejection(
        &self,
        err: &FleetError,
        subject: EntityRef,
        item: Option<PushItem>,
        ctx: &PropagationContext,
    ) -> OperationResult {
        let outcome = if err.is_veto() {
            OutcomeKind::NoOperation
        } else {
            OutcomeKind::Error
        };
        info!(event_id = %ctx.event_id, error = %err, %outcome, "Mutation not propagated");
        let mut builder = OperationResult::builder(self.hub_id.clone(), outcome)
            .subject(subject)
            .event_id(ctx.event_id)
            .description(err.to_string());
        if let Some(item) = item {
            builder = builder.payload(item);
        }
        builder.build()
    }

    pub async fn add_operators(
        &self,
        network: &RoamingNetwork,
        operators: Vec<ChargingStationOperator>,
        ctx: &PropagationContext,
    ) -> BatchResult {
        self.add_children(network, operators, ctx).await
    }

    pub async fn update_operators(
        &self,
        network: &RoamingNetwork,
        operators: Vec<ChargingStationOperator>,
        ctx: &PropagationContext,
    ) -> BatchResult {
        self.update_children(network, operators, ctx).await
    }

    pub async fn remove_operators(
        &self,
        network: &RoamingNetwork,
        ids: Vec<OperatorId>,
        ctx: &PropagationContext,
    ) -> BatchResult {
        self.remove_children::<_, ChargingStationOperator>(network, ids, ctx).await
    }

    pub async fn add_pools(
        &self,
        operator: &ChargingStationOperator,
        pools: Vec<ChargingPool>,
        ctx: &PropagationContext,
    ) -> BatchResult {
        self.add_children(operator, pools, ctx).await
    }

    pub async fn update_pools(
        &self,
        operator: &ChargingStationOperator,
        pools: Vec<ChargingPool>,
        ctx: &PropagationContext,
    ) -> BatchResult {
        self.update_children(operator, pools, ctx).await
    }

    pub async fn remove_pools(
        &self,
        operator: &ChargingStationOperator,
        ids: Vec<ChargingPoolId>,
        ctx: &PropagationContext,
    ) -> BatchResult {
        self.remove_children::<_, ChargingPool>(operator, ids, ctx).await
    }

    pub async fn add_stations(
        &self,
        pool: &ChargingPool,
        stations: Vec<ChargingStation>,
        ctx: &PropagationContext,
    ) -> BatchResult {
        self.add_children(pool, stations, ctx).await
    }

    pub async fn update_stations(
        &self,
        pool: &ChargingPool,
        stations: Vec<ChargingStation>,
        ctx: &PropagationContext,
    ) -> BatchResult {
        self.update_children(pool, stations, ctx).await
    }

    pub async fn remove_stations(
        &self,
        pool: &ChargingPool,
        ids: Vec<ChargingStationId>,
        ctx: &PropagationContext,
    ) -> BatchResult {
        self.remove_children::<_, ChargingStation>(pool, ids, ctx).await
    }

    pub async fn add_evses(&self, station: &ChargingStation, evses: Vec<Evse>, ctx: &PropagationContext) -> BatchResult {
        self.add_children(station, evses, ctx).await
    }

    pub async fn update_evses(
        &self,
        station: &ChargingStation,
        evses: Vec<Evse>,
        ctx: &PropagationContext,
    ) -> BatchResult {
        self.update_children(station, evses, ctx).await
    }

    pub async fn remove_evses(
        &self,
        station: &ChargingStation,
        ids: Vec<EvseId>,
        ctx: &PropagationContext,
    ) -> BatchResult {
        self.remove_children::<_, Evse>(station, ids, ctx).await
    }

    // ── Status batches ─────────────────────────────────────────

    /// Records `value` through the entity's setter and pushes the transition.
    pub async fn set_status<E, S>(&self, entity: &E, value: S, at: DateTime<Utc>, ctx: &PropagationContext) -> BatchResult
    where
        E: StatusOwner<S>,
        S: PushableStatus,
    {
        let update = entity.set(value, at);
        self.publish_status_change(&update);
        self.execute(vec![S::into_push_item(update)], PushKind::Update, ctx)
            .await
    }

    pub async fn set_admin_status<E>(
        &self,
        entity: &E,
        value: AdminStatus,
        at: DateTime<Utc>,
        ctx: &PropagationContext,
    ) -> BatchResult
    where
        E: StatusOwner<AdminStatus>,
    {
        self.set_status(entity, value, at, ctx).await
    }

    /// Records every change, then pushes all transitions as one batch.
    pub async fn set_statuses<E, S>(
        &self,
        changes: Vec<(&E, S)>,
        at: DateTime<Utc>,
        ctx: &PropagationContext,
    ) -> BatchResult
    where
        E: StatusOwner<S>,
        S: PushableStatus,
    {
        let items: Vec<PushItem> = changes
            .into_iter()
            .map(|(entity, value)| {
                let update = entity.set(value, at);
                self.publish_status_change(&update);
                S::into_push_item(update)
            })
            .collect();
        self.execute(items, PushKind::Update, ctx).await
    }

    fn publish_status_change<S: PushableStatus>(&self, update: &StatusUpdate<S>) {
        let Some(bus) = &self.event_bus else {
            return;
        };
        if !update.is_change() {
            return;
        }
        bus.publish(FleetEvent::StatusChanged(StatusChangedEvent {
            entity: update.entity.clone(),
            status_kind: S::KIND.to_string(),
            old_status: update.old.value.to_string(),
            new_status: update.new.value.to_string(),
            timestamp: update.new.timestamp,
        }));
    }

    // ── Charge detail records ──────────────────────────────────

    pub async fn send_charge_detail_records(
        &self,
        cdrs: Vec<ChargeDetailRecord>,
        ctx: &PropagationContext,
    ) -> BatchResult {
        let items = cdrs.into_iter().map(PushItem::ChargeDetailRecord).collect();
        self.execute(items, PushKind::Add, ctx).await
    }
}

/// Result decided without calling the partner.
fn local_result(
    author: &AuthorizatorId,
    outcome: OutcomeKind,
    item: &PushItem,
    ctx: &PropagationContext,
    description: impl Into<I18nText>,
) -> OperationResult {
    OperationResult::builder(author.clone(), outcome)
        .payload(item.clone())
        .event_id(ctx.event_id)
        .description(description)
        .build()
}

fn attempt_result(
    author: &AuthorizatorId,
    outcome: OutcomeKind,
    item: &PushItem,
    ctx: &PropagationContext,
    runtime: chrono::Duration,
    description: impl Into<I18nText>,
) -> OperationResult {
    OperationResult::builder(author.clone(), outcome)
        .payload(item.clone())
        .event_id(ctx.event_id)
        .runtime(runtime)
        .description(description)
        .build()
}
