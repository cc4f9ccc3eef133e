//! Adapter that delivers nowhere
//!
//! Serializes every push to JSON, logs it and answers `Success`. Useful for
//! staging a new network before real partners are connected and for
//! checking what a partner would receive.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::application::outcome::{OperationResult, OutcomeKind};
use crate::application::propagation::{AdapterError, AdapterSwitches, PushItem, PushKind, RoamingAdapter};
use crate::config::AdapterConfig;
use crate::domain::ids::AuthorizatorId;

pub struct DryRunAdapter {
    id: AuthorizatorId,
    switches: AdapterSwitches,
    /// Empty accepts everything.
    item_types: HashSet<String>,
    delivered: DashMap<&'static str, u64>,
    sequence: AtomicU64,
}

impl DryRunAdapter {
    pub fn new(id: impl Into<AuthorizatorId>) -> Self {
        Self {
            id: id.into(),
            switches: AdapterSwitches::default(),
            item_types: HashSet::new(),
            delivered: DashMap::new(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &AdapterConfig) -> Self {
        let adapter = Self::new(config.id.as_str()).with_item_types(config.item_types.iter().cloned());
        adapter.switches.set_admin_down(config.admin_down);
        adapter.switches.set_out_of_service(config.out_of_service);
        adapter
    }

    pub fn with_item_types(mut self, item_types: impl IntoIterator<Item = String>) -> Self {
        self.item_types = item_types.into_iter().collect();
        self
    }

    pub fn switches(&self) -> &AdapterSwitches {
        &self.switches
    }

    /// Pushes delivered so far for one item type.
    pub fn delivered(&self, item_type: &str) -> u64 {
        self.delivered.get(item_type).map(|count| *count).unwrap_or(0)
    }

    pub fn total_delivered(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoamingAdapter for DryRunAdapter {
    fn id(&self) -> &AuthorizatorId {
        &self.id
    }

    fn is_admin_down(&self) -> bool {
        self.switches.is_admin_down()
    }

    fn is_out_of_service(&self) -> bool {
        self.switches.is_out_of_service()
    }

    fn accepts(&self, item: &PushItem, _kind: PushKind) -> bool {
        self.item_types.is_empty() || self.item_types.contains(item.item_type())
    }

    async fn propagate(&self, item: &PushItem, kind: PushKind) -> Result<OperationResult, AdapterError> {
        let body = serde_json::to_string(item).map_err(|e| AdapterError::Conversion {
            item: item.to_string(),
            reason: e.to_string(),
        })?;

        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        *self.delivered.entry(item.item_type()).or_insert(0) += 1;

        info!(
            adapter = %self.id,
            seq,
            kind = %kind,
            item_type = item.item_type(),
            entity = %item.entity(),
            "🧪 Dry-run push"
        );
        debug!(adapter = %self.id, seq, body = %body, "Dry-run payload");

        Ok(OperationResult::builder(self.id.clone(), OutcomeKind::Success)
            .payload(item.clone())
            .description(format!("dry run #{seq}: {kind} {item}"))
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::propagation::Pushable;
    use crate::domain::fleet::{Evse, StatusSeed};

    fn evse_item() -> PushItem {
        Evse::new("DE*GEF*E1*1".into(), "ST1".into(), StatusSeed::default()).push_item()
    }

    #[tokio::test]
    async fn answers_success_and_counts_per_type() {
        let adapter = DryRunAdapter::new("dry");
        let item = evse_item();

        let result = adapter.propagate(&item, PushKind::Add).await.unwrap();
        assert_eq!(result.outcome(), OutcomeKind::Success);
        assert_eq!(result.authorizator_id().as_str(), "dry");
        assert_eq!(result.payload(), Some(&item));

        adapter.propagate(&item, PushKind::Update).await.unwrap();
        assert_eq!(adapter.delivered("evse"), 2);
        assert_eq!(adapter.delivered("operator"), 0);
        assert_eq!(adapter.total_delivered(), 2);
    }

    #[test]
    fn item_type_filter_and_switches_come_from_config() {
        let mut config = AdapterConfig::new("partner");
        config.item_types = vec!["evse_status".into()];
        config.out_of_service = true;

        let adapter = DryRunAdapter::from_config(&config);
        assert!(!adapter.accepts(&evse_item(), PushKind::Add));
        assert!(adapter.is_out_of_service());
        assert!(!adapter.is_admin_down());

        assert!(DryRunAdapter::new("all").accepts(&evse_item(), PushKind::Remove));
    }
}
