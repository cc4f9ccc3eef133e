//! What gets pushed to roaming partners

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::fleet::{
    ChargingPool, ChargingPoolData, ChargingStation, ChargingStationData,
    ChargingStationOperator, Evse, EvseData, OperatorData,
};
use crate::domain::ids::{EntityRef, EvseId, SessionId};
use crate::domain::status::{AdminStatus, EvseStatus, SiteStatus, StatusUpdate};

/// Kind of change being pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PushKind {
    Add,
    Update,
    Remove,
}

impl PushKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Remove => "remove",
        }
    }
}

impl fmt::Display for PushKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finished charging session, as billed to the e-mobility provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeDetailRecord {
    pub session_id: SessionId,
    pub evse_id: EvseId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    pub session_start: DateTime<Utc>,
    pub session_end: DateTime<Utc>,
    pub energy_kwh: f64,
}

/// One unit of propagation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PushItem {
    Operator(OperatorData),
    ChargingPool(ChargingPoolData),
    ChargingStation(ChargingStationData),
    Evse(EvseData),
    AdminStatus(StatusUpdate<AdminStatus>),
    SiteStatus(StatusUpdate<SiteStatus>),
    EvseStatus(StatusUpdate<EvseStatus>),
    ChargeDetailRecord(ChargeDetailRecord),
}

impl PushItem {
    /// Every value [`PushItem::item_type`] can return.
    pub const ITEM_TYPES: [&'static str; 8] = [
        "operator",
        "charging_pool",
        "charging_station",
        "evse",
        "admin_status",
        "site_status",
        "evse_status",
        "charge_detail_record",
    ];

    pub fn item_type(&self) -> &'static str {
        match self {
            Self::Operator(_) => "operator",
            Self::ChargingPool(_) => "charging_pool",
            Self::ChargingStation(_) => "charging_station",
            Self::Evse(_) => "evse",
            Self::AdminStatus(_) => "admin_status",
            Self::SiteStatus(_) => "site_status",
            Self::EvseStatus(_) => "evse_status",
            Self::ChargeDetailRecord(_) => "charge_detail_record",
        }
    }

    /// The entity the item describes. Charge detail records point at the
    /// EVSE they were recorded at.
    pub fn entity(&self) -> EntityRef {
        match self {
            Self::Operator(data) => EntityRef::Operator(data.id.clone()),
            Self::ChargingPool(data) => EntityRef::ChargingPool(data.id.clone()),
            Self::ChargingStation(data) => EntityRef::ChargingStation(data.id.clone()),
            Self::Evse(data) => EntityRef::Evse(data.id.clone()),
            Self::AdminStatus(update) => update.entity.clone(),
            Self::SiteStatus(update) => update.entity.clone(),
            Self::EvseStatus(update) => update.entity.clone(),
            Self::ChargeDetailRecord(cdr) => EntityRef::Evse(cdr.evse_id.clone()),
        }
    }

    pub fn is_status_update(&self) -> bool {
        matches!(self, Self::AdminStatus(_) | Self::SiteStatus(_) | Self::EvseStatus(_))
    }

    /// Status updates of the same entity and status kind supersede each
    /// other; nothing else does.
    pub fn coalesce_key(&self) -> Option<(EntityRef, &'static str)> {
        self.is_status_update()
            .then(|| (self.entity(), self.item_type()))
    }
}

impl fmt::Display for PushItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.item_type(), self.entity())
    }
}

/// Entities whose data record can be pushed.
pub trait Pushable {
    fn push_item(&self) -> PushItem;
}

impl Pushable for ChargingStationOperator {
    fn push_item(&self) -> PushItem {
        PushItem::Operator(self.snapshot())
    }
}

impl Pushable for ChargingPool {
    fn push_item(&self) -> PushItem {
        PushItem::ChargingPool(self.snapshot())
    }
}

impl Pushable for ChargingStation {
    fn push_item(&self) -> PushItem {
        PushItem::ChargingStation(self.snapshot())
    }
}

impl Pushable for Evse {
    fn push_item(&self) -> PushItem {
        PushItem::Evse(self.snapshot())
    }
}

/// Status value types whose transitions can be pushed.
pub trait PushableStatus: Clone + PartialEq + fmt::Display + Send + Sync + 'static {
    /// "admin", "evse" or "site"
    const KIND: &'static str;

    fn into_push_item(update: StatusUpdate<Self>) -> PushItem;
}

impl PushableStatus for AdminStatus {
    const KIND: &'static str = "admin";

    fn into_push_item(update: StatusUpdate<Self>) -> PushItem {
        PushItem::AdminStatus(update)
    }
}

impl PushableStatus for SiteStatus {
    const KIND: &'static str = "site";

    fn into_push_item(update: StatusUpdate<Self>) -> PushItem {
        PushItem::SiteStatus(update)
    }
}

impl PushableStatus for EvseStatus {
    const KIND: &'static str = "evse";

    fn into_push_item(update: StatusUpdate<Self>) -> PushItem {
        PushItem::EvseStatus(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fleet::StatusSeed;

    #[test]
    fn only_status_updates_coalesce() {
        let evse = Evse::new("E1".into(), "ST1".into(), StatusSeed::default());
        let update = evse.set_status(EvseStatus::Charging, Utc::now());
        let status = PushItem::EvseStatus(update);
        assert_eq!(
            status.coalesce_key(),
            Some((EntityRef::Evse("E1".into()), "evse_status"))
        );
        assert_eq!(evse.push_item().coalesce_key(), None);
    }

    #[test]
    fn serializes_tagged() {
        let evse = Evse::new("E1".into(), "ST1".into(), StatusSeed::default()).with_max_power_kw(22.0);
        let json = serde_json::to_value(evse.push_item()).unwrap();
        assert_eq!(json["type"], "Evse");
        assert_eq!(json["data"]["id"], "E1");
        assert_eq!(json["data"]["max_power_kw"], 22.0);
    }
}
