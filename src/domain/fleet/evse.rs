//! EVSE: the leaf of the hierarchy, one point where a vehicle charges

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{FleetChild, FleetEntity, StatusSeed};
use crate::domain::fleet::ChargingStation;
use crate::domain::ids::{ChargingStationId, EntityRef, EvseId};
use crate::domain::status::{AdminStatus, EvseStatus, StatusSchedule, StatusUpdate};

/// Data record of an EVSE as pushed to roaming partners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvseData {
    pub id: EvseId,
    pub station_id: ChargingStationId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_power_kw: Option<f64>,
    pub admin_status: AdminStatus,
    pub status: EvseStatus,
}

#[derive(Debug)]
pub struct Evse {
    id: EvseId,
    station_id: ChargingStationId,
    max_power_kw: Option<f64>,
    admin_status: StatusSchedule<AdminStatus>,
    status: StatusSchedule<EvseStatus>,
}

impl Evse {
    pub fn new(id: EvseId, station_id: ChargingStationId, seed: StatusSeed<EvseStatus>) -> Self {
        let owner = EntityRef::Evse(id.clone());
        Self {
            admin_status: seed.admin_schedule(owner.clone()),
            status: seed.status_schedule(owner),
            id,
            station_id,
            max_power_kw: None,
        }
    }

    pub fn with_max_power_kw(mut self, kw: f64) -> Self {
        self.max_power_kw = Some(kw);
        self
    }

    pub fn station_id(&self) -> &ChargingStationId {
        &self.station_id
    }

    pub fn max_power_kw(&self) -> Option<f64> {
        self.max_power_kw
    }

    pub fn admin_status(&self) -> AdminStatus {
        self.admin_status.current()
    }

    pub fn status(&self) -> EvseStatus {
        self.status.current()
    }

    pub fn admin_status_schedule(&self) -> &StatusSchedule<AdminStatus> {
        &self.admin_status
    }

    pub fn status_schedule(&self) -> &StatusSchedule<EvseStatus> {
        &self.status
    }

    pub fn set_admin_status(&self, value: AdminStatus, at: DateTime<Utc>) -> StatusUpdate<AdminStatus> {
        self.admin_status.push(value, at)
    }

    pub fn set_status(&self, value: EvseStatus, at: DateTime<Utc>) -> StatusUpdate<EvseStatus> {
        self.status.push(value, at)
    }

    pub fn snapshot(&self) -> EvseData {
        EvseData {
            id: self.id.clone(),
            station_id: self.station_id.clone(),
            max_power_kw: self.max_power_kw,
            admin_status: self.admin_status(),
            status: self.status(),
        }
    }
}

impl FleetEntity for Evse {
    type Id = EvseId;
    const KIND: &'static str = "EVSE";

    fn id(&self) -> &EvseId {
        &self.id
    }

    fn ref_for(id: &EvseId) -> EntityRef {
        EntityRef::Evse(id.clone())
    }
}

impl FleetChild for Evse {
    type Parent = ChargingStation;

    fn parent_id(&self) -> &ChargingStationId {
        &self.station_id
    }
}

status_owner!(Evse, AdminStatus, admin_status, set_admin_status);
status_owner!(Evse, EvseStatus, status, set_status);
