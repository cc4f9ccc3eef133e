//! Charging station operator (CPO)

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ChargingPool, ChargingStation, ChildRegistry, Evse, FleetChild, FleetEntity, StatusSeed};
use crate::domain::error::FleetResult;
use crate::domain::fleet::RoamingNetwork;
use crate::domain::ids::{
    Actor, ChargingPoolId, EntityRef, EventTrackingId, OperatorId, RoamingNetworkId,
};
use crate::domain::status::{
    generate_status_report, AdminStatus, EvseStatus, SiteStatus, StatusReport, StatusSchedule,
    StatusUpdate,
};

/// Data record of an operator as pushed to roaming partners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorData {
    pub id: OperatorId,
    pub network_id: RoamingNetworkId,
    pub name: String,
    pub admin_status: AdminStatus,
    pub status: SiteStatus,
    pub pool_ids: Vec<ChargingPoolId>,
}

#[derive(Debug)]
pub struct ChargingStationOperator {
    id: OperatorId,
    network_id: RoamingNetworkId,
    name: String,
    admin_status: StatusSchedule<AdminStatus>,
    status: StatusSchedule<SiteStatus>,
    pools: ChildRegistry<ChargingPool>,
}

impl ChargingStationOperator {
    pub fn new(
        id: OperatorId,
        network_id: RoamingNetworkId,
        name: impl Into<String>,
        seed: StatusSeed<SiteStatus>,
    ) -> Self {
        let owner = EntityRef::Operator(id.clone());
        Self {
            admin_status: seed.admin_schedule(owner.clone()),
            status: seed.status_schedule(owner),
            id,
            network_id,
            name: name.into(),
            pools: ChildRegistry::new(),
        }
    }

    pub fn network_id(&self) -> &RoamingNetworkId {
        &self.network_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn admin_status(&self) -> AdminStatus {
        self.admin_status.current()
    }

    pub fn status(&self) -> SiteStatus {
        self.status.current()
    }

    pub fn admin_status_schedule(&self) -> &StatusSchedule<AdminStatus> {
        &self.admin_status
    }

    pub fn status_schedule(&self) -> &StatusSchedule<SiteStatus> {
        &self.status
    }

    pub fn set_admin_status(&self, value: AdminStatus, at: DateTime<Utc>) -> StatusUpdate<AdminStatus> {
        self.admin_status.push(value, at)
    }

    pub fn set_status(&self, value: SiteStatus, at: DateTime<Utc>) -> StatusUpdate<SiteStatus> {
        self.status.push(value, at)
    }

    pub fn pools(&self) -> &ChildRegistry<ChargingPool> {
        &self.pools
    }

    pub fn get_pool(&self, id: &ChargingPoolId) -> Option<Arc<ChargingPool>> {
        self.pools.get(id)
    }

    pub fn add_pool(&self, pool: ChargingPool, actor: &Actor) -> FleetResult<Arc<ChargingPool>> {
        self.pools
            .add(self, Arc::new(pool), actor, EventTrackingId::new())
    }

    pub fn update_pool(&self, pool: ChargingPool, actor: &Actor) -> FleetResult<Arc<ChargingPool>> {
        self.pools
            .update(self, Arc::new(pool), actor, EventTrackingId::new())
    }

    pub fn remove_pool(&self, id: &ChargingPoolId, actor: &Actor) -> FleetResult<Arc<ChargingPool>> {
        self.pools.remove(self, id, actor, EventTrackingId::new())
    }

    pub fn stations(&self) -> Vec<Arc<ChargingStation>> {
        self.pools
            .all()
            .iter()
            .flat_map(|pool| pool.stations().all())
            .collect()
    }

    pub fn evses(&self) -> Vec<Arc<Evse>> {
        self.pools
            .all()
            .iter()
            .flat_map(|pool| pool.evses())
            .collect()
    }

    // ── Reports ────────────────────────────────────────────────

    pub fn evse_status_report(&self) -> StatusReport<EvseStatus> {
        generate_status_report(self.evses().iter().map(|evse| &**evse))
    }

    pub fn evse_admin_status_report(&self) -> StatusReport<AdminStatus> {
        generate_status_report(self.evses().iter().map(|evse| &**evse))
    }

    pub fn station_status_report(&self) -> StatusReport<SiteStatus> {
        generate_status_report(self.stations().iter().map(|station| &**station))
    }

    pub fn pool_status_report(&self) -> StatusReport<SiteStatus> {
        generate_status_report(self.pools.all().iter().map(|pool| &**pool))
    }

    pub fn snapshot(&self) -> OperatorData {
        OperatorData {
            id: self.id.clone(),
            network_id: self.network_id.clone(),
            name: self.name.clone(),
            admin_status: self.admin_status(),
            status: self.status(),
            pool_ids: self.pools.ids(),
        }
    }
}

impl FleetEntity for ChargingStationOperator {
    type Id = OperatorId;
    const KIND: &'static str = "operator";

    fn id(&self) -> &OperatorId {
        &self.id
    }

    fn ref_for(id: &OperatorId) -> EntityRef {
        EntityRef::Operator(id.clone())
    }
}

impl FleetChild for ChargingStationOperator {
    type Parent = RoamingNetwork;

    fn parent_id(&self) -> &RoamingNetworkId {
        &self.network_id
    }
}

status_owner!(ChargingStationOperator, AdminStatus, admin_status, set_admin_status);
status_owner!(ChargingStationOperator, SiteStatus, status, set_status);
