//! Roaming network: root of the hierarchy

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{ChargingPool, ChargingStation, ChargingStationOperator, ChildRegistry, Evse, FleetEntity, StatusSeed};
use crate::domain::error::FleetResult;
use crate::domain::ids::{Actor, EntityRef, EventTrackingId, OperatorId, RoamingNetworkId};
use crate::domain::status::{
    generate_status_report, AdminStatus, EvseStatus, SiteStatus, StatusReport, StatusSchedule,
    StatusUpdate,
};

#[derive(Debug)]
pub struct RoamingNetwork {
    id: RoamingNetworkId,
    name: String,
    admin_status: StatusSchedule<AdminStatus>,
    status: StatusSchedule<SiteStatus>,
    operators: ChildRegistry<ChargingStationOperator>,
}

impl RoamingNetwork {
    pub fn new(id: RoamingNetworkId, name: impl Into<String>, seed: StatusSeed<SiteStatus>) -> Self {
        let owner = EntityRef::RoamingNetwork(id.clone());
        Self {
            admin_status: seed.admin_schedule(owner.clone()),
            status: seed.status_schedule(owner),
            id,
            name: name.into(),
            operators: ChildRegistry::new(),
        }
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

    pub fn operators(&self) -> &ChildRegistry<ChargingStationOperator> {
        &self.operators
    }

    pub fn get_operator(&self, id: &OperatorId) -> Option<Arc<ChargingStationOperator>> {
        self.operators.get(id)
    }

    pub fn add_operator(
        &self,
        operator: ChargingStationOperator,
        actor: &Actor,
    ) -> FleetResult<Arc<ChargingStationOperator>> {
        self.operators
            .add(self, Arc::new(operator), actor, EventTrackingId::new())
    }

    pub fn remove_operator(
        &self,
        id: &OperatorId,
        actor: &Actor,
    ) -> FleetResult<Arc<ChargingStationOperator>> {
        self.operators
            .remove(self, id, actor, EventTrackingId::new())
    }

    pub fn pools(&self) -> Vec<Arc<ChargingPool>> {
        self.operators
            .all()
            .iter()
            .flat_map(|op| op.pools().all())
            .collect()
    }

    pub fn stations(&self) -> Vec<Arc<ChargingStation>> {
        self.operators
            .all()
            .iter()
            .flat_map(|op| op.stations())
            .collect()
    }

    pub fn evses(&self) -> Vec<Arc<Evse>> {
        self.operators
            .all()
            .iter()
            .flat_map(|op| op.evses())
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
        generate_status_report(self.pools().iter().map(|pool| &**pool))
    }

    pub fn operator_status_report(&self) -> StatusReport<SiteStatus> {
        generate_status_report(self.operators.all().iter().map(|op| &**op))
    }
}

impl FleetEntity for RoamingNetwork {
    type Id = RoamingNetworkId;
    const KIND: &'static str = "roaming network";

    fn id(&self) -> &RoamingNetworkId {
        &self.id
    }

    fn ref_for(id: &RoamingNetworkId) -> EntityRef {
        EntityRef::RoamingNetwork(id.clone())
    }
}

status_owner!(RoamingNetwork, AdminStatus, admin_status, set_admin_status);
status_owner!(RoamingNetwork, SiteStatus, status, set_status);
