//! Charging station: a physical unit grouping one or more EVSEs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ChildRegistry, Evse, FleetChild, FleetEntity, StatusSeed};
use crate::domain::error::FleetResult;
use crate::domain::fleet::ChargingPool;
use crate::domain::ids::{Actor, ChargingPoolId, ChargingStationId, EntityRef, EventTrackingId, EvseId};
use crate::domain::status::{AdminStatus, SiteStatus, StatusSchedule, StatusUpdate};

/// Data record of a charging station as pushed to roaming partners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargingStationData {
    pub id: ChargingStationId,
    pub pool_id: ChargingPoolId,
    pub name: String,
    pub admin_status: AdminStatus,
    pub status: SiteStatus,
    pub evse_ids: Vec<EvseId>,
}

#[derive(Debug)]
pub struct ChargingStation {
    id: ChargingStationId,
    pool_id: ChargingPoolId,
    name: String,
    admin_status: StatusSchedule<AdminStatus>,
    status: StatusSchedule<SiteStatus>,
    evses: ChildRegistry<Evse>,
}

impl ChargingStation {
    pub fn new(
        id: ChargingStationId,
        pool_id: ChargingPoolId,
        name: impl Into<String>,
        seed: StatusSeed<SiteStatus>,
    ) -> Self {
        let owner = EntityRef::ChargingStation(id.clone());
        Self {
            admin_status: seed.admin_schedule(owner.clone()),
            status: seed.status_schedule(owner),
            id,
            pool_id,
            name: name.into(),
            evses: ChildRegistry::new(),
        }
    }

    pub fn pool_id(&self) -> &ChargingPoolId {
        &self.pool_id
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

    pub fn evses(&self) -> &ChildRegistry<Evse> {
        &self.evses
    }

    pub fn get_evse(&self, id: &EvseId) -> Option<Arc<Evse>> {
        self.evses.get(id)
    }

    pub fn add_evse(&self, evse: Evse, actor: &Actor) -> FleetResult<Arc<Evse>> {
        self.evses
            .add(self, Arc::new(evse), actor, EventTrackingId::new())
    }

    pub fn update_evse(&self, evse: Evse, actor: &Actor) -> FleetResult<Arc<Evse>> {
        self.evses
            .update(self, Arc::new(evse), actor, EventTrackingId::new())
    }

    pub fn remove_evse(&self, id: &EvseId, actor: &Actor) -> FleetResult<Arc<Evse>> {
        self.evses.remove(self, id, actor, EventTrackingId::new())
    }

    pub fn snapshot(&self) -> ChargingStationData {
        ChargingStationData {
            id: self.id.clone(),
            pool_id: self.pool_id.clone(),
            name: self.name.clone(),
            admin_status: self.admin_status(),
            status: self.status(),
            evse_ids: self.evses.ids(),
        }
    }
}

impl FleetEntity for ChargingStation {
    type Id = ChargingStationId;
    const KIND: &'static str = "charging station";

    fn id(&self) -> &ChargingStationId {
        &self.id
    }

    fn ref_for(id: &ChargingStationId) -> EntityRef {
        EntityRef::ChargingStation(id.clone())
    }
}

impl FleetChild for ChargingStation {
    type Parent = ChargingPool;

    fn parent_id(&self) -> &ChargingPoolId {
        &self.pool_id
    }
}

status_owner!(ChargingStation, AdminStatus, admin_status, set_admin_status);
status_owner!(ChargingStation, SiteStatus, status, set_status);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::FleetError;
    use crate::domain::status::EvseStatus;

    fn station() -> ChargingStation {
        ChargingStation::new("ST1".into(), "P1".into(), "Station 1", StatusSeed::default())
    }

    #[test]
    fn add_and_remove_evse() {
        let st = station();
        let actor = Actor::system();
        st.add_evse(Evse::new("E1".into(), "ST1".into(), StatusSeed::default()), &actor)
            .unwrap();
        assert_eq!(st.snapshot().evse_ids, vec![EvseId::new("E1")]);

        let removed = st.remove_evse(&"E1".into(), &actor).unwrap();
        assert_eq!(removed.id(), &EvseId::new("E1"));
        assert!(st.evses().is_empty());
    }

    #[test]
    fn duplicate_evse_is_rejected() {
        let st = station();
        let actor = Actor::system();
        let seed = StatusSeed::new(AdminStatus::Operational, EvseStatus::Available);
        st.add_evse(Evse::new("E1".into(), "ST1".into(), seed), &actor)
            .unwrap();
        let err = st
            .add_evse(Evse::new("E1".into(), "ST1".into(), seed), &actor)
            .unwrap_err();
        assert!(matches!(err, FleetError::AlreadyExists { .. }));
    }

    #[test]
    fn evse_of_another_station_is_rejected() {
        let st = station();
        let err = st
            .add_evse(Evse::new("E1".into(), "ST2".into(), StatusSeed::default()), &Actor::system())
            .unwrap_err();
        assert!(matches!(err, FleetError::InvalidArgument(_)));
    }

    #[test]
    fn update_replaces_evse() {
        let st = station();
        let actor = Actor::system();
        st.add_evse(Evse::new("E1".into(), "ST1".into(), StatusSeed::default()), &actor)
            .unwrap();
        let old = st
            .update_evse(
                Evse::new("E1".into(), "ST1".into(), StatusSeed::default()).with_max_power_kw(150.0),
                &actor,
            )
            .unwrap();
        assert_eq!(old.max_power_kw(), None);
        assert_eq!(st.get_evse(&"E1".into()).unwrap().max_power_kw(), Some(150.0));

        let missing = st
            .update_evse(Evse::new("E9".into(), "ST1".into(), StatusSeed::default()), &actor)
            .unwrap_err();
        assert!(matches!(missing, FleetError::NotFound { .. }));
    }

    #[test]
    fn status_owner_writes_through_the_entity_setter() {
        use crate::domain::fleet::StatusOwner;

        let st = station();
        let at = Utc::now();
        let update = StatusOwner::<SiteStatus>::set(&st, SiteStatus::Offline, at);

        assert!(update.is_change());
        assert_eq!(update.entity, EntityRef::ChargingStation("ST1".into()));
        assert_eq!(st.status(), SiteStatus::Offline);
        assert_eq!(st.status_schedule().current_entry().timestamp, at);
        assert_eq!(st.status_schedule().len(), 2);

        StatusOwner::<AdminStatus>::set(&st, AdminStatus::Blocked, at);
        assert_eq!(st.admin_status(), AdminStatus::Blocked);
    }
}
