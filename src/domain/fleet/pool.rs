//! Charging pool: a site with one or more charging stations

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ChargingStation, ChildRegistry, Evse, FleetChild, FleetEntity, StatusSeed};
use crate::domain::error::FleetResult;
use crate::domain::fleet::ChargingStationOperator;
use crate::domain::ids::{
    Actor, ChargingPoolId, ChargingStationId, EntityRef, EventTrackingId, OperatorId,
};
use crate::domain::status::{AdminStatus, SiteStatus, StatusSchedule, StatusUpdate};

/// Data record of a charging pool as pushed to roaming partners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargingPoolData {
    pub id: ChargingPoolId,
    pub operator_id: OperatorId,
    pub name: String,
    pub admin_status: AdminStatus,
    pub status: SiteStatus,
    pub station_ids: Vec<ChargingStationId>,
}

#[derive(Debug)]
pub struct ChargingPool {
    id: ChargingPoolId,
    operator_id: OperatorId,
    name: String,
    admin_status: StatusSchedule<AdminStatus>,
    status: StatusSchedule<SiteStatus>,
    stations: ChildRegistry<ChargingStation>,
}

impl ChargingPool {
    pub fn new(
        id: ChargingPoolId,
        operator_id: OperatorId,
        name: impl Into<String>,
        seed: StatusSeed<SiteStatus>,
    ) -> Self {
        let owner = EntityRef::ChargingPool(id.clone());
        Self {
            admin_status: seed.admin_schedule(owner.clone()),
            status: seed.status_schedule(owner),
            id,
            operator_id,
            name: name.into(),
            stations: ChildRegistry::new(),
        }
    }

    pub fn operator_id(&self) -> &OperatorId {
        &self.operator_id
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

    pub fn stations(&self) -> &ChildRegistry<ChargingStation> {
        &self.stations
    }

    pub fn get_station(&self, id: &ChargingStationId) -> Option<Arc<ChargingStation>> {
        self.stations.get(id)
    }

    pub fn add_station(&self, station: ChargingStation, actor: &Actor) -> FleetResult<Arc<ChargingStation>> {
        self.stations
            .add(self, Arc::new(station), actor, EventTrackingId::new())
    }

    pub fn update_station(
        &self,
        station: ChargingStation,
        actor: &Actor,
    ) -> FleetResult<Arc<ChargingStation>> {
        self.stations
            .update(self, Arc::new(station), actor, EventTrackingId::new())
    }

    pub fn remove_station(
        &self,
        id: &ChargingStationId,
        actor: &Actor,
    ) -> FleetResult<Arc<ChargingStation>> {
        self.stations
            .remove(self, id, actor, EventTrackingId::new())
    }

    /// All EVSEs of all stations of this pool.
    pub fn evses(&self) -> Vec<Arc<Evse>> {
        self.stations
            .all()
            .iter()
            .flat_map(|station| station.evses().all())
            .collect()
    }

    pub fn snapshot(&self) -> ChargingPoolData {
        ChargingPoolData {
            id: self.id.clone(),
            operator_id: self.operator_id.clone(),
            name: self.name.clone(),
            admin_status: self.admin_status(),
            status: self.status(),
            station_ids: self.stations.ids(),
        }
    }
}

impl FleetEntity for ChargingPool {
    type Id = ChargingPoolId;
    const KIND: &'static str = "charging pool";

    fn id(&self) -> &ChargingPoolId {
        &self.id
    }

    fn ref_for(id: &ChargingPoolId) -> EntityRef {
        EntityRef::ChargingPool(id.clone())
    }
}

impl FleetChild for ChargingPool {
    type Parent = ChargingStationOperator;

    fn parent_id(&self) -> &OperatorId {
        &self.operator_id
    }
}

status_owner!(ChargingPool, AdminStatus, admin_status, set_admin_status);
status_owner!(ChargingPool, SiteStatus, status, set_status);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::FleetError;
    use crate::domain::events::{
        CommitObserver, LifecycleEvent, LifecycleKind, MutationVoter, ObserverFault,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoNewStations;

    impl MutationVoter<ChargingPool, ChargingStation> for NoNewStations {
        fn name(&self) -> &str {
            "no-new-stations"
        }

        fn vote(
            &self,
            _event: &LifecycleEvent<'_, ChargingPool, ChargingStation>,
        ) -> Result<bool, ObserverFault> {
            Ok(false)
        }
    }

    #[derive(Default)]
    struct CountCommits(AtomicUsize);

    impl CommitObserver<ChargingPool, ChargingStation> for CountCommits {
        fn committed(
            &self,
            _event: &LifecycleEvent<'_, ChargingPool, ChargingStation>,
        ) -> Result<(), ObserverFault> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn pool() -> ChargingPool {
        ChargingPool::new("P1".into(), "OP1".into(), "Pool 1", StatusSeed::default())
    }

    fn station(id: &str) -> ChargingStation {
        ChargingStation::new(id.into(), "P1".into(), id, StatusSeed::default())
    }

    #[test]
    fn veto_aborts_add_without_side_effects() {
        let pool = pool();
        let commits = Arc::new(CountCommits::default());
        pool.stations()
            .notifier()
            .subscribe_voter(LifecycleKind::Addition, Arc::new(NoNewStations));
        pool.stations()
            .notifier()
            .subscribe_commit(LifecycleKind::Addition, commits.clone());
        let history_before = pool.status_schedule().history_all();

        let err = pool.add_station(station("ST1"), &Actor::system()).unwrap_err();

        assert!(err.is_veto());
        assert!(pool.stations().is_empty());
        assert_eq!(pool.status_schedule().history_all(), history_before);
        assert_eq!(commits.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn approved_add_commits_once() {
        let pool = pool();
        let commits = Arc::new(CountCommits::default());
        pool.stations()
            .notifier()
            .subscribe_commit(LifecycleKind::Addition, commits.clone());

        pool.add_station(station("ST1"), &Actor::system()).unwrap();

        assert_eq!(pool.stations().len(), 1);
        assert_eq!(commits.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removal_of_unknown_station_fails() {
        let err = pool()
            .remove_station(&"nope".into(), &Actor::system())
            .unwrap_err();
        assert!(matches!(err, FleetError::NotFound { entity: "charging station", .. }));
    }

    #[test]
    fn evses_walks_all_stations() {
        let pool = pool();
        let actor = Actor::system();
        let st1 = pool.add_station(station("ST1"), &actor).unwrap();
        let st2 = pool.add_station(station("ST2"), &actor).unwrap();
        st1.add_evse(Evse::new("E1".into(), "ST1".into(), StatusSeed::default()), &actor)
            .unwrap();
        st2.add_evse(Evse::new("E2".into(), "ST2".into(), StatusSeed::default()), &actor)
            .unwrap();
        assert_eq!(pool.evses().len(), 2);
    }
}
