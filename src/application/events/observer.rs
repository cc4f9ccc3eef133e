//! Commit observer that republishes child lifecycle commits on the event bus

use std::sync::Arc;

use chrono::Utc;

use super::event_bus::EventBus;
use crate::domain::events::{
    ChildChange, ChildLifecycleEvent, CommitObserver, FleetEvent, LifecycleEvent, LifecycleKind,
    ObserverFault, SubscriptionId,
};
use crate::domain::fleet::{
    ChargingPool, ChargingStation, ChargingStationOperator, ChildRegistry, Evse, FleetChild,
    FleetEntity,
};

/// Entities whose own child registries get a publisher once the entity is
/// committed below a published parent.
pub trait NestedRegistries {
    fn attach_nested(&self, bus: &Arc<EventBus>);
}

impl NestedRegistries for ChargingStationOperator {
    fn attach_nested(&self, bus: &Arc<EventBus>) {
        EventBusCommitObserver::attach(bus.clone(), self.pools());
    }
}

impl NestedRegistries for ChargingPool {
    fn attach_nested(&self, bus: &Arc<EventBus>) {
        EventBusCommitObserver::attach(bus.clone(), self.stations());
    }
}

impl NestedRegistries for ChargingStation {
    fn attach_nested(&self, bus: &Arc<EventBus>) {
        EventBusCommitObserver::attach(bus.clone(), self.evses());
    }
}

impl NestedRegistries for Evse {
    fn attach_nested(&self, _bus: &Arc<EventBus>) {}
}

#[derive(Debug, Clone)]
pub struct EventBusCommitObserver {
    bus: Arc<EventBus>,
}

impl EventBusCommitObserver {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    /// Subscribes a publisher for additions, updates and removals of
    /// `registry`'s children.
    ///
    /// The publisher follows the hierarchy down: children already in the
    /// registry, and every child committed later, get their own registries
    /// attached as well. The returned ids cover `registry` only.
    pub fn attach<C>(bus: Arc<EventBus>, registry: &ChildRegistry<C>) -> Vec<SubscriptionId>
    where
        C: FleetChild + NestedRegistries + 'static,
        C::Parent: 'static,
    {
        let observer = Arc::new(Self::new(bus.clone()));
        let ids = [LifecycleKind::Addition, LifecycleKind::Update, LifecycleKind::Removal]
            .into_iter()
            .map(|kind| registry.notifier().subscribe_commit(kind, observer.clone()))
            .collect();
        for child in registry.all() {
            child.attach_nested(&bus);
        }
        ids
    }
}

impl<P, C> CommitObserver<P, C> for EventBusCommitObserver
where
    P: FleetEntity,
    C: FleetEntity + NestedRegistries,
{
    fn name(&self) -> &str {
        "event-bus"
    }

    fn committed(&self, event: &LifecycleEvent<'_, P, C>) -> Result<(), ObserverFault> {
        let payload = ChildLifecycleEvent {
            parent: event.parent.entity_ref(),
            child: event.change.subject().entity_ref(),
            actor: event.actor.as_str().to_owned(),
            event_id: event.event_id,
            timestamp: Utc::now(),
        };
        self.bus.publish(match event.change {
            ChildChange::Added(child) => {
                child.attach_nested(&self.bus);
                FleetEvent::ChildAdded(payload)
            }
            ChildChange::Updated { new, .. } => {
                new.attach_nested(&self.bus);
                FleetEvent::ChildUpdated(payload)
            }
            ChildChange::Removed(_) => FleetEvent::ChildRemoved(payload),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fleet::StatusSeed;
    use crate::domain::ids::Actor;

    #[tokio::test]
    async fn publishes_committed_additions() {
        let bus = Arc::new(EventBus::new());
        let mut subscriber = bus.subscribe();
        let pool = ChargingPool::new("P1".into(), "OP1".into(), "Pool", StatusSeed::default());
        let ids = EventBusCommitObserver::attach(bus.clone(), pool.stations());
        assert_eq!(ids.len(), 3);

        pool.add_station(
            ChargingStation::new("ST1".into(), "P1".into(), "Station", StatusSeed::default()),
            &Actor::new("admin"),
        )
        .unwrap();

        let message = subscriber.recv().await.unwrap();
        match message.event {
            FleetEvent::ChildAdded(e) => {
                assert_eq!(e.child.to_string(), "charging_station:ST1");
                assert_eq!(e.parent.to_string(), "charging_pool:P1");
                assert_eq!(e.actor, "admin");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn publisher_follows_committed_children_down_the_hierarchy() {
        let bus = Arc::new(EventBus::new());
        let mut subscriber = bus.subscribe();
        let actor = Actor::system();
        let pool = ChargingPool::new("P1".into(), "OP1".into(), "Pool", StatusSeed::default());
        EventBusCommitObserver::attach(bus.clone(), pool.stations());

        let station = pool
            .add_station(
                ChargingStation::new("ST1".into(), "P1".into(), "Station", StatusSeed::default()),
                &actor,
            )
            .unwrap();
        station
            .add_evse(Evse::new("E1".into(), "ST1".into(), StatusSeed::default()), &actor)
            .unwrap();

        let mut children = Vec::new();
        while let Some(message) = subscriber.try_recv() {
            if let FleetEvent::ChildAdded(e) = message.event {
                children.push(e.child.to_string());
            }
        }
        assert_eq!(children, vec!["charging_station:ST1", "evse:E1"]);
    }

    #[test]
    fn attaching_covers_children_already_present() {
        let bus = Arc::new(EventBus::new());
        let actor = Actor::system();
        let pool = ChargingPool::new("P1".into(), "OP1".into(), "Pool", StatusSeed::default());
        let station = pool
            .add_station(
                ChargingStation::new("ST1".into(), "P1".into(), "Station", StatusSeed::default()),
                &actor,
            )
            .unwrap();
        assert_eq!(station.evses().notifier().committer_count(), 0);

        EventBusCommitObserver::attach(bus, pool.stations());
        assert_eq!(station.evses().notifier().committer_count(), 3);
    }
}
