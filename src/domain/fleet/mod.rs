//! Charging infrastructure hierarchy
//!
//! ```text
//! RoamingNetwork ─► ChargingStationOperator ─► ChargingPool ─► ChargingStation ─► Evse
//! ```
//!
//! Every node owns an admin-status and an operational-status schedule.
//! Every non-leaf node owns a [`ChildRegistry`] for its children together
//! with the notifier that lets observers veto child mutations.

use std::fmt;
use std::num::NonZeroUsize;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::EntityRef;
use crate::domain::status::{AdminStatus, StatusSchedule, StatusSource, StatusUpdate, DEFAULT_HISTORY_SIZE};

pub use evse::{Evse, EvseData};
pub use network::RoamingNetwork;
pub use operator::{ChargingStationOperator, OperatorData};
pub use pool::{ChargingPool, ChargingPoolData};
pub use registry::ChildRegistry;
pub use station::{ChargingStation, ChargingStationData};

/// A node of the hierarchy.
pub trait FleetEntity: Send + Sync {
    type Id: Clone + Ord + fmt::Display + fmt::Debug + Send + Sync;

    /// Human readable kind, used in errors and logs.
    const KIND: &'static str;

    fn id(&self) -> &Self::Id;

    /// Reference to the entity with `id`, which need not exist.
    fn ref_for(id: &Self::Id) -> EntityRef;

    fn entity_ref(&self) -> EntityRef {
        Self::ref_for(self.id())
    }
}

/// A node that lives below another node.
pub trait FleetChild: FleetEntity {
    type Parent: FleetEntity;

    fn parent_id(&self) -> &<Self::Parent as FleetEntity>::Id;
}

/// A node that owns the registry of `C` children.
pub trait FleetParent<C>: FleetEntity + Sized
where
    C: FleetChild<Parent = Self>,
{
    fn children(&self) -> &ChildRegistry<C>;
}

/// Access to one of an entity's status schedules.
///
/// The schedule is exposed read-only; `set` records a new value through the
/// entity's own setter.
pub trait StatusOwner<S>: FleetEntity + StatusSource<S> {
    fn schedule(&self) -> &StatusSchedule<S>;

    fn set(&self, value: S, at: DateTime<Utc>) -> StatusUpdate<S>;
}

/// Capacity of the two schedules every entity carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryLimits {
    pub admin_status: NonZeroUsize,
    pub status: NonZeroUsize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            admin_status: DEFAULT_HISTORY_SIZE,
            status: DEFAULT_HISTORY_SIZE,
        }
    }
}

/// Initial entries for a new entity's schedules.
#[derive(Debug, Clone, Copy)]
pub struct StatusSeed<S> {
    pub admin_status: AdminStatus,
    pub status: S,
    pub at: DateTime<Utc>,
    pub limits: HistoryLimits,
}

impl<S> StatusSeed<S> {
    pub fn new(admin_status: AdminStatus, status: S) -> Self {
        Self {
            admin_status,
            status,
            at: Utc::now(),
            limits: HistoryLimits::default(),
        }
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }

    pub fn with_limits(mut self, limits: HistoryLimits) -> Self {
        self.limits = limits;
        self
    }

    pub(crate) fn admin_schedule(&self, owner: EntityRef) -> StatusSchedule<AdminStatus> {
        StatusSchedule::new(owner, self.admin_status, self.at, self.limits.admin_status)
    }
}

impl<S: Clone> StatusSeed<S> {
    pub(crate) fn status_schedule(&self, owner: EntityRef) -> StatusSchedule<S> {
        StatusSchedule::new(owner, self.status.clone(), self.at, self.limits.status)
    }
}

impl<S: Default> Default for StatusSeed<S> {
    fn default() -> Self {
        Self::new(AdminStatus::default(), S::default())
    }
}

/// Implements [`StatusSource`] and [`StatusOwner`] for one schedule field.
macro_rules! status_owner {
    ($entity:ty, $status:ty, $field:ident, $setter:ident) => {
        impl $crate::domain::status::StatusSource<$status> for $entity {
            fn current_status(&self) -> $status {
                self.$field.current()
            }
        }

        impl $crate::domain::fleet::StatusOwner<$status> for $entity {
            fn schedule(&self) -> &$crate::domain::status::StatusSchedule<$status> {
                &self.$field
            }

            fn set(
                &self,
                value: $status,
                at: chrono::DateTime<chrono::Utc>,
            ) -> $crate::domain::status::StatusUpdate<$status> {
                self.$setter(value, at)
            }
        }
    };
}

pub(crate) use status_owner;

impl FleetParent<ChargingStationOperator> for RoamingNetwork {
    fn children(&self) -> &ChildRegistry<ChargingStationOperator> {
        self.operators()
    }
}

impl FleetParent<ChargingPool> for ChargingStationOperator {
    fn children(&self) -> &ChildRegistry<ChargingPool> {
        self.pools()
    }
}

impl FleetParent<ChargingStation> for ChargingPool {
    fn children(&self) -> &ChildRegistry<ChargingStation> {
        self.stations()
    }
}

impl FleetParent<Evse> for ChargingStation {
    fn children(&self) -> &ChildRegistry<Evse> {
        self.evses()
    }
}

pub mod evse;
pub mod network;
pub mod operator;
pub mod pool;
pub mod registry;
pub mod station;
