pub mod error;
pub mod events;
pub mod fleet;
pub mod ids;
pub mod status;

// Re-export commonly used types
pub use error::{FleetError, FleetResult};
pub use events::{
    ChildChange, CommitObserver, FleetEvent, LifecycleEvent, LifecycleKind, MutationVoter,
    ObserverFault, ProposalVerdict, SubscriptionId, Veto, VetoCause, VetoableNotifier,
};
pub use fleet::{
    ChargingPool, ChargingPoolData, ChargingStation, ChargingStationData, ChargingStationOperator,
    ChildRegistry, Evse, EvseData, FleetChild, FleetEntity, FleetParent, HistoryLimits, OperatorData,
    RoamingNetwork, StatusOwner, StatusSeed,
};
pub use ids::{
    Actor, AuthorizatorId, ChargingPoolId, ChargingStationId, EntityRef, EventTrackingId, EvseId,
    OperatorId, RoamingNetworkId, SessionId,
};
pub use status::{
    generate_status_report, AdminStatus, EvseStatus, SiteStatus, StatusEntry, StatusReport,
    StatusSchedule, StatusSource, StatusUpdate,
};
