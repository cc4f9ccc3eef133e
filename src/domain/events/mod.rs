//! Domain events
//!
//! Vetoable lifecycle notifications scoped to one parent entity, and the
//! fleet events published after the fact. The EventBus implementation lives
//! in `application::events`.

pub mod lifecycle;
pub mod notifier;
pub mod types;

pub use lifecycle::{
    ChildChange, LifecycleEvent, LifecycleKind, ObserverFault, ProposalVerdict, Veto, VetoCause,
};
pub use notifier::{CommitObserver, MutationVoter, SubscriptionId, VetoableNotifier};
pub use types::{
    BatchCompletedEvent, ChildLifecycleEvent, EventMessage, FleetEvent, QueueFlushedEvent,
    StatusChangedEvent,
};
