pub mod events;
pub mod outcome;
pub mod propagation;

// Re-export key types for convenience
pub use events::{create_event_bus, EventBus, EventBusCommitObserver, EventSubscriber, SharedEventBus};
pub use outcome::{BatchOutcomeKind, BatchResult, OperationResult, OutcomeCategory, OutcomeKind};
pub use propagation::{
    AdapterError, DeferredAdapter, PipelineOptions, PropagationContext, PropagationPipeline,
    PushItem, PushKind, RoamingAdapter, SharedAdapter,
};
