//! Propagation of fleet mutations to roaming partners

pub mod adapter;
pub mod context;
pub mod item;
pub mod pipeline;
pub mod queue;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::{AdapterError, AdapterSwitches, RoamingAdapter, SharedAdapter};
pub use context::PropagationContext;
pub use item::{ChargeDetailRecord, PushItem, PushKind, Pushable, PushableStatus};
pub use pipeline::{PipelineOptions, PropagationPipeline};
pub use queue::{DeferredAdapter, FlushReport, DEFAULT_QUEUE_CAPACITY};
