//! Outcome taxonomy of propagation: per-item results and batch results

mod batch;
mod conversion;
mod kind;
mod result;
mod text;

pub use batch::{BatchResult, BatchResultBuilder};
pub use conversion::{CdrDeliveryStatus, PushDataStatus, UnmappedOutcome};
pub use kind::{BatchOutcomeKind, OutcomeCategory, OutcomeKind};
pub use result::{OperationResult, OperationResultBuilder};
pub use text::{I18nText, Warning};
