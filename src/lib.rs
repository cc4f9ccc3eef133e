//! # Texnouz Roaming Hub
//!
//! Models an EV charging roaming network (network → operator → pool →
//! station → EVSE) and propagates every change of it to roaming partners.
//!
//! ## Architecture
//!
//! The project follows Clean Architecture principles:
//!
//! - **domain**: Fleet hierarchy, status schedules and reports, vetoable
//!   lifecycle notifications
//! - **application**: Outcome taxonomy, propagation pipeline, deferred
//!   delivery queue, event bus
//! - **infrastructure**: Concrete partner adapters
//! - **shared**: Cancellation, graceful shutdown, retry policy
//! - **config** / **runtime**: TOML configuration and the [`RoamingHub`]
//!   handle used by the CLI

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod runtime;
pub mod shared;

pub use config::{default_config_path, AppConfig, ConfigError};
pub use runtime::{init_tracing, RoamingHub, RuntimeError};

pub use application::{
    create_event_bus, BatchOutcomeKind, BatchResult, EventBus, OperationResult, OutcomeKind,
    PropagationContext, PropagationPipeline, PushItem, PushKind, RoamingAdapter, SharedEventBus,
};
