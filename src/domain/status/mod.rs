//! Status tracking
//!
//! Value types, the per-entity [`StatusSchedule`] and the derived
//! [`StatusReport`].

pub mod report;
pub mod schedule;
pub mod types;

pub use report::{generate_status_report, StatusGroup, StatusReport, StatusSource};
pub use schedule::{StatusEntry, StatusSchedule, StatusUpdate, DEFAULT_HISTORY_SIZE};
pub use types::{AdminStatus, EvseStatus, SiteStatus};
