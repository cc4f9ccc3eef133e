//! Adapters shipped with the crate

mod dry_run;

pub use dry_run::DryRunAdapter;
