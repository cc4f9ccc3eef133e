//! Infrastructure layer - concrete partner transports

pub mod adapters;

pub use adapters::DryRunAdapter;
