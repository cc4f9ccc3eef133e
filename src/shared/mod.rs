pub mod cancellation;
pub mod retry;
pub mod shutdown;

pub use cancellation::CancellationSignal;
pub use retry::RetryConfig;
pub use shutdown::{listen_for_shutdown_signals, ShutdownCoordinator};
