//! Cancellation signal
//!
//! Cloneable, one-shot signal shared between the caller of a batch and the
//! tasks working on it. Also used as the process-wide shutdown signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

#[derive(Clone, Debug)]
pub struct CancellationSignal {
    sender: broadcast::Sender<()>,
    triggered: Arc<AtomicBool>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            sender,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Idempotent; only the first call wakes waiters.
    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            info!("🛑 Cancellation signal triggered");
            let _ = self.sender.send(());
        }
    }

    /// Resolves once the signal has been triggered, immediately if it
    /// already was.
    pub async fn cancelled(&self) {
        // Subscribe before checking the flag so a concurrent trigger cannot
        // slip between the two.
        let mut receiver = self.sender.subscribe();
        if self.is_triggered() {
            return;
        }
        let _ = receiver.recv().await;
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}
