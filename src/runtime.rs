//! Reusable roaming hub runtime.
//!
//! Provides [`RoamingHub`] that encapsulates the hub lifecycle: building the
//! roaming network from configuration, registering partner adapters (wrapped
//! in deferred delivery queues where configured), running the queue flush
//! loops and draining them on graceful shutdown.

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::events::{create_event_bus, EventBusCommitObserver, SharedEventBus};
use crate::application::propagation::{
    DeferredAdapter, PropagationContext, PropagationPipeline, SharedAdapter,
};
use crate::config::{AdapterConfig, AdapterKind, AppConfig, ConfigError};
use crate::domain::fleet::{RoamingNetwork, StatusSeed};
use crate::domain::ids::{Actor, AuthorizatorId, RoamingNetworkId};
use crate::infrastructure::DryRunAdapter;
use crate::shared::{CancellationSignal, ShutdownCoordinator};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("the hub must be started inside a Tokio runtime")]
    NoRuntime,
}

// ── RoamingHub ─────────────────────────────────────────────────────

/// Handle to a running roaming hub.
///
/// # Examples
///
/// ```rust,no_run
/// use texnouz_roaming::config::AppConfig;
/// use texnouz_roaming::runtime::RoamingHub;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let hub = RoamingHub::start(AppConfig::default())?;
///     // ... add operators, push status updates ...
///     hub.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct RoamingHub {
    /// Root of the fleet hierarchy.
    pub network: Arc<RoamingNetwork>,
    /// Pipeline every mutation is pushed through.
    pub pipeline: Arc<PropagationPipeline>,
    /// Lifecycle, status and batch events.
    pub event_bus: SharedEventBus,
    /// The configuration the hub was started with.
    pub config: AppConfig,

    queues: Vec<Arc<DeferredAdapter>>,
    shutdown: ShutdownCoordinator,
    flush_tasks: Vec<JoinHandle<()>>,
}

impl RoamingHub {
    /// Start the hub with the given configuration.
    ///
    /// This will:
    /// 1. Build the roaming network with the configured history limits
    /// 2. Create the event bus and publish lifecycle commits at every level
    /// 3. Register one adapter per `[[adapters]]` entry
    /// 4. Spawn a flush loop for every deferred adapter
    pub fn start(config: AppConfig) -> Result<Self, RuntimeError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(RuntimeError::NoRuntime);
        }
        config.validate()?;

        info!(network = %config.network.id, "Starting Texnouz roaming hub...");

        // ── Network ────────────────────────────────────────────
        let limits = config.status.history_limits()?;
        let network = Arc::new(RoamingNetwork::new(
            RoamingNetworkId::new(config.network.id.as_str()),
            config.network.name.as_str(),
            StatusSeed::default().with_limits(limits),
        ));

        // ── Event Bus ──────────────────────────────────────────
        let event_bus = create_event_bus(crate::application::events::event_bus::DEFAULT_CAPACITY);
        EventBusCommitObserver::attach(event_bus.clone(), network.operators());
        info!("🔔 Event bus initialized");

        // ── Pipeline ───────────────────────────────────────────
        let pipeline = Arc::new(
            PropagationPipeline::new(AuthorizatorId::new(config.network.hub_id.as_str()))
                .with_options(config.propagation.pipeline_options())
                .with_event_bus(event_bus.clone()),
        );

        // ── Shutdown coordinator ───────────────────────────────
        let shutdown = ShutdownCoordinator::new(config.queue.drain_timeout());
        let shutdown_signal = shutdown.signal();

        // ── Adapters ───────────────────────────────────────────
        let mut queues = Vec::new();
        let mut flush_tasks = Vec::new();
        for adapter_cfg in &config.adapters {
            let adapter = build_adapter(adapter_cfg);

            if adapter_cfg.deferred && config.queue.enabled {
                let queue = Arc::new(
                    DeferredAdapter::new(adapter, config.queue.retry())
                        .with_capacity(config.queue.capacity)
                        .with_event_bus(event_bus.clone()),
                );
                flush_tasks.push(queue.clone().spawn_flush_loop(
                    config.queue.flush_interval(),
                    config.propagation.item_timeout(),
                    shutdown_signal.clone(),
                ));
                pipeline.register_adapter(queue.clone());
                queues.push(queue);
            } else {
                pipeline.register_adapter(adapter);
            }
            info!(
                adapter = %adapter_cfg.id,
                deferred = adapter_cfg.deferred && config.queue.enabled,
                "🔌 Adapter registered"
            );
        }

        info!(adapters = pipeline.adapter_count(), "🚀 Roaming hub started.");

        Ok(Self {
            network,
            pipeline,
            event_bus,
            config,
            queues,
            shutdown,
            flush_tasks,
        })
    }

    /// Context for an operation requested by `actor`, bounded by the
    /// configured batch budget and cancelled on shutdown.
    pub fn context(&self, actor: impl Into<Actor>) -> PropagationContext {
        let mut ctx = PropagationContext::new(actor.into()).with_cancellation(self.shutdown.signal());
        if let Some(budget) = self.config.propagation.batch_timeout() {
            ctx = ctx.with_budget(budget);
        }
        ctx
    }

    /// Deferred delivery queues, one per deferred adapter.
    pub fn queues(&self) -> &[Arc<DeferredAdapter>] {
        &self.queues
    }

    /// Get a cloneable shutdown signal.
    pub fn shutdown_signal(&self) -> CancellationSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    /// Trigger graceful shutdown (non-blocking).
    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for shutdown, stop the flush loops and drain the queues once
    /// more within the drain timeout.
    pub async fn wait(self) {
        let Self {
            queues,
            shutdown,
            flush_tasks,
            config,
            ..
        } = self;

        let item_timeout = config.propagation.item_timeout();
        let drained = shutdown
            .shutdown_with_cleanup(|| async move {
                for task in flush_tasks {
                    if let Err(e) = task.await {
                        error!("Flush loop task panicked: {}", e);
                    }
                }
                for queue in &queues {
                    if queue.is_empty() {
                        continue;
                    }
                    let mut ctx = PropagationContext::system();
                    ctx.item_timeout = item_timeout;
                    let report = queue.flush(&ctx).await;
                    if report.remaining > 0 {
                        warn!(
                            adapter = %queue.inner().id(),
                            remaining = report.remaining,
                            "📮 Items left undelivered at shutdown"
                        );
                    }
                }
            })
            .await;

        if !drained {
            warn!("Deferred queues were not fully drained");
        }
        info!("👋 Texnouz roaming hub shutdown complete");
    }

    /// Trigger shutdown and wait for completion.
    pub async fn shutdown(self) {
        info!("🛑 Shutting down roaming hub...");
        self.trigger_shutdown();
        self.wait().await;
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.signal().is_triggered()
    }
}

fn build_adapter(config: &AdapterConfig) -> SharedAdapter {
    match config.kind {
        AdapterKind::DryRun => Arc::new(DryRunAdapter::from_config(config)),
    }
}

// ── Tracing ────────────────────────────────────────────────────────

/// Initialise the global tracing subscriber from `[logging]`.
/// `RUST_LOG` overrides the configured level.
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.logging.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    if let Err(e) = result {
        eprintln!("tracing subscriber already installed: {e}");
    }
}
