use crate::{CounterStore, JobQueue, ReservationError, Result};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::time::Duration;
use tracing::{info, warn, error};

/// Graceful shutdown coordinator
#[derive(Clone)]
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: Arc<Mutex<broadcast::Receiver<()>>>,
    components: Arc<Mutex<Vec<Box<dyn ShutdownComponent + Send + Sync>>>>,
    shutdown_timeout: Duration,
}

/// Trait for components that need graceful shutdown
#[async_trait::async_trait]
pub trait ShutdownComponent {
    async fn shutdown(&self) -> Result<()>;
    fn name(&self) -> &str;
}

impl ShutdownCoordinator {
    pub fn new(shutdown_timeout: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        Self {
            shutdown_tx,
            shutdown_rx: Arc::new(Mutex::new(shutdown_rx)),
            components: Arc::new(Mutex::new(Vec::new())),
            shutdown_timeout,
        }
    }

    /// Register a component for graceful shutdown
    pub async fn register_component(&self, component: Box<dyn ShutdownComponent + Send + Sync>) {
        let mut components = self.components.lock().await;
        info!("Registering component '{}' for graceful shutdown", component.name());
        components.push(component);
    }

    /// Get a shutdown signal receiver
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Signal shutdown to every subscriber without draining components
    pub fn trigger(&self) {
        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal: {}", e);
        }
    }

    /// Signal shutdown and drain all registered components, in registration order
    pub async fn shutdown(&self) -> Result<()> {
        info!("Initiating graceful shutdown...");
        self.trigger();

        let components = self.components.lock().await;

        let drain = async {
            for component in components.iter() {
                let component_name = component.name();
                info!("Shutting down component '{}'", component_name);
                match component.shutdown().await {
                    Ok(()) => info!("Component '{}' shutdown successfully", component_name),
                    Err(e) => error!("Component '{}' shutdown failed: {}", component_name, e),
                }
            }
        };

        match tokio::time::timeout(self.shutdown_timeout, drain).await {
            Ok(()) => {
                info!("All components shutdown successfully");
                Ok(())
            }
            Err(_) => {
                error!("Shutdown timeout exceeded, forcing exit");
                Err(ReservationError::InvalidArgument(
                    "Shutdown timeout exceeded".to_string()
                ))
            }
        }
    }

    /// Wait for shutdown signal
    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.shutdown_rx.lock().await;
        let _ = rx.recv().await;
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

/// Job queue shutdown component
pub struct JobQueueShutdown {
    queue: JobQueue,
}

impl JobQueueShutdown {
    pub fn new(queue: JobQueue) -> Self {
        Self { queue }
    }
}

#[async_trait::async_trait]
impl ShutdownComponent for JobQueueShutdown {
    async fn shutdown(&self) -> Result<()> {
        info!("Stopping job queue consumers...");
        self.queue.shutdown().await?;
        info!("Job queue stopped");
        Ok(())
    }

    fn name(&self) -> &str {
        "job-queue"
    }
}

/// Seat counter shutdown component
pub struct CounterStoreShutdown {
    store: Arc<dyn CounterStore>,
}

impl CounterStoreShutdown {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl ShutdownComponent for CounterStoreShutdown {
    async fn shutdown(&self) -> Result<()> {
        info!("Flushing seat counter...");
        self.store.flush().await?;
        info!("Seat counter flushed successfully");
        Ok(())
    }

    fn name(&self) -> &str {
        "seat-counter"
    }
}

/// Signal handler for graceful shutdown
pub async fn setup_signal_handlers(coordinator: ShutdownCoordinator) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let (mut sigterm, mut sigint) = match (
                signal(SignalKind::terminate()),
                signal(SignalKind::interrupt()),
            ) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                (Err(e), _) | (_, Err(e)) => {
                    error!("Failed to setup signal handlers: {}", e);
                    return;
                }
            };

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, initiating graceful shutdown");
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                return;
            }
            info!("Received Ctrl+C, initiating graceful shutdown");
        }

        coordinator.trigger();
    });
}

/// Utility for running services with graceful shutdown
pub async fn run_with_graceful_shutdown<F, Fut>(
    service_name: &str,
    service_future: F,
    shutdown_coordinator: ShutdownCoordinator,
) -> Result<()>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    info!("Starting service '{}'", service_name);

    // Setup signal handlers
    setup_signal_handlers(shutdown_coordinator.clone()).await;

    // Run the service
    let service_result = tokio::select! {
        result = service_future() => {
            info!("Service '{}' completed", service_name);
            result
        }
        _ = shutdown_coordinator.wait_for_shutdown() => {
            info!("Service '{}' received shutdown signal", service_name);
            Ok(())
        }
    };

    // Ensure graceful shutdown
    if let Err(e) = shutdown_coordinator.shutdown().await {
        error!("Failed to shutdown service '{}': {}", service_name, e);
        return Err(e);
    }

    service_result
}
