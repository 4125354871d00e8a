//! Auxiliary services with a lifecycle independent of the engine.
//!
//! Services are started once at process start and shut down once during process
//! shutdown. Engine stop and reload never touch them.

#[cfg(feature = "console")]
mod console;
#[cfg(feature = "query_service")]
mod query;

#[cfg(feature = "console")]
pub use console::ControlConsole;
#[cfg(feature = "query_service")]
pub use query::{QueryService, QueryServiceBuilder};

use crate::error::Result;
use crate::shutdown::ShutdownCoordinator;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[async_trait]
pub trait Service: Send + Sync {
    fn name(&self) -> &str;

    /// Run the service. Invoked once and may run until the service is shut down.
    async fn start(&self) -> Result<()>;

    /// Stop the service and release its resources
    async fn shutdown(&self) -> Result<()>;
}

/// Ordered collection of the process's services
#[derive(Default)]
pub struct ServiceRegistry {
    services: Vec<Arc<dyn Service>>,
    started: bool,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, service: Arc<dyn Service>) {
        debug!("Registered service '{}'", service.name());
        self.services.push(service);
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.services.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Spawn every service's `start` as independent tracked work. Runs once.
    pub fn start_all(&mut self, coordinator: &ShutdownCoordinator) -> Result<()> {
        if self.started {
            debug!("Services already started");
            return Ok(());
        }

        for service in &self.services {
            let name = service.name().to_string();
            let service = Arc::clone(service);
            coordinator.spawn(format!("service:{}", name), async move {
                let result = service.start().await;
                if let Err(e) = &result {
                    error!("Service '{}' stopped with error: {}", service.name(), e);
                }
                result
            })?;
            info!("Service '{}' launched", name);
        }

        self.started = true;
        Ok(())
    }

    /// Shut down every service in registration order. Returns the number of failures.
    pub async fn shutdown_all(&self) -> usize {
        let mut failures = 0;

        for service in &self.services {
            info!("Shutting down service '{}'", service.name());
            if let Err(e) = service.shutdown().await {
                warn!("Service '{}' failed to shut down: {}", service.name(), e);
                failures += 1;
            }
        }

        failures
    }
}
