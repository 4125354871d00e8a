use super::types::EngineState;
use crate::data::DataManager;
use crate::error::{HarvesterError, Result};
use crate::services::{Service, ServiceRegistry};
use crate::shutdown::{ShutdownCoordinator, ShutdownReport};
use crate::tasks::TaskMaster;
use std::sync::Arc;
use std::time::Duration;
use tracing::Span;

const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Owner of the scheduled-execution lifecycle.
///
/// Operations take `&mut self` and are only ever driven by the command
/// dispatcher, which serializes them. There is no locking inside the engine.
pub struct Engine {
    pub(super) task_master: Arc<dyn TaskMaster>,
    pub(super) data_manager: Arc<dyn DataManager>,
    pub(super) services: ServiceRegistry,
    pub(super) coordinator: Arc<ShutdownCoordinator>,
    pub(super) shutdown_grace: Duration,
    pub(super) span: Span,

    // Lifecycle tracking
    pub(super) state: EngineState,
    pub(super) transitions: Vec<EngineState>,
    pub(super) last_shutdown: Option<ShutdownReport>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }
}

/// Builder for [`Engine`]
pub struct EngineBuilder {
    task_master: Option<Arc<dyn TaskMaster>>,
    data_manager: Option<Arc<dyn DataManager>>,
    services: ServiceRegistry,
    coordinator: Option<Arc<ShutdownCoordinator>>,
    shutdown_grace: Duration,
    span: Span,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            task_master: None,
            data_manager: None,
            services: ServiceRegistry::new(),
            coordinator: None,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            span: Span::none(),
        }
    }

    pub fn with_task_master(mut self, task_master: Arc<dyn TaskMaster>) -> Self {
        self.task_master = Some(task_master);
        self
    }

    pub fn with_data_manager(mut self, data_manager: Arc<dyn DataManager>) -> Self {
        self.data_manager = Some(data_manager);
        self
    }

    pub fn with_service(mut self, service: Arc<dyn Service>) -> Self {
        self.services.register(service);
        self
    }

    pub fn with_services(mut self, services: ServiceRegistry) -> Self {
        self.services = services;
        self
    }

    /// Share a coordinator with work spawned outside the engine
    pub fn with_coordinator(mut self, coordinator: Arc<ShutdownCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Span every engine operation is recorded under
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn build(self) -> Result<Engine> {
        let task_master = self
            .task_master
            .ok_or_else(|| HarvesterError::component("engine", "Task master is required"))?;

        let data_manager = self
            .data_manager
            .ok_or_else(|| HarvesterError::component("engine", "Data manager is required"))?;

        Ok(Engine {
            task_master,
            data_manager,
            services: self.services,
            coordinator: self
                .coordinator
                .unwrap_or_else(|| Arc::new(ShutdownCoordinator::new())),
            shutdown_grace: self.shutdown_grace,
            span: self.span,
            state: EngineState::Stopped,
            transitions: vec![EngineState::Stopped],
            last_shutdown: None,
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
