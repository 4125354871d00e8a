use super::{Engine, EngineState};
use crate::error::{HarvesterError, Result};
use tracing::{error, info, Instrument};

impl Engine {
    /// Launch every registered service as independent work. Runs once.
    pub fn launch_services(&mut self) -> Result<()> {
        if self.is_terminated() {
            return Err(HarvesterError::Terminated);
        }
        let _enter = self.span.enter();
        info!("Launching {} service(s)", self.services.len());
        self.services.start_all(&self.coordinator)
    }

    /// Begin scheduling registered tasks. A no-op when already running.
    pub async fn start(&mut self) -> Result<()> {
        let span = self.span.clone();
        async {
            match self.state {
                EngineState::Running => {
                    info!("Engine already running, ignoring start");
                    return Ok(());
                }
                EngineState::Terminated => return Err(HarvesterError::Terminated),
                EngineState::Starting | EngineState::Stopping => {
                    return Err(HarvesterError::system(format!(
                        "Engine is {}, cannot start",
                        self.state
                    )));
                }
                EngineState::Stopped => {}
            }

            if !self.data_manager.is_initialized() {
                return Err(HarvesterError::NotInitialized {
                    backend: self.data_manager.backend().to_string(),
                });
            }

            info!("Starting engine");
            self.set_state(EngineState::Starting);

            match self.task_master.begin_scheduling().await {
                Ok(()) => {
                    self.set_state(EngineState::Running);
                    info!("Engine running");
                    Ok(())
                }
                Err(e) => {
                    error!("Failed to begin scheduling: {}", e);
                    self.set_state(EngineState::Stopped);
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Halt scheduling. Task definitions and services are left alone.
    pub async fn stop(&mut self) -> Result<()> {
        let span = self.span.clone();
        async {
            match self.state {
                EngineState::Stopped => {
                    info!("Engine already stopped, ignoring stop");
                    return Ok(());
                }
                EngineState::Terminated => return Err(HarvesterError::Terminated),
                EngineState::Starting | EngineState::Stopping => {
                    return Err(HarvesterError::system(format!(
                        "Engine is {}, cannot stop",
                        self.state
                    )));
                }
                EngineState::Running => {}
            }

            info!("Stopping engine");
            self.set_state(EngineState::Stopping);

            match self.task_master.halt_scheduling().await {
                Ok(()) => {
                    self.set_state(EngineState::Stopped);
                    info!("Engine stopped");
                    Ok(())
                }
                Err(e) => {
                    error!("Failed to halt scheduling: {}", e);
                    // Schedules may still be live
                    self.set_state(EngineState::Running);
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Stop followed immediately by start
    pub async fn reload(&mut self) -> Result<()> {
        if self.is_terminated() {
            return Err(HarvesterError::Terminated);
        }

        let span = self.span.clone();
        async {
            info!("Reloading engine");
            if self.is_running() {
                self.stop().await?;
            }
            self.start().await
        }
        .instrument(span)
        .await
    }
}
