use super::{Engine, EngineState};
use crate::error::{HarvesterError, Result};
use tracing::{error, info, Instrument};

impl Engine {
    /// Tear everything down and enter Terminated.
    ///
    /// Each step runs even if an earlier one failed. Termination always happens;
    /// an error is returned afterwards when any step failed.
    pub async fn shutdown(&mut self) -> Result<()> {
        let span = self.span.clone();
        async {
            if self.is_terminated() {
                info!("Engine already terminated, ignoring shutdown");
                return Ok(());
            }

            info!("Beginning engine shutdown from state {}", self.state);
            let mut failures = 0usize;

            if self.is_running() {
                if let Err(e) = self.stop().await {
                    error!("Error stopping engine during shutdown: {}", e);
                    failures += 1;
                }
            }

            self.set_state(EngineState::Stopping);

            if let Err(e) = self.task_master.teardown().await {
                error!("Error tearing down task master: {}", e);
                failures += 1;
            }

            if let Err(e) = self.data_manager.teardown().await {
                error!(
                    "Error tearing down '{}' data manager: {}",
                    self.data_manager.backend(),
                    e
                );
                failures += 1;
            }

            let report = self.coordinator.shutdown(self.shutdown_grace).await;
            failures += report.failed + report.aborted;
            self.last_shutdown = Some(report);

            failures += self.services.shutdown_all().await;

            self.set_state(EngineState::Terminated);

            if failures == 0 {
                info!("Engine shutdown completed cleanly");
                Ok(())
            } else {
                error!("Engine shutdown completed with {} failure(s)", failures);
                Err(HarvesterError::system(format!(
                    "Shutdown completed with {} failure(s)",
                    failures
                )))
            }
        }
        .instrument(span)
        .await
    }
}
