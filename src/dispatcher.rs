//! Single consumer of the command queue.
//!
//! Commands are handled strictly one at a time in arrival order. A failing
//! command is logged and the loop moves on. SHUTDOWN is the only way out of the
//! loop besides every sender being dropped, which is treated the same way.

use crate::command::{Command, CommandReceiver};
use crate::engine::{Engine, EngineState};
use crate::error::Result;
use tracing::{error, info, warn, Instrument, Span};

/// Summary of a finished control loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Commands taken off the queue, including the final SHUTDOWN
    pub processed: usize,
    /// Commands whose engine operation returned an error
    pub failed: usize,
    pub final_state: EngineState,
    /// False when the loop ended because every sender went away
    pub shutdown_requested: bool,
}

impl DispatchReport {
    /// Process exit code. Reaching an orderly shutdown is success even if
    /// individual commands or cleanup steps failed along the way.
    pub fn exit_code(&self) -> i32 {
        if self.final_state == EngineState::Terminated {
            0
        } else {
            1
        }
    }
}

pub struct CommandDispatcher {
    engine: Engine,
    receiver: CommandReceiver,
    span: Span,
}

impl CommandDispatcher {
    pub fn new(engine: Engine, receiver: CommandReceiver) -> Self {
        Self {
            engine,
            receiver,
            span: Span::none(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Run the control loop to completion
    pub async fn run(mut self) -> DispatchReport {
        let span = self.span.clone();
        self.run_loop().instrument(span).await
    }

    async fn run_loop(&mut self) -> DispatchReport {
        info!("Command dispatcher running");
        let mut processed = 0usize;
        let mut failed = 0usize;
        let mut shutdown_requested = false;

        while let Some(command) = self.receiver.next().await {
            processed += 1;
            info!("Dispatching {}", command);

            if let Err(e) = self.dispatch(command).await {
                error!("{} failed: {}", command, e);
                failed += 1;
            }

            if command.is_terminal() {
                shutdown_requested = true;
                break;
            }
        }

        // Anything still queued after SHUTDOWN is never handled
        self.receiver.close();

        if !shutdown_requested {
            warn!("All command senders dropped, shutting down");
            if let Err(e) = self.engine.shutdown().await {
                error!("Implicit shutdown failed: {}", e);
                failed += 1;
            }
        }

        let report = DispatchReport {
            processed,
            failed,
            final_state: self.engine.state(),
            shutdown_requested,
        };
        info!(
            "Command dispatcher finished: {} processed, {} failed, engine {}",
            report.processed, report.failed, report.final_state
        );
        report
    }

    async fn dispatch(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Start => self.engine.start().await,
            Command::Stop => self.engine.stop().await,
            Command::Reload => self.engine.reload().await,
            Command::Shutdown => self.engine.shutdown().await,
        }
    }
}
