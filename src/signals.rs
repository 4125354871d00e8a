//! OS signal to command translation.
//!
//! Termination signals become SHUTDOWN, SIGHUP becomes RELOAD. SHUTDOWN waits for
//! queue space, so termination is never lost. RELOAD is pushed without waiting and
//! is dropped with a warning when the queue is full.

use crate::command::{Command, CommandSender};
use crate::error::{HarvesterError, Result};
use std::future::Future;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct SignalBridge;

impl SignalBridge {
    /// Register the process signal handlers. Every firing pushes one command.
    #[cfg(unix)]
    pub fn install(sender: CommandSender) -> Result<JoinHandle<()>> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigquit = signal(SignalKind::quit())?;
        let mut sighup = signal(SignalKind::hangup())?;

        info!("Signal handlers installed (SIGINT, SIGTERM, SIGQUIT, SIGHUP)");

        Ok(tokio::spawn(async move {
            loop {
                let (name, command) = tokio::select! {
                    Some(()) = sigint.recv() => ("SIGINT", Command::Shutdown),
                    Some(()) = sigterm.recv() => ("SIGTERM", Command::Shutdown),
                    Some(()) = sigquit.recv() => ("SIGQUIT", Command::Shutdown),
                    Some(()) = sighup.recv() => ("SIGHUP", Command::Reload),
                    else => break,
                };

                if !relay(name, command, &sender).await {
                    break;
                }
            }
            debug!("Signal listener exited");
        }))
    }

    /// Register the Ctrl-C handler
    #[cfg(not(unix))]
    pub fn install(sender: CommandSender) -> Result<JoinHandle<()>> {
        info!("Signal handler installed (Ctrl-C)");

        Ok(tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Ctrl-C listener failed: {}", e);
                    break;
                }
                if !relay("Ctrl-C", Command::Shutdown, &sender).await {
                    break;
                }
            }
            debug!("Signal listener exited");
        }))
    }

    /// Push one SHUTDOWN once `signal` resolves
    pub fn forward<F>(signal: F, sender: CommandSender) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            signal.await;
            relay("forwarded signal", Command::Shutdown, &sender).await;
        })
    }
}

/// Push `command` for a received signal. Returns false once nobody is listening.
async fn relay(name: &str, command: Command, sender: &CommandSender) -> bool {
    info!("Received {}, queueing {}", name, command);
    let pushed = if command.is_terminal() {
        sender.push(command).await
    } else {
        sender.try_push(command)
    };

    match pushed {
        Ok(()) => true,
        Err(HarvesterError::QueueClosed) => {
            debug!("Command queue closed, no longer relaying signals");
            false
        }
        Err(e) => {
            warn!("Dropped {} for {}: {}", command, name, e);
            true
        }
    }
}
