use crate::command::{Command, CommandSender};
use crate::error::{HarvesterError, Result};
use crate::services::Service;
use async_trait::async_trait;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::Duration;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Map a key to the command it triggers
pub(crate) fn command_for_key(code: KeyCode) -> Option<Command> {
    match code {
        KeyCode::Char('s') => Some(Command::Start),
        KeyCode::Char('x') => Some(Command::Stop),
        KeyCode::Char('r') => Some(Command::Reload),
        KeyCode::Char('q') | KeyCode::Esc => Some(Command::Shutdown),
        _ => None,
    }
}

/// Queue a command from the input thread. SHUTDOWN waits for space.
/// Returns false once the queue is closed.
fn push_command(commands: &CommandSender, command: Command) -> bool {
    let pushed = if command.is_terminal() {
        commands.blocking_push(command)
    } else {
        commands.try_push(command)
    };

    match pushed {
        Ok(()) => true,
        Err(HarvesterError::QueueClosed) => false,
        Err(e) => {
            warn!("Console dropped {}: {}", command, e);
            true
        }
    }
}

/// Single-key control of the engine from the terminal
pub struct ControlConsole {
    commands: CommandSender,
    token: CancellationToken,
}

impl ControlConsole {
    pub fn new(commands: CommandSender, token: CancellationToken) -> Self {
        Self { commands, token }
    }
}

#[async_trait]
impl Service for ControlConsole {
    fn name(&self) -> &str {
        "console"
    }

    async fn start(&self) -> Result<()> {
        info!("Control console active: s=start x=stop r=reload q=shutdown");

        let commands = self.commands.clone();
        let token = self.token.clone();

        let handle = task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for console input: {}", e);
                return;
            }

            while !token.is_cancelled() {
                match event::poll(POLL_INTERVAL) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        // Only handle key press events (not release)
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }
                        let Some(command) = command_for_key(key_event.code) else {
                            debug!("Ignoring key {:?}", key_event.code);
                            continue;
                        };

                        info!("Console requested {}", command);
                        if !push_command(&commands, command) || command.is_terminal() {
                            break;
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            }
            debug!("Console input thread exited");
        });

        handle
            .await
            .map_err(|e| HarvesterError::component("console".to_string(), e.to_string()))
    }

    async fn shutdown(&self) -> Result<()> {
        info!("Stopping control console");
        self.token.cancel();
        if let Err(e) = disable_raw_mode() {
            warn!("Failed to disable raw mode: {}", e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::command_queue;

    #[test]
    fn test_key_bindings() {
        assert_eq!(command_for_key(KeyCode::Char('s')), Some(Command::Start));
        assert_eq!(command_for_key(KeyCode::Char('x')), Some(Command::Stop));
        assert_eq!(command_for_key(KeyCode::Char('r')), Some(Command::Reload));
        assert_eq!(command_for_key(KeyCode::Char('q')), Some(Command::Shutdown));
        assert_eq!(command_for_key(KeyCode::Esc), Some(Command::Shutdown));
        assert_eq!(command_for_key(KeyCode::Char(' ')), None);
    }

    #[tokio::test]
    async fn test_shutdown_key_waits_for_full_queue() {
        let (sender, mut receiver) = command_queue(1);
        sender.push(Command::Start).await.unwrap();

        // Dropped, the queue is full
        assert!(push_command(&sender, Command::Reload));

        let input = sender.clone();
        let handle = task::spawn_blocking(move || push_command(&input, Command::Shutdown));

        assert_eq!(receiver.next().await, Some(Command::Start));
        assert_eq!(receiver.next().await, Some(Command::Shutdown));
        assert!(handle.await.unwrap());

        receiver.close();
        let closed = task::spawn_blocking(move || push_command(&sender, Command::Shutdown));
        assert!(!closed.await.unwrap());
    }

    #[tokio::test]
    async fn test_console_shutdown_cancels_token() {
        let (sender, _receiver) = command_queue(2);
        let console = ControlConsole::new(sender, CancellationToken::new());

        console.shutdown().await.unwrap();
        assert!(console.token.is_cancelled());
    }
}
