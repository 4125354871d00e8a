use crate::error::{HarvesterError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::mpsc;
use tracing::debug;

/// Control-plane instruction processed by the command dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Start,
    Stop,
    Shutdown,
    Reload,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Stop => "stop",
            Command::Shutdown => "shutdown",
            Command::Reload => "reload",
        }
    }

    /// Whether processing this command ends the control loop
    pub fn is_terminal(&self) -> bool {
        matches!(self, Command::Shutdown)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

impl FromStr for Command {
    type Err = HarvesterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Command::Start),
            "stop" => Ok(Command::Stop),
            "shutdown" => Ok(Command::Shutdown),
            "reload" => Ok(Command::Reload),
            _ => Err(HarvesterError::UnknownCommand {
                name: s.to_string(),
            }),
        }
    }
}

/// Create a bounded FIFO command queue with a single consumer
pub fn command_queue(capacity: usize) -> (CommandSender, CommandReceiver) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (CommandSender { sender }, CommandReceiver { receiver })
}

/// Producer half of the command queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CommandSender {
    sender: mpsc::Sender<Command>,
}

impl CommandSender {
    /// Push a command, waiting for queue space
    pub async fn push(&self, command: Command) -> Result<()> {
        debug!("Queueing command {}", command);
        self.sender
            .send(command)
            .await
            .map_err(|_| HarvesterError::QueueClosed)
    }

    /// Push a command without waiting. Used from signal and input handlers.
    pub fn try_push(&self, command: Command) -> Result<()> {
        debug!("Queueing command {}", command);
        self.sender.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Closed(_) => HarvesterError::QueueClosed,
            mpsc::error::TrySendError::Full(command) => HarvesterError::component(
                "command_queue".to_string(),
                format!("Queue full, dropped {}", command),
            ),
        })
    }

    /// Push a command from a blocking thread, waiting for queue space.
    /// Must not be called from async code.
    pub fn blocking_push(&self, command: Command) -> Result<()> {
        debug!("Queueing command {}", command);
        self.sender
            .blocking_send(command)
            .map_err(|_| HarvesterError::QueueClosed)
    }

    /// Whether the consumer has gone away
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Consumer half of the command queue, owned by the dispatcher
#[derive(Debug)]
pub struct CommandReceiver {
    receiver: mpsc::Receiver<Command>,
}

impl CommandReceiver {
    /// Wait for the next command. `None` once every sender is gone.
    pub async fn next(&mut self) -> Option<Command> {
        self.receiver.recv().await
    }

    /// Stop accepting new commands
    pub fn close(&mut self) {
        self.receiver.close();
    }
}
