use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvesterError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown storage backend '{kind}' (expected one of: memory, file)")]
    UnknownBackend { kind: String },

    #[error("Data manager '{backend}' has not been initialized")]
    NotInitialized { backend: String },

    #[error("Engine has been terminated")]
    Terminated,

    #[error("Command queue is closed")]
    QueueClosed,

    #[error("Unknown command '{name}'")]
    UnknownCommand { name: String },

    #[error("Executor '{executor}' failed: {message}")]
    Executor { executor: String, message: String },

    #[error("Storage error in {backend}: {message}")]
    Storage { backend: String, message: String },

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl HarvesterError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn storage<S: Into<String>>(backend: S, message: S) -> Self {
        Self::Storage {
            backend: backend.into(),
            message: message.into(),
        }
    }

    pub fn executor<S: Into<String>>(executor: S, message: S) -> Self {
        Self::Executor {
            executor: executor.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HarvesterError>;
