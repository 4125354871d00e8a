use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Upper bound for `engine.shutdown_grace_seconds`
pub const MAX_SHUTDOWN_GRACE_SECONDS: u64 = 3600;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HarvesterConfig {
    pub engine: EngineConfig,
    pub storage: StorageConfig,
    pub query: QueryConfig,
    pub console: ConsoleConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    /// Maximum number of pending control commands
    #[serde(default = "default_command_queue_capacity")]
    pub command_queue_capacity: usize,

    /// Grace period granted to outstanding work during shutdown
    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,

    /// Enqueue a START command before the control loop begins
    #[serde(default = "default_autostart")]
    pub autostart: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Result persistence backend (memory, file)
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Directory used by file-based backends
    #[serde(default = "default_storage_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct QueryConfig {
    /// Serve task results over HTTP
    #[serde(default = "default_query_enabled")]
    pub enabled: bool,

    /// IP address to bind to
    #[serde(default = "default_query_ip")]
    pub ip: String,

    /// Port to listen on
    #[serde(default = "default_query_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConsoleConfig {
    /// Accept single-key control commands from the terminal
    #[serde(default = "default_console_enabled")]
    pub enabled: bool,
}

impl EngineConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

impl HarvesterConfig {
    /// Load configuration from a specific file path, overlaid with `HARVESTER_*` variables
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default(
                "engine.command_queue_capacity",
                default_command_queue_capacity() as i64,
            )?
            .set_default(
                "engine.shutdown_grace_seconds",
                default_shutdown_grace_seconds() as i64,
            )?
            .set_default("engine.autostart", default_autostart())?
            .set_default("storage.backend", default_storage_backend())?
            .set_default("storage.path", default_storage_path())?
            .set_default("query.enabled", default_query_enabled())?
            .set_default("query.ip", default_query_ip())?
            .set_default("query.port", default_query_port() as i64)?
            .set_default("console.enabled", default_console_enabled())?
            // Configuration file is optional
            .add_source(File::with_name(&path_str).required(false))
            .add_source(
                Environment::with_prefix("HARVESTER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: HarvesterConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.command_queue_capacity == 0 {
            return Err(ConfigError::Message(
                "Command queue capacity must be greater than 0".to_string(),
            ));
        }

        if self.engine.shutdown_grace_seconds == 0 {
            return Err(ConfigError::Message(
                "Shutdown grace period must be greater than 0".to_string(),
            ));
        }

        if self.engine.shutdown_grace_seconds > MAX_SHUTDOWN_GRACE_SECONDS {
            return Err(ConfigError::Message(format!(
                "Shutdown grace period must be at most {} seconds",
                MAX_SHUTDOWN_GRACE_SECONDS
            )));
        }

        if self.storage.backend.trim().is_empty() {
            return Err(ConfigError::Message(
                "Storage backend must not be empty".to_string(),
            ));
        }

        if self.query.enabled && self.query.port == 0 {
            return Err(ConfigError::Message(
                "Query service port must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> crate::error::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig {
                command_queue_capacity: default_command_queue_capacity(),
                shutdown_grace_seconds: default_shutdown_grace_seconds(),
                autostart: default_autostart(),
            },
            storage: StorageConfig {
                backend: default_storage_backend(),
                path: default_storage_path(),
            },
            query: QueryConfig {
                enabled: default_query_enabled(),
                ip: default_query_ip(),
                port: default_query_port(),
            },
            console: ConsoleConfig {
                enabled: default_console_enabled(),
            },
        }
    }
}

// Default value functions
fn default_command_queue_capacity() -> usize {
    32
}
fn default_shutdown_grace_seconds() -> u64 {
    10
}
fn default_autostart() -> bool {
    true
}

fn default_storage_backend() -> String {
    "memory".to_string()
}
fn default_storage_path() -> String {
    "./data".to_string()
}

fn default_query_enabled() -> bool {
    true
}
fn default_query_ip() -> String {
    "127.0.0.1".to_string()
}
fn default_query_port() -> u16 {
    8080
}

fn default_console_enabled() -> bool {
    false
}
