//! Configuration management for the engine
//!
//! Loads configuration from netcore.toml at startup.
//! All values are configurable to avoid hardcoded constants; every field is
//! overridable through the engine setters before `start()`.

use serde::{Deserialize, Serialize};

/// Engine configuration
///
/// Loaded from netcore.toml at startup. Contains all tunable parameters
/// to avoid hardcoded values throughout the codebase.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Number of I/O threads polling the event monitor
    #[serde(default = "default_io_threads")]
    pub io_threads: usize,

    /// Number of work threads running business callbacks
    #[serde(default = "default_work_threads")]
    pub work_threads: usize,

    /// Expected average live-connection count; the slot allocator is sized
    /// at twice this value
    #[serde(default = "default_average_connections")]
    pub average_connections: usize,

    /// Heartbeat interval in seconds; 0 or negative disables heartbeat expiry
    #[serde(default)]
    pub heartbeat_secs: i64,

    /// Reconnect interval in seconds; 0 or negative disables reconnection
    #[serde(default)]
    pub reconnect_secs: i64,

    /// Event-capacity ceiling passed to the event monitor at start
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            io_threads: default_io_threads(),
            work_threads: default_work_threads(),
            average_connections: default_average_connections(),
            heartbeat_secs: 0,
            reconnect_secs: 0,
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_io_threads() -> usize {
    16
}

fn default_work_threads() -> usize {
    16
}

fn default_average_connections() -> usize {
    5000
}

fn default_event_capacity() -> usize {
    10240
}

impl EngineConfig {
    /// Load configuration from netcore.toml
    ///
    /// If the file doesn't exist, returns default configuration.
    /// # Errors
    /// Returns error if file exists but cannot be parsed.
    pub fn load() -> crate::Result<Self> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "netcore.toml".to_string());

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => {
                let config: EngineConfig = toml::from_str(&contents)
                    .map_err(|e| crate::EngineError::Config(e.to_string()))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File not found - use defaults
                Ok(EngineConfig::default())
            }
            Err(e) => Err(crate::EngineError::Io(e)),
        }
    }

    /// Slot allocator capacity derived from the average-connection hint
    #[inline]
    pub fn pool_capacity(&self) -> usize {
        self.average_connections.max(1) * 2
    }
}
