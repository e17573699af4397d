//! Settings type definitions.
//!
//! All types use camelCase JSON keys and `#[serde(default)]`, so a partial
//! settings file only needs the keys it changes.

use std::time::Duration;

use longpoll_core::HubConfig;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LongpollSettings {
    /// HTTP listener settings.
    pub server: ServerSettings,
    /// Poll/eviction timing.
    pub hub: HubSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

/// HTTP listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listening port.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Poll and eviction timing, in milliseconds.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubSettings {
    /// How long each poll waits for an event.
    pub poll_timeout_ms: u64,
    /// Inactivity before a client is evicted.
    pub idle_threshold_ms: u64,
    /// How often the eviction sweep runs.
    pub sweep_interval_ms: u64,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            poll_timeout_ms: 30_000,
            idle_threshold_ms: 60_000,
            sweep_interval_ms: 60_000,
        }
    }
}

impl HubSettings {
    pub fn to_hub_config(&self) -> HubConfig {
        HubConfig {
            poll_timeout: Duration::from_millis(self.poll_timeout_ms),
            idle_threshold: Duration::from_millis(self.idle_threshold_ms),
            sweep_interval: Duration::from_millis(self.sweep_interval_ms),
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LongpollSettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        let durations = [
            ("hub.pollTimeoutMs", self.hub.poll_timeout_ms),
            ("hub.idleThresholdMs", self.hub.idle_threshold_ms),
            ("hub.sweepIntervalMs", self.hub.sweep_interval_ms),
        ];
        for (key, value) in durations {
            if value == 0 {
                return Err(SettingsError::InvalidValue(format!("{key} must be > 0")));
            }
        }
        // A poll only refreshes activity when it starts, so a wait as long as
        // the idle threshold would be swept mid-poll.
        if self.hub.poll_timeout_ms >= self.hub.idle_threshold_ms {
            return Err(SettingsError::InvalidValue(format!(
                "hub.pollTimeoutMs ({}) must be less than hub.idleThresholdMs ({})",
                self.hub.poll_timeout_ms, self.hub.idle_threshold_ms
            )));
        }
        if !matches!(
            self.logging.level.to_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(SettingsError::InvalidValue(format!(
                "logging.level: unknown level {:?}",
                self.logging.level
            )));
        }
        Ok(())
    }
}
