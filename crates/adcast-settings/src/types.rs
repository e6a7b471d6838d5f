//! Settings types. All structs use camelCase keys and fill missing fields
//! from their `Default` impls.

use std::path::PathBuf;
use std::time::Duration;

use adcast_core::Advertisement;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdcastSettings {
    pub server: ServerSettings,
    pub hub: HubSettings,
    pub store: StoreSettings,
    pub logging: LoggingSettings,
    /// Ads to rotate. Empty means the built-in catalog.
    pub catalog: Vec<Advertisement>,
}

/// HTTP/WebSocket listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port. `0` picks a free port.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Broadcast hub settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubSettings {
    /// Period between ad broadcasts, in milliseconds.
    pub broadcast_interval_ms: u64,
    /// Per-session mailbox bound. Deliveries beyond it are dropped.
    pub mailbox_capacity: usize,
    /// Bound of the coordinator's request queue.
    pub command_queue: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            broadcast_interval_ms: 10_000,
            mailbox_capacity: 1,
            command_queue: 256,
        }
    }
}

impl HubSettings {
    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }
}

/// Click store settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// SQLite database file. Relative paths resolve against `~/.adcast`.
    pub path: String,
    /// Table that receives click rows.
    pub clicks_table: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: "adcast.db".to_string(),
            clicks_table: "ad_clicks".to_string(),
        }
    }
}

impl StoreSettings {
    /// Absolute path of the database file.
    pub fn resolved_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.path);
        if path.is_absolute() {
            path
        } else {
            crate::loader::adcast_home().join(path)
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is unset.
    pub level: String,
    /// JSON lines instead of human-readable output.
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

impl AdcastSettings {
    /// Check cross-field constraints that serde can't express.
    pub fn validate(&self) -> Result<()> {
        if self.hub.broadcast_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "hub.broadcastIntervalMs must be positive".into(),
            ));
        }
        if self.hub.mailbox_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "hub.mailboxCapacity must be at least 1".into(),
            ));
        }
        if self.hub.command_queue == 0 {
            return Err(SettingsError::InvalidValue(
                "hub.commandQueue must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
