//! # adcast-settings
//!
//! Configuration for the adcast server, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults** — [`AdcastSettings::default()`]
//! 2. **Settings file** — `~/.adcast/settings.json` or an explicit path,
//!    deep-merged over defaults
//! 3. **Environment variables** — `APP_PORT`, `DB_PATH`, `CLICKS_TABLE`,
//!    `BROADCAST_INTERVAL_MS`, ... (highest priority)
//!
//! Unlike a process-wide singleton, the loaded value is handed to whoever
//! composes the server; nothing here is global.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    deep_merge, load_settings, load_settings_from_path, settings_path, Loaded, RejectedOverride,
};
pub use types::*;
