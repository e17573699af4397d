//! # longpoll-settings
//!
//! Layered configuration for the longpoll server.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`LongpollSettings::default()`]
//! 2. **Settings file** — `~/.longpoll/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `LONGPOLL_*` overrides (highest priority)
//!
//! CLI flags are applied on top by the binary.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    deep_merge, load_settings, load_settings_from_path, settings_path, LoadedSettings,
    RejectedOverride,
};
pub use types::*;
