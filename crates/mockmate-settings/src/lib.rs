//! # mockmate-settings
//!
//! Configuration for the MockMate server and streaming client.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`MockmateSettings::default()`]
//! 2. **User file**: `~/.mockmate/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `MOCKMATE_*` and `DEEPSEEK_*` overrides

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path, settings_path,
};
pub use types::*;
