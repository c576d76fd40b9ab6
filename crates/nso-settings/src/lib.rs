//! # nso-settings
//!
//! Configuration for the NSO JSON-RPC client, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`NsoSettings::default()`]
//! 2. **Settings file**: `~/.nso/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `NSO_*` overrides (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! let settings = nso_settings::load_settings()?;
//! println!("NSO at {}:{}", settings.connection.host, settings.connection.port);
//! # Ok::<(), nso_settings::SettingsError>(())
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
