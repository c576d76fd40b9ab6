//! Settings type definitions.
//!
//! All types use camelCase JSON and `#[serde(default)]`, so a settings file
//! only needs the fields it changes.

use nso_core::RetryConfig;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "connection": { "host": "10.0.0.146", "port": 8080 },
///   "logging": { "level": "info" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NsoSettings {
    /// Server endpoint and credentials.
    pub connection: ConnectionSettings,
    /// Comet poller behavior.
    pub poller: PollerSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl NsoSettings {
    /// Reject values the client cannot use.
    pub fn validate(&self) -> Result<()> {
        self.connection.validate()?;
        if self.poller.channel_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "poller.channelCapacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Where and how to reach the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionSettings {
    /// `http` or `https`.
    pub protocol: String,
    /// IPv4 literal or host name.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Login user.
    pub username: String,
    /// Login password.
    #[serde(skip_serializing)]
    pub password: String,
    /// Verify the server certificate for `https`.
    pub tls_verify: bool,
    /// Timeout for ordinary calls in ms.
    pub request_timeout_ms: u64,
    /// Timeout for `comet` long-poll calls in ms.
    pub poll_timeout_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            username: "admin".to_string(),
            password: String::new(),
            tls_verify: true,
            request_timeout_ms: 30_000,
            poll_timeout_ms: 120_000,
        }
    }
}

impl ConnectionSettings {
    fn validate(&self) -> Result<()> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(SettingsError::InvalidValue(format!(
                "connection.protocol must be http or https, got {}",
                self.protocol
            )));
        }
        if self.port == 0 {
            return Err(SettingsError::InvalidValue(
                "connection.port must be between 1 and 65535".into(),
            ));
        }
        if self.request_timeout_ms == 0 || self.poll_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "connection timeouts must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Comet poller behavior.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PollerSettings {
    /// Capacity of the event delivery channel.
    pub channel_capacity: usize,
    /// Backoff for transient poll failures.
    pub retry: RetryConfig,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            retry: RetryConfig::default(),
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: nso_core::logging::DEFAULT_LEVEL.to_string(),
        }
    }
}
