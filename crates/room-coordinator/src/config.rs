//! Room coordinator configuration.
//!
//! Configuration is loaded from environment variables. The optional access
//! token is redacted in Debug output.

use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

use crate::signaling::{Credentials, PublishOptions};

/// Default mailbox capacity for the room actor.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// Default coordinator instance ID prefix.
pub const DEFAULT_COORDINATOR_ID_PREFIX: &str = "room";

/// Room coordinator configuration.
#[derive(Clone)]
pub struct Config {
    /// Unique identifier for this coordinator instance.
    pub coordinator_id: String,

    /// Bounded capacity of the room actor mailbox (default: 256).
    pub mailbox_capacity: usize,

    /// Ask the server to record publishes unless the caller overrides it.
    pub record_by_default: bool,

    /// Open a data channel on publishes unless the caller overrides it.
    pub data_by_default: bool,

    /// Encoded room token, when the room is configured up front.
    /// `None` defers credentials to the `connect` call.
    pub access_token: Option<SecretString>,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("coordinator_id", &self.coordinator_id)
            .field("mailbox_capacity", &self.mailbox_capacity)
            .field("record_by_default", &self.record_by_default)
            .field("data_by_default", &self.data_by_default)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidValue` if a variable is set but unparseable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidValue` if a variable is set but unparseable.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mailbox_capacity = match vars.get("ROOM_MAILBOX_CAPACITY") {
            Some(raw) => {
                let capacity: usize = raw.parse().map_err(|e| {
                    ConfigError::InvalidValue(format!("ROOM_MAILBOX_CAPACITY={raw}: {e}"))
                })?;
                if capacity == 0 {
                    return Err(ConfigError::InvalidValue(
                        "ROOM_MAILBOX_CAPACITY must be greater than zero".to_string(),
                    ));
                }
                capacity
            }
            None => DEFAULT_MAILBOX_CAPACITY,
        };

        let record_by_default = parse_flag(vars, "ROOM_RECORD_BY_DEFAULT")?;
        let data_by_default = parse_flag(vars, "ROOM_DATA_BY_DEFAULT")?;

        let access_token = vars
            .get("ROOM_ACCESS_TOKEN")
            .filter(|token| !token.is_empty())
            .map(|token| SecretString::from(token.clone()));

        // Generate coordinator instance ID
        let coordinator_id = vars.get("ROOM_COORDINATOR_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_COORDINATOR_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            coordinator_id,
            mailbox_capacity,
            record_by_default,
            data_by_default,
            access_token,
        })
    }

    /// Publish options derived from the configured defaults.
    #[must_use]
    pub fn default_publish_options(&self) -> PublishOptions {
        PublishOptions {
            data_enabled: self.data_by_default,
            record: self.record_by_default,
        }
    }

    /// Credentials from the configured access token, if any.
    #[must_use]
    pub fn credentials(&self) -> Option<Credentials> {
        self.access_token.as_ref().map(|token| Credentials {
            token: token.clone(),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            coordinator_id: format!("{DEFAULT_COORDINATOR_ID_PREFIX}-local"),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            record_by_default: false,
            data_by_default: false,
            access_token: None,
        }
    }
}

fn parse_flag(vars: &HashMap<String, String>, name: &str) -> Result<bool, ConfigError> {
    match vars.get(name).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(ConfigError::InvalidValue(format!("{name}={v}"))),
        },
    }
}
