//! Runtime configuration loaded from environment variables.
//!
//! | Variable                  | Default                                |
//! |---------------------------|----------------------------------------|
//! | `WEBHOOK_PORT`            | `9443`                                 |
//! | `HEALTH_PORT`             | `8080`                                 |
//! | `WEBHOOK_CERT_PATH`       | `/etc/webhook/certs/tls.crt`           |
//! | `WEBHOOK_KEY_PATH`        | `/etc/webhook/certs/tls.key`           |
//! | `CATALOG_FINALIZER`       | `kubernetes-incubator/service-catalog` |
//! | `DEFAULT_RELIST_BEHAVIOR` | `Duration`                             |

use std::path::PathBuf;

use thiserror::Error;

use crate::crd::{FINALIZER_SERVICE_CATALOG, RelistBehavior};
use crate::mutation::MutationDefaults;

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 9443;
/// Default health server port
pub const HEALTH_PORT: u16 = 8080;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings for the webhook binary. Built once at startup and never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookConfig {
    pub webhook_port: u16,
    pub health_port: u16,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    /// Values the mutation rules fill in.
    pub defaults: MutationDefaults,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            webhook_port: WEBHOOK_PORT,
            health_port: HEALTH_PORT,
            cert_path: PathBuf::from(WEBHOOK_CERT_PATH),
            key_path: PathBuf::from(WEBHOOK_KEY_PATH),
            defaults: MutationDefaults::default(),
        }
    }
}

impl WebhookConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load using `lookup` to resolve variables. Unset variables take their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let webhook_port = match lookup("WEBHOOK_PORT") {
            Some(value) => parse_port("WEBHOOK_PORT", value)?,
            None => WEBHOOK_PORT,
        };
        let health_port = match lookup("HEALTH_PORT") {
            Some(value) => parse_port("HEALTH_PORT", value)?,
            None => HEALTH_PORT,
        };

        let finalizer = match lookup("CATALOG_FINALIZER") {
            Some(value) if value.trim().is_empty() => {
                return Err(ConfigError::InvalidValue {
                    var: "CATALOG_FINALIZER",
                    value,
                    reason: "finalizer must not be empty".to_string(),
                });
            }
            Some(value) => value,
            None => FINALIZER_SERVICE_CATALOG.to_string(),
        };

        let relist_behavior = match lookup("DEFAULT_RELIST_BEHAVIOR") {
            Some(value) => {
                value
                    .parse::<RelistBehavior>()
                    .map_err(|e| ConfigError::InvalidValue {
                        var: "DEFAULT_RELIST_BEHAVIOR",
                        value: value.clone(),
                        reason: e.to_string(),
                    })?
            }
            None => RelistBehavior::Duration,
        };

        Ok(Self {
            webhook_port,
            health_port,
            cert_path: lookup("WEBHOOK_CERT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(WEBHOOK_CERT_PATH)),
            key_path: lookup("WEBHOOK_KEY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(WEBHOOK_KEY_PATH)),
            defaults: MutationDefaults {
                finalizer,
                relist_behavior,
            },
        })
    }
}

fn parse_port(var: &'static str, value: String) -> Result<u16, ConfigError> {
    match value.parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        Ok(_) => Err(ConfigError::InvalidValue {
            var,
            value,
            reason: "port must be non-zero".to_string(),
        }),
        Err(e) => Err(ConfigError::InvalidValue {
            var,
            value,
            reason: e.to_string(),
        }),
    }
}
