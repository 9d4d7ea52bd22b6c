/// Core configuration
///
/// # Environment Variables
///
/// - `DASHBOARD_ENABLE_DELETE`: allow dashboard deletion (default: true)
/// - `HISTORY_QUEUE_CAPACITY`: pending history snapshots before new ones are
///   dropped (default: 1024)

use serde::{Deserialize, Serialize};
use std::env;

/// Default capacity of the history queue
pub const DEFAULT_HISTORY_QUEUE_CAPACITY: usize = 1024;

/// Error raised while reading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Settings consumed by the lifecycle services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    pub dashboard: DashboardConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// When false every delete is refused before any lookup
    pub enable_delete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub queue_capacity: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            dashboard: DashboardConfig {
                enable_delete: true,
            },
            history: HistoryConfig {
                queue_capacity: DEFAULT_HISTORY_QUEUE_CAPACITY,
            },
        }
    }
}

impl CoreConfig {
    /// Loads settings from the environment, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(value) = env::var("DASHBOARD_ENABLE_DELETE") {
            config.dashboard.enable_delete = parse_bool(&value).ok_or(ConfigError::Invalid {
                name: "DASHBOARD_ENABLE_DELETE",
                value,
            })?;
        }

        if let Ok(value) = env::var("HISTORY_QUEUE_CAPACITY") {
            config.history.queue_capacity = match value.parse::<usize>() {
                Ok(capacity) if capacity > 0 => capacity,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "HISTORY_QUEUE_CAPACITY",
                        value,
                    })
                }
            };
        }

        Ok(config)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
