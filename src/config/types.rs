use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{ConfigResult, ConfigValidator};

/// Settings shared by the blocking and async balancing clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BalancingClientConfig {
    /// Upper bound on transport calls per logical request
    pub max_attempts: u32,
    /// Logical service name used in logs and metric labels
    pub service_type: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// How often a `PoolUpdater` polls its inventory
    pub discovery_refresh_secs: u64,
}

impl Default for BalancingClientConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            service_type: "unknown".to_string(),
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
            discovery_refresh_secs: 10,
        }
    }
}

impl BalancingClientConfig {
    /// Parse and validate a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn discovery_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.discovery_refresh_secs)
    }
}
