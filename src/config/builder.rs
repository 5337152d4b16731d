use super::{BalancingClientConfig, ConfigResult, ConfigValidator};

/// Builder for BalancingClientConfig that wraps the config itself
#[derive(Debug, Clone, Default)]
pub struct BalancingClientConfigBuilder {
    config: BalancingClientConfig,
}

impl BalancingClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: BalancingClientConfig) -> Self {
        Self { config }
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.max_attempts = max_attempts;
        self
    }

    pub fn service_type(mut self, service_type: impl Into<String>) -> Self {
        self.config.service_type = service_type.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs;
        self
    }

    pub fn discovery_refresh_secs(mut self, secs: u64) -> Self {
        self.config.discovery_refresh_secs = secs;
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> ConfigResult<BalancingClientConfig> {
        ConfigValidator::validate(&self.config)?;
        Ok(self.config)
    }

    /// Return the configuration without validation
    pub fn build_unchecked(self) -> BalancingClientConfig {
        self.config
    }
}
