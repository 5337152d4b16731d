use super::*;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &BalancingClientConfig) -> ConfigResult<()> {
        if config.max_attempts < 1 {
            return Err(ConfigError::InvalidValue {
                field: "max_attempts".to_string(),
                value: config.max_attempts.to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }

        if config.service_type.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "service_type".to_string(),
            });
        }

        Self::validate_positive_secs("request_timeout_secs", config.request_timeout_secs)?;
        Self::validate_positive_secs("connect_timeout_secs", config.connect_timeout_secs)?;
        Self::validate_positive_secs("discovery_refresh_secs", config.discovery_refresh_secs)?;

        Ok(())
    }

    fn validate_positive_secs(field: &str, value: u64) -> ConfigResult<()> {
        if value == 0 {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                value: value.to_string(),
                reason: "Must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ConfigValidator::validate(&BalancingClientConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        for field in [
            "request_timeout_secs",
            "connect_timeout_secs",
            "discovery_refresh_secs",
        ] {
            let mut config = BalancingClientConfig::default();
            match field {
                "request_timeout_secs" => config.request_timeout_secs = 0,
                "connect_timeout_secs" => config.connect_timeout_secs = 0,
                _ => config.discovery_refresh_secs = 0,
            }
            match ConfigValidator::validate(&config) {
                Err(ConfigError::InvalidValue { field: f, .. }) => assert_eq!(f, field),
                other => panic!("expected {field} to be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_blank_service_type_rejected() {
        let config = BalancingClientConfig {
            service_type: "   ".to_string(),
            ..Default::default()
        };
        let err = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: service_type");
    }
}
