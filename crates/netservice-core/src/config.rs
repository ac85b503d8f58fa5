//! Configuration for the network service orchestrator

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`NetworkService`](crate::NetworkService) instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// DNS-SD domain used by the convenience constructors
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Timeout for a single resolve operation (seconds)
    #[serde(default = "default_resolve_timeout")]
    pub resolve_timeout_secs: u64,

    /// Automatically resolve every service discovered while browsing
    #[serde(default)]
    pub auto_resolve: bool,

    /// Capacity of the command and event channels
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            resolve_timeout_secs: default_resolve_timeout(),
            auto_resolve: false,
            event_capacity: default_event_capacity(),
        }
    }
}

impl ServiceConfig {
    /// Returns the resolve timeout as a Duration
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.domain.is_empty() {
            return Err("domain cannot be empty".to_string());
        }

        if !self.domain.ends_with('.') {
            return Err(format!(
                "domain must be fully qualified (end with '.'): {}",
                self.domain
            ));
        }

        if self.resolve_timeout_secs == 0 {
            return Err("resolve_timeout_secs cannot be 0".to_string());
        }

        if self.event_capacity == 0 {
            return Err("event_capacity cannot be 0".to_string());
        }

        Ok(())
    }
}

// Default configuration values
fn default_domain() -> String {
    "local.".to_string()
}

fn default_resolve_timeout() -> u64 {
    30
}

fn default_event_capacity() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.domain, "local.");
        assert_eq!(config.resolve_timeout(), Duration::from_secs(30));
        assert!(!config.auto_resolve);
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = ServiceConfig {
            resolve_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unqualified_domain() {
        let config = ServiceConfig {
            domain: "local".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_domain() {
        let config = ServiceConfig {
            domain: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
