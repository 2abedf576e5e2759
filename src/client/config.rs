use crate::core::{DistributorError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Transport settings for replica clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// TCP connect timeout
    pub connect_timeout: Duration,

    /// How long an idle pooled connection is kept
    pub pool_idle_timeout: Option<Duration>,

    /// Maximum idle connections kept per replica
    pub pool_max_idle_per_host: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 16,
        }
    }
}

impl ClientConfig {
    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set idle timeout for pooled connections
    pub fn pool_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Set maximum idle connections per replica
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.connect_timeout.is_zero() {
            return Err("connect_timeout must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Builds the shared HTTP client used for every replica.
    pub fn build_http_client(&self) -> Result<reqwest::Client> {
        self.validate().map_err(DistributorError::Config)?;
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .pool_idle_timeout(self.pool_idle_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .build()
            .map_err(|err| DistributorError::Config(format!("failed to build HTTP client: {}", err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.connect_timeout, Duration::from_secs(5));
        assert_eq!(cfg.pool_max_idle_per_host, 16);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_zero_connect_timeout_is_rejected() {
        let cfg = ClientConfig::default().connect_timeout(Duration::ZERO);
        assert!(cfg.validate().is_err());
        assert!(cfg.build_http_client().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let cfg = ClientConfig::default().pool_max_idle_per_host(4);
        let json = serde_json::to_string(&cfg).unwrap();
        let decoded: ClientConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, cfg);
    }
}
