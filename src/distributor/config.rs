use crate::client::ClientConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Distributor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributorConfig {
    /// Deadline applied to every replica call of a write
    pub remote_timeout: Duration,

    /// Transport settings for the replica client pool
    pub client: ClientConfig,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            remote_timeout: Duration::from_secs(2),
            client: ClientConfig::default(),
        }
    }
}

impl DistributorConfig {
    /// Set the per-replica write deadline
    pub fn remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    /// Set client transport settings
    pub fn client(mut self, client: ClientConfig) -> Self {
        self.client = client;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.remote_timeout.is_zero() {
            return Err("remote_timeout must be greater than zero".to_string());
        }
        self.client.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_remote_timeout() {
        let cfg = DistributorConfig::default();
        assert_eq!(cfg.remote_timeout, Duration::from_secs(2));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_zero_timeouts_are_rejected() {
        assert!(
            DistributorConfig::default()
                .remote_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(
            DistributorConfig::default()
                .client(ClientConfig::default().connect_timeout(Duration::ZERO))
                .validate()
                .is_err()
        );
    }
}
