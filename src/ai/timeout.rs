//! Unified Timeout Configuration
//!
//! Every call to an external collaborator (inference, repository source,
//! code scanner) runs under a deadline. An elapsed deadline surfaces as
//! `ArchError::Timeout`, which classifies as an upstream failure.
//!
//! ```ignore
//! let tree = with_timeout(timeouts.repository, source.fetch_structure(id), "fetch_structure").await?;
//! ```

use std::future::Future;
use std::time::Duration;

use crate::config::Config;
use crate::constants::{network, timeouts};
use crate::types::{ArchError, Result};

/// Deadlines for external collaborator calls
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// One inference request (planner or responder)
    pub inference: Duration,
    /// Repository listing, fetch, and search
    pub repository: Duration,
    /// Code analysis of one repository
    pub scanner: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            inference: Duration::from_secs(network::DEFAULT_TIMEOUT_SECS),
            repository: Duration::from_secs(timeouts::DEFAULT_REPOSITORY_SECS),
            scanner: Duration::from_secs(timeouts::DEFAULT_SCANNER_SECS),
        }
    }
}

impl TimeoutConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            inference: config.llm.timeout(),
            repository: Duration::from_secs(config.timeouts.repository_secs),
            scanner: Duration::from_secs(config.timeouts.scanner_secs),
        }
    }
}

/// Execute an async operation with a timeout
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(ArchError::timeout(operation_name, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorKind;

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.timeouts.scanner_secs = 5;
        config.llm.timeout_secs = 9;
        let timeouts = TimeoutConfig::from_config(&config);
        assert_eq!(timeouts.scanner, Duration::from_secs(5));
        assert_eq!(timeouts.inference, Duration::from_secs(9));
    }

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(
            Duration::from_secs(1),
            async { Ok::<_, ArchError>(42) },
            "test operation",
        )
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_timeout_expires_as_upstream() {
        let err = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, ArchError>(42)
            },
            "slow operation",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ArchError::Timeout { .. }));
        assert_eq!(err.kind(), ErrorKind::Upstream);
    }
}
