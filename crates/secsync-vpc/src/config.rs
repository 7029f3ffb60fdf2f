//! Adapter configuration

use crate::error::{Result, VpcError};
use std::time::Duration;

pub const ENDPOINT_ENV: &str = "SECSYNC_API_ENDPOINT";
pub const TOKEN_ENV: &str = "SECSYNC_API_TOKEN";
pub const REGION_ENV: &str = "SECSYNC_REGION";
pub const TIMEOUT_ENV: &str = "SECSYNC_TIMEOUT_SECS";

/// Request timeout when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`crate::VpcClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpcConfig {
    /// Base URL of the VPC API, e.g. `https://vpc.example.com/v1`
    pub endpoint: String,

    pub api_token: String,

    /// Sent as `X-Region` when set
    pub region: Option<String>,

    pub timeout: Duration,
}

impl VpcConfig {
    pub fn new(endpoint: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_token: api_token.into(),
            region: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create VpcConfig from environment variables
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var(ENDPOINT_ENV)
            .map_err(|_| VpcError::MissingEnvVar(ENDPOINT_ENV.to_string()))?;
        let api_token = std::env::var(TOKEN_ENV)
            .map_err(|_| VpcError::MissingEnvVar(TOKEN_ENV.to_string()))?;

        let mut config = Self::new(endpoint, api_token);

        if let Some(region) = std::env::var(REGION_ENV).ok().filter(|r| !r.is_empty()) {
            config = config.with_region(region);
        }

        if let Ok(value) = std::env::var(TIMEOUT_ENV) {
            let secs: u64 = value.trim().parse().map_err(|_| {
                VpcError::InvalidConfig(format!(
                    "{} must be a number of seconds: {}",
                    TIMEOUT_ENV, value
                ))
            })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(VpcError::InvalidConfig(format!(
                "endpoint must be an http(s) URL: {}",
                self.endpoint
            )));
        }
        if self.api_token.trim().is_empty() {
            return Err(VpcError::InvalidConfig("API token is empty".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(VpcError::InvalidConfig("timeout must be positive".to_string()));
        }
        Ok(())
    }

    /// Full URL for an API path
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
