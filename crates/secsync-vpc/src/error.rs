//! VPC adapter error types

use secsync::SyncError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VpcError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Security group not found: {0}")]
    GroupNotFound(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VpcError>;

impl From<VpcError> for SyncError {
    fn from(err: VpcError) -> Self {
        match err {
            VpcError::GroupNotFound(id) => SyncError::GroupNotFound(id),
            other => SyncError::ApiError(other.to_string()),
        }
    }
}
