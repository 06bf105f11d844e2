//! Error types for the DynamoDB backend

use thiserror::Error;

/// Errors building the DynamoDB client
///
/// Failures of individual calls are reported as
/// [`ServiceError`](lazydynamo_core::ServiceError) instead.
#[derive(Debug, Error)]
pub enum AwsError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// DynamoDB SDK error
    #[error("DynamoDB error: {0}")]
    DynamoDB(String),
}

impl AwsError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn dynamodb(msg: impl Into<String>) -> Self {
        Self::DynamoDB(msg.into())
    }
}

/// Result type for AWS backend construction
pub type Result<T> = std::result::Result<T, AwsError>;
