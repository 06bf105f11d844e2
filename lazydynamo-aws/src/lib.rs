//! Amazon DynamoDB backend for lazydynamo
//!
//! Implements the core [`TableService`](lazydynamo_core::TableService) trait
//! on top of `aws-sdk-dynamodb`.
//!
//! ## Usage
//!
//! ```ignore
//! use lazydynamo_aws::{DynamoDbConfig, DynamoDbTableService};
//!
//! let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
//! let service = DynamoDbTableService::new(
//!     &sdk_config,
//!     DynamoDbConfig {
//!         region: Some("us-east-1".to_string()),
//!         ..Default::default()
//!     },
//! )?;
//! let tables = service.list_all_tables().await?;
//! ```

pub mod dynamodb;
pub mod error;

pub use dynamodb::{DynamoDbConfig, DynamoDbTableService, DEFAULT_MAX_ATTEMPTS};
pub use error::{AwsError, Result};
