//! DynamoDB table service
//!
//! Provides `DynamoDbTableService`, which implements the core `TableService`
//! trait with `ListTables`, `DescribeTable` and segmented `Scan` calls.
//!
//! Retries are the SDK's job: the client is built with a standard retry
//! config (`max_attempts`, default 5). Errors that survive the retries are
//! classified into `ServiceError` by their DynamoDB error code.

pub mod convert;

use crate::error::{AwsError, Result};
use async_trait::async_trait;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::RequestId;
use aws_sdk_dynamodb::types::{KeySchemaElement as SdkKeySchemaElement, KeyType as SdkKeyType};
use aws_sdk_dynamodb::Client;
use aws_smithy_types::retry::RetryConfig;
use aws_smithy_types::timeout::TimeoutConfig;
use lazydynamo_core::{
    KeySchemaElement, KeyType, ScanPage, ScanRequest, ServiceError, TableService, TablesPage,
};
use std::time::Duration;

/// SDK attempts per call, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// DynamoDB client configuration
#[derive(Debug, Clone)]
pub struct DynamoDbConfig {
    /// AWS region (optional, uses SDK default if not specified)
    pub region: Option<String>,
    /// Optional endpoint override (e.g. LocalStack)
    pub endpoint: Option<String>,
    /// Per-operation timeout in milliseconds
    pub timeout_ms: Option<u64>,
    /// Attempts per call including the first
    pub max_attempts: u32,
}

impl Default for DynamoDbConfig {
    fn default() -> Self {
        Self {
            region: None,
            endpoint: None,
            timeout_ms: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Read-only DynamoDB access for the browser
#[derive(Clone)]
pub struct DynamoDbTableService {
    client: Client,
}

impl std::fmt::Debug for DynamoDbTableService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let conf = self.client.config();
        f.debug_struct("DynamoDbTableService")
            .field("region", &conf.region().map(|r| r.as_ref().to_string()))
            .finish()
    }
}

impl DynamoDbTableService {
    /// Create a service from a loaded `SdkConfig`
    ///
    /// Configuration:
    /// - `region`: Override SDK region (uses SDK default if not specified)
    /// - `endpoint`: Override the endpoint URL
    /// - `timeout_ms`: Operation timeout in milliseconds
    /// - `max_attempts`: Standard retry attempts per call
    pub fn new(sdk_config: &aws_config::SdkConfig, config: DynamoDbConfig) -> Result<Self> {
        if config.max_attempts == 0 {
            return Err(AwsError::invalid_config("max_attempts must be at least 1"));
        }
        if config.timeout_ms == Some(0) {
            return Err(AwsError::invalid_config("timeout_ms must be greater than 0"));
        }
        if matches!(config.endpoint.as_deref(), Some(e) if e.trim().is_empty()) {
            return Err(AwsError::invalid_config("endpoint must not be empty"));
        }

        // Inherit HTTP client, credentials and sleep impl from the SdkConfig,
        // then apply overrides
        let mut builder = aws_sdk_dynamodb::config::Builder::from(sdk_config);

        if let Some(region) = config.region {
            builder = builder.region(aws_sdk_dynamodb::config::Region::new(region));
        }

        if let Some(endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        if let Some(timeout_ms) = config.timeout_ms {
            let timeout_config = TimeoutConfig::builder()
                .operation_timeout(Duration::from_millis(timeout_ms))
                .build();
            builder = builder.timeout_config(timeout_config);
        }

        builder =
            builder.retry_config(RetryConfig::standard().with_max_attempts(config.max_attempts));

        let client = Client::from_conf(builder.build());
        if client.config().region().is_none() {
            return Err(AwsError::dynamodb(
                "no AWS region configured (set --region, AWS_REGION or a profile region)",
            ));
        }

        Ok(Self { client })
    }

    /// Load the default AWS config chain and create a service
    pub async fn connect(config: DynamoDbConfig) -> Result<Self> {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(&sdk_config, config)
    }

    /// Create from a pre-built client (for testing)
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// One-line summary of an SDK error: code, message and request id when the
/// service answered, the full error chain otherwise
fn format_sdk_error<E>(err: &SdkError<E>) -> String
where
    E: ProvideErrorMetadata + RequestId + std::error::Error + 'static,
{
    if let Some(service_err) = err.as_service_error() {
        let code = service_err.code().unwrap_or("ServiceError");
        let message = service_err.message().unwrap_or("").trim();
        let mut summary = if message.is_empty() {
            code.to_string()
        } else {
            format!("{code}: {message}")
        };
        if let Some(request_id) = service_err.request_id() {
            summary.push_str(&format!(" (request id: {request_id})"));
        }
        return summary;
    }
    DisplayErrorContext(err).to_string()
}

fn classify<E>(operation: &str, err: &SdkError<E>) -> ServiceError
where
    E: ProvideErrorMetadata + RequestId + std::error::Error + 'static,
{
    let message = format!("DynamoDB {operation} failed: {}", format_sdk_error(err));
    if matches!(err, SdkError::TimeoutError(_)) {
        return ServiceError::timeout(message);
    }
    match err.as_service_error().and_then(|e| e.code()) {
        Some("ResourceNotFoundException") => ServiceError::not_found(message),
        Some(
            "ProvisionedThroughputExceededException"
            | "ThrottlingException"
            | "RequestLimitExceeded",
        ) => ServiceError::throttled(message),
        Some(
            "UnrecognizedClientException"
            | "AccessDeniedException"
            | "ExpiredTokenException"
            | "InvalidSignatureException"
            | "MissingAuthenticationTokenException",
        ) => ServiceError::unauthorized(message),
        Some("ValidationException") => ServiceError::invalid_request(message),
        _ => ServiceError::service(message),
    }
}

fn key_schema_element(element: &SdkKeySchemaElement) -> Option<KeySchemaElement> {
    let SdkKeySchemaElement {
        attribute_name,
        key_type,
        ..
    } = element;
    let key_type = match key_type {
        SdkKeyType::Hash => KeyType::Partition,
        SdkKeyType::Range => KeyType::Sort,
        other => {
            tracing::warn!(key_type = ?other, attribute = %attribute_name, "ignoring unknown key type");
            return None;
        }
    };
    Some(KeySchemaElement {
        attribute_name: attribute_name.clone(),
        key_type,
    })
}

#[async_trait]
impl TableService for DynamoDbTableService {
    async fn list_tables(
        &self,
        exclusive_start: Option<String>,
    ) -> lazydynamo_core::Result<TablesPage> {
        let response = self
            .client
            .list_tables()
            .set_exclusive_start_table_name(exclusive_start)
            .send()
            .await
            .map_err(|e| classify("ListTables", &e))?;

        Ok(TablesPage {
            names: response.table_names().to_vec(),
            last_evaluated: response.last_evaluated_table_name().map(str::to_string),
        })
    }

    async fn describe_key_schema(
        &self,
        table: &str,
    ) -> lazydynamo_core::Result<Vec<KeySchemaElement>> {
        let response = self
            .client
            .describe_table()
            .table_name(table)
            .send()
            .await
            .map_err(|e| classify("DescribeTable", &e))?;

        let description = response.table().ok_or_else(|| {
            ServiceError::service(format!("DescribeTable returned no description for '{table}'"))
        })?;
        Ok(description
            .key_schema()
            .iter()
            .filter_map(key_schema_element)
            .collect())
    }

    async fn scan_segment(&self, request: ScanRequest) -> lazydynamo_core::Result<ScanPage> {
        let mut scan = self
            .client
            .scan()
            .table_name(&request.table)
            .limit(request.limit)
            .segment(request.segment)
            .total_segments(request.total_segments);

        if let Some(key) = &request.exclusive_start_key {
            scan = scan.set_exclusive_start_key(Some(convert::record_to_item(key)));
        }

        let response = scan.send().await.map_err(|e| classify("Scan", &e))?;

        let items = response
            .items()
            .iter()
            .map(convert::item_to_record)
            .collect();
        let last_evaluated_key = match response.last_evaluated_key() {
            Some(key) if !key.is_empty() => Some(convert::item_to_record(key)),
            _ => None,
        };

        Ok(ScanPage {
            items,
            last_evaluated_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sdk_config() -> aws_config::SdkConfig {
        aws_config::SdkConfig::builder()
            .behavior_version(aws_config::BehaviorVersion::latest())
            .build()
    }

    #[test]
    fn test_default_config() {
        let config = DynamoDbConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert!(config.region.is_none());
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let err = DynamoDbTableService::new(
            &sdk_config(),
            DynamoDbConfig {
                region: Some("us-east-1".into()),
                max_attempts: 0,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, AwsError::InvalidConfig(_)));
    }

    #[test]
    fn test_requires_region() {
        let err = DynamoDbTableService::new(&sdk_config(), DynamoDbConfig::default()).unwrap_err();
        assert!(matches!(err, AwsError::DynamoDB(_)));
    }

    #[test]
    fn test_builds_with_overrides() {
        let service = DynamoDbTableService::new(
            &sdk_config(),
            DynamoDbConfig {
                region: Some("eu-west-1".into()),
                endpoint: Some("http://localhost:4566".into()),
                timeout_ms: Some(2_000),
                max_attempts: 3,
            },
        )
        .unwrap();
        assert_eq!(
            service.client().config().region().map(|r| r.as_ref()),
            Some("eu-west-1")
        );
        assert!(format!("{service:?}").contains("eu-west-1"));
    }

    #[test]
    fn test_key_schema_mapping() {
        let hash = SdkKeySchemaElement::builder()
            .attribute_name("pk")
            .key_type(SdkKeyType::Hash)
            .build()
            .unwrap();
        let range = SdkKeySchemaElement::builder()
            .attribute_name("sk")
            .key_type(SdkKeyType::Range)
            .build()
            .unwrap();
        assert_eq!(
            key_schema_element(&hash),
            Some(KeySchemaElement::partition("pk"))
        );
        assert_eq!(
            key_schema_element(&range),
            Some(KeySchemaElement::sort("sk"))
        );
    }
}
