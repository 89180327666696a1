//! Amazon S3 backend for the bucket inventory.
//!
//! Copies the fields the inventory needs out of `aws-sdk-s3` responses so the
//! domain model never sees SDK types.

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::types::{LoggingEnabled, ServerSideEncryptionConfiguration};
use aws_sdk_s3::Client;
use tracing::debug;

use bucketlens_core::{
    ApiError, ClientFactory, EncryptionConfig, EncryptionRule, InventoryConfig, InventoryError, LoggingConfig,
    StorageApi,
};

/// [`StorageApi`] over one `aws_sdk_s3::Client`.
#[derive(Debug, Clone)]
pub struct S3Api {
    client: Client,
}

impl S3Api {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_sdk_config(sdk: &SdkConfig, force_path_style: bool) -> Self {
        let conf = aws_sdk_s3::config::Builder::from(sdk).force_path_style(force_path_style).build();
        Self::new(Client::from_conf(conf))
    }
}

fn api_error<E>(err: &SdkError<E>) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    ApiError::new(err.code().map(str::to_owned), DisplayErrorContext(err).to_string())
}

fn encryption_config(sse: &ServerSideEncryptionConfiguration) -> EncryptionConfig {
    let rules = sse
        .rules()
        .iter()
        .map(|rule| {
            let default = rule.apply_server_side_encryption_by_default();
            EncryptionRule {
                sse_algorithm: default.map(|d| d.sse_algorithm().as_str().to_owned()).unwrap_or_default(),
                kms_master_key_id: default.and_then(|d| d.kms_master_key_id()).map(str::to_owned),
                bucket_key_enabled: rule.bucket_key_enabled(),
            }
        })
        .collect();
    EncryptionConfig { rules }
}

fn logging_config(enabled: &LoggingEnabled) -> LoggingConfig {
    LoggingConfig {
        target_bucket: enabled.target_bucket().to_owned(),
        target_prefix: enabled.target_prefix().to_owned(),
    }
}

#[async_trait]
impl StorageApi for S3Api {
    async fn list_buckets(&self) -> Result<Vec<String>, ApiError> {
        let mut names = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let resp = self
                .client
                .list_buckets()
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(|e| api_error(&e))?;
            names.extend(resp.buckets().iter().filter_map(|b| b.name()).map(str::to_owned));
            match resp.continuation_token() {
                Some(next) if !next.is_empty() => token = Some(next.to_owned()),
                _ => break,
            }
        }
        debug!(buckets = names.len(), "ListBuckets done");
        Ok(names)
    }

    async fn bucket_region(&self, bucket: &str) -> Result<Option<String>, ApiError> {
        let resp = self
            .client
            .get_bucket_location()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| api_error(&e))?;
        Ok(resp.location_constraint().map(|c| c.as_str().to_owned()))
    }

    async fn bucket_policy(&self, bucket: &str) -> Result<Option<String>, ApiError> {
        let resp = self
            .client
            .get_bucket_policy()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| api_error(&e))?;
        Ok(resp.policy().map(str::to_owned))
    }

    async fn bucket_encryption(&self, bucket: &str) -> Result<Option<EncryptionConfig>, ApiError> {
        let resp = self
            .client
            .get_bucket_encryption()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| api_error(&e))?;
        Ok(resp.server_side_encryption_configuration().map(encryption_config))
    }

    async fn bucket_logging(&self, bucket: &str) -> Result<Option<LoggingConfig>, ApiError> {
        let resp = self
            .client
            .get_bucket_logging()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| api_error(&e))?;
        Ok(resp.logging_enabled().map(logging_config))
    }
}

/// Load the shared config for one region. Only the region is validated here;
/// the default chain always installs a credentials provider and credentials
/// are resolved lazily on the first request.
async fn load_sdk_config(
    region: &str,
    profile: Option<&str>,
    endpoint_url: Option<&str>,
) -> Result<SdkConfig, InventoryError> {
    if region.trim().is_empty() {
        return Err(InventoryError::ClientConstruction {
            region: region.to_owned(),
            message: "region must not be empty".to_owned(),
        });
    }

    let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_owned()));
    if let Some(p) = profile {
        loader = loader.profile_name(p);
    }
    if let Some(url) = endpoint_url {
        loader = loader.endpoint_url(url);
    }
    Ok(loader.load().await)
}

/// Build the client used for listing and region lookups.
pub async fn connect(config: &InventoryConfig) -> Result<S3Api, InventoryError> {
    let sdk = load_sdk_config(&config.default_region, config.profile.as_deref(), config.endpoint_url.as_deref()).await?;
    Ok(S3Api::from_sdk_config(&sdk, config.force_path_style))
}

/// Builds an [`S3Api`] per region from the shared AWS config chain.
#[derive(Debug, Clone, Default)]
pub struct S3ClientFactory {
    endpoint_url: Option<String>,
    force_path_style: bool,
}

impl S3ClientFactory {
    pub fn from_config(config: &InventoryConfig) -> Self {
        Self { endpoint_url: config.endpoint_url.clone(), force_path_style: config.force_path_style }
    }
}

#[async_trait]
impl ClientFactory for S3ClientFactory {
    async fn regional_client(&self, region: &str, profile: Option<&str>) -> Result<Arc<dyn StorageApi>, InventoryError> {
        let sdk = load_sdk_config(region, profile, self.endpoint_url.as_deref()).await?;
        Ok(Arc::new(S3Api::from_sdk_config(&sdk, self.force_path_style)))
    }
}
