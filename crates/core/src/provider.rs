use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{ApiError, InventoryError};
use crate::model::{EncryptionConfig, LoggingConfig};

/// The storage-management calls an inventory pass needs.
///
/// Implementations return owned domain values so nothing above this seam
/// depends on a provider SDK. "Not configured" answers are surfaced as
/// errors with the provider's code; the fetcher decides which codes mean
/// absence.
#[async_trait]
pub trait StorageApi: Send + Sync {
    /// Names of every bucket visible to the caller, in listing order.
    async fn list_buckets(&self) -> Result<Vec<String>, ApiError>;

    /// Raw location constraint; `None` or empty for the default region.
    async fn bucket_region(&self, bucket: &str) -> Result<Option<String>, ApiError>;

    /// Policy document text, if the response carried one.
    async fn bucket_policy(&self, bucket: &str) -> Result<Option<String>, ApiError>;

    async fn bucket_encryption(&self, bucket: &str) -> Result<Option<EncryptionConfig>, ApiError>;

    /// `None` when access logging is disabled.
    async fn bucket_logging(&self, bucket: &str) -> Result<Option<LoggingConfig>, ApiError>;
}

/// Builds clients bound to one region.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn regional_client(&self, region: &str, profile: Option<&str>) -> Result<Arc<dyn StorageApi>, InventoryError>;
}
