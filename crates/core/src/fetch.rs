use std::sync::Arc;

use bucketlens_policy::{parse_policy, ParsedPolicy};
use tracing::{debug, instrument, warn};

use crate::config::FailurePolicy;
use crate::error::{InventoryError, Operation, NO_SUCH_BUCKET_POLICY, SSE_CONFIGURATION_NOT_FOUND};
use crate::fanout::run_all;
use crate::model::{BucketRecord, EncryptionConfig, LoggingConfig};
use crate::provider::StorageApi;
use crate::region::RegionalClients;

/// Per-bucket attributes fetched in parallel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Policy,
    Encryption,
    Logging,
}

impl Attribute {
    pub const ALL: [Attribute; 3] = [Attribute::Policy, Attribute::Encryption, Attribute::Logging];
}

#[derive(Debug)]
enum Fetched {
    Policy(Option<ParsedPolicy>),
    Encryption(Option<EncryptionConfig>),
    Logging(Option<LoggingConfig>),
}

/// Fetch policy, encryption and logging for every bucket: 3 tasks per bucket,
/// each using the client of the bucket's region.
#[instrument(skip_all, fields(buckets = buckets.len(), regions = clients.len()))]
pub async fn fetch_metadata(
    clients: &RegionalClients,
    buckets: &mut [BucketRecord],
    policy: FailurePolicy,
) -> Result<(), InventoryError> {
    let mut jobs = Vec::with_capacity(buckets.len() * Attribute::ALL.len());
    for (index, bucket) in buckets.iter().enumerate() {
        let api = clients.for_bucket(bucket)?;
        for attribute in Attribute::ALL {
            jobs.push(fetch_one(index, Arc::clone(&api), bucket.name().to_owned(), attribute));
        }
    }

    for (index, fetched) in run_all("metadata", jobs, policy).await? {
        let bucket = &mut buckets[index];
        match fetched {
            Fetched::Policy(parsed) => {
                if let Some(parsed) = &parsed {
                    for diagnostic in &parsed.diagnostics {
                        warn!(bucket = bucket.name(), %diagnostic, "policy value skipped");
                    }
                }
                bucket.set_policy(parsed);
            }
            Fetched::Encryption(encryption) => bucket.set_encryption(encryption),
            Fetched::Logging(logging) => bucket.set_logging(logging),
        }
    }
    Ok(())
}

async fn fetch_one(
    index: usize,
    api: Arc<dyn StorageApi>,
    bucket: String,
    attribute: Attribute,
) -> Result<(usize, Fetched), InventoryError> {
    let fetched = match attribute {
        Attribute::Policy => {
            let text = match api.bucket_policy(&bucket).await {
                Ok(text) => text,
                Err(e) if e.is_code(NO_SUCH_BUCKET_POLICY) => None,
                Err(e) => return Err(InventoryError::transport(&bucket, Operation::GetBucketPolicy, e)),
            };
            let parsed = text
                .map(|text| parse_policy(&text))
                .transpose()
                .map_err(|source| InventoryError::MalformedPolicy { bucket: bucket.clone(), source })?;
            Fetched::Policy(parsed)
        }
        Attribute::Encryption => match api.bucket_encryption(&bucket).await {
            Ok(config) => Fetched::Encryption(config),
            Err(e) if e.is_code(SSE_CONFIGURATION_NOT_FOUND) => Fetched::Encryption(None),
            Err(e) => return Err(InventoryError::transport(&bucket, Operation::GetBucketEncryption, e)),
        },
        Attribute::Logging => {
            let logging = api
                .bucket_logging(&bucket)
                .await
                .map_err(|e| InventoryError::transport(&bucket, Operation::GetBucketLogging, e))?;
            Fetched::Logging(logging)
        }
    };
    debug!(bucket = %bucket, ?attribute, "attribute fetched");
    Ok((index, fetched))
}
