use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::config::FailurePolicy;
use crate::error::{InventoryError, Operation};
use crate::fanout::run_all;
use crate::model::{normalize_region, BucketRecord};
use crate::provider::{ClientFactory, StorageApi};

/// Look up every bucket's home region concurrently, one task per bucket.
#[instrument(skip_all, fields(buckets = buckets.len()))]
pub async fn resolve_regions(
    api: &Arc<dyn StorageApi>,
    buckets: &mut [BucketRecord],
    policy: FailurePolicy,
) -> Result<(), InventoryError> {
    let jobs: Vec<_> = buckets
        .iter()
        .enumerate()
        .map(|(index, bucket)| {
            let api = Arc::clone(api);
            let name = bucket.name().to_owned();
            async move {
                let raw = api
                    .bucket_region(&name)
                    .await
                    .map_err(|source| InventoryError::transport(&name, Operation::GetBucketRegion, source))?;
                let region = normalize_region(raw.as_deref());
                debug!(bucket = %name, %region, "region resolved");
                Ok((index, region))
            }
        })
        .collect();

    for (index, region) in run_all("region", jobs, policy).await? {
        buckets[index].set_region(region);
    }
    Ok(())
}

/// One client per distinct region, shared read-only by the fetch tasks.
pub struct RegionalClients {
    clients: HashMap<String, Arc<dyn StorageApi>>,
}

impl RegionalClients {
    /// Build clients for the regions `buckets` were resolved to, in bucket
    /// order, constructing each region's client only the first time it is seen.
    #[instrument(skip_all, fields(buckets = buckets.len()))]
    pub async fn build(
        factory: &dyn ClientFactory,
        buckets: &[BucketRecord],
        profile: Option<&str>,
    ) -> Result<Self, InventoryError> {
        let mut clients: HashMap<String, Arc<dyn StorageApi>> = HashMap::new();
        for bucket in buckets {
            let region = bucket
                .region()
                .ok_or_else(|| InventoryError::UnresolvedRegion { bucket: bucket.name().to_owned() })?;
            if clients.contains_key(region) {
                continue;
            }
            let client = factory.regional_client(region, profile).await?;
            debug!(region, "regional client built");
            clients.insert(region.to_owned(), client);
        }
        info!(regions = clients.len(), "regional clients ready");
        Ok(Self { clients })
    }

    pub fn get(&self, region: &str) -> Option<&Arc<dyn StorageApi>> {
        self.clients.get(region)
    }

    /// Client for the region `bucket` was resolved to.
    pub(crate) fn for_bucket(&self, bucket: &BucketRecord) -> Result<Arc<dyn StorageApi>, InventoryError> {
        bucket
            .region()
            .and_then(|r| self.get(r))
            .cloned()
            .ok_or_else(|| InventoryError::UnresolvedRegion { bucket: bucket.name().to_owned() })
    }

    pub fn len(&self) -> usize { self.clients.len() }
    pub fn is_empty(&self) -> bool { self.clients.is_empty() }

    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }
}

impl fmt::Debug for RegionalClients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut regions: Vec<_> = self.regions().collect();
        regions.sort_unstable();
        f.debug_struct("RegionalClients").field("regions", &regions).finish()
    }
}
