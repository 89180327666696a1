use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::InventoryConfig;
use crate::error::InventoryError;
use crate::fetch::fetch_metadata;
use crate::model::BucketRecord;
use crate::provider::{ClientFactory, StorageApi};
use crate::region::{resolve_regions, RegionalClients};

/// List every bucket visible to the account, names only.
#[instrument(skip_all)]
pub async fn load_names(api: &dyn StorageApi) -> Result<Vec<BucketRecord>, InventoryError> {
    let names = api.list_buckets().await.map_err(InventoryError::Listing)?;
    info!(buckets = names.len(), "buckets listed");
    Ok(names.into_iter().map(BucketRecord::new).collect())
}

/// Run one full inventory pass.
///
/// Lists buckets with `api`, resolves their regions, builds one client per
/// region through `factory`, then fetches policy, encryption and logging for
/// every bucket. Either every bucket comes back fully populated or the pass
/// fails as a whole.
#[instrument(skip_all, fields(profile = config.profile.as_deref().unwrap_or("default")))]
pub async fn load_inventory(
    api: Arc<dyn StorageApi>,
    factory: &dyn ClientFactory,
    config: &InventoryConfig,
) -> Result<Vec<BucketRecord>, InventoryError> {
    let mut buckets = load_names(api.as_ref()).await?;
    if buckets.is_empty() {
        return Ok(buckets);
    }

    resolve_regions(&api, &mut buckets, config.failure_policy).await?;
    let clients = RegionalClients::build(factory, &buckets, config.profile.as_deref()).await?;
    fetch_metadata(&clients, &mut buckets, config.failure_policy).await?;

    info!(buckets = buckets.len(), regions = clients.len(), "inventory complete");
    Ok(buckets)
}
