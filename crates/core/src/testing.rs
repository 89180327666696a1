//! In-memory [`StorageApi`] and [`ClientFactory`] fakes.
//!
//! Every clone of a [`FakeStorage`] shares the same buckets and call
//! counters, so regional clients handed out by [`FakeFactory`] report into
//! the same place as the base client.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{ApiError, InventoryError, Operation};
use crate::model::{normalize_region, EncryptionConfig, LoggingConfig};
use crate::provider::{ClientFactory, StorageApi};

/// Canned answers for one bucket.
#[derive(Debug, Clone, Default)]
pub struct FakeBucket {
    pub region: Option<String>,
    pub policy: Option<String>,
    pub encryption: Option<EncryptionConfig>,
    pub logging: Option<LoggingConfig>,
    pub failures: HashMap<Operation, ApiError>,
    /// Calls that never complete.
    pub stalls: HashSet<Operation>,
    /// Added to every call on this bucket.
    pub delay: Option<Duration>,
}

impl FakeBucket {
    pub fn in_region(region: impl Into<String>) -> Self {
        Self { region: Some(region.into()), ..Self::default() }
    }

    pub fn with_policy(mut self, text: impl Into<String>) -> Self {
        self.policy = Some(text.into());
        self
    }

    pub fn with_encryption(mut self, config: EncryptionConfig) -> Self {
        self.encryption = Some(config);
        self
    }

    pub fn with_logging(mut self, target_bucket: impl Into<String>, target_prefix: impl Into<String>) -> Self {
        self.logging = Some(LoggingConfig { target_bucket: target_bucket.into(), target_prefix: target_prefix.into() });
        self
    }

    pub fn failing(mut self, operation: Operation, error: ApiError) -> Self {
        self.failures.insert(operation, error);
        self
    }

    pub fn stalling(mut self, operation: Operation) -> Self {
        self.stalls.insert(operation);
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Debug, Default)]
struct Counters {
    calls: [AtomicUsize; 5],
    stalls_entered: AtomicUsize,
    in_flight: AtomicUsize,
}

struct Stalled(Arc<Counters>);

impl Stalled {
    fn enter(counters: &Arc<Counters>) -> Self {
        counters.stalls_entered.fetch_add(1, Ordering::SeqCst);
        counters.in_flight.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counters))
    }
}

impl Drop for Stalled {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeStorage {
    order: Vec<String>,
    buckets: Arc<HashMap<String, FakeBucket>>,
    list_failure: Option<ApiError>,
    counters: Arc<Counters>,
}

impl Counters {
    fn slot(operation: Operation) -> usize {
        match operation {
            Operation::ListBuckets => 0,
            Operation::GetBucketRegion => 1,
            Operation::GetBucketPolicy => 2,
            Operation::GetBucketEncryption => 3,
            Operation::GetBucketLogging => 4,
        }
    }

    fn record(&self, operation: Operation) {
        self.calls[Self::slot(operation)].fetch_add(1, Ordering::SeqCst);
    }
}

impl FakeStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bucket; listing returns buckets in insertion order.
    pub fn with_bucket(mut self, name: impl Into<String>, bucket: FakeBucket) -> Self {
        let name = name.into();
        self.order.push(name.clone());
        Arc::make_mut(&mut self.buckets).insert(name, bucket);
        self
    }

    pub fn failing_list(mut self, error: ApiError) -> Self {
        self.list_failure = Some(error);
        self
    }

    /// Region the resolver would settle on for `bucket`.
    pub fn region_of(&self, bucket: &str) -> String {
        normalize_region(self.buckets.get(bucket).and_then(|b| b.region.as_deref()))
    }

    pub fn calls(&self, operation: Operation) -> usize {
        self.counters.calls[Counters::slot(operation)].load(Ordering::SeqCst)
    }

    pub fn stalls_entered(&self) -> usize {
        self.counters.stalls_entered.load(Ordering::SeqCst)
    }

    /// Stalled calls that have not been dropped yet.
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    async fn respond<T>(
        &self,
        bucket: &str,
        operation: Operation,
        answer: impl FnOnce(&FakeBucket) -> T,
    ) -> Result<T, ApiError> {
        self.counters.record(operation);
        let entry = self
            .buckets
            .get(bucket)
            .ok_or_else(|| ApiError::with_code("NoSuchBucket", format!("The specified bucket does not exist: {bucket}")))?;
        if let Some(delay) = entry.delay {
            tokio::time::sleep(delay).await;
        }
        if entry.stalls.contains(&operation) {
            let _stalled = Stalled::enter(&self.counters);
            std::future::pending::<()>().await;
        }
        if let Some(error) = entry.failures.get(&operation) {
            return Err(error.clone());
        }
        Ok(answer(entry))
    }
}

#[async_trait]
impl StorageApi for FakeStorage {
    async fn list_buckets(&self) -> Result<Vec<String>, ApiError> {
        self.counters.record(Operation::ListBuckets);
        match &self.list_failure {
            Some(error) => Err(error.clone()),
            None => Ok(self.order.clone()),
        }
    }

    async fn bucket_region(&self, bucket: &str) -> Result<Option<String>, ApiError> {
        self.respond(bucket, Operation::GetBucketRegion, |b| b.region.clone()).await
    }

    async fn bucket_policy(&self, bucket: &str) -> Result<Option<String>, ApiError> {
        self.respond(bucket, Operation::GetBucketPolicy, |b| b.policy.clone()).await
    }

    async fn bucket_encryption(&self, bucket: &str) -> Result<Option<EncryptionConfig>, ApiError> {
        self.respond(bucket, Operation::GetBucketEncryption, |b| b.encryption.clone()).await
    }

    async fn bucket_logging(&self, bucket: &str) -> Result<Option<LoggingConfig>, ApiError> {
        self.respond(bucket, Operation::GetBucketLogging, |b| b.logging.clone()).await
    }
}

/// Hands out clones of one [`FakeStorage`] and records what it built.
#[derive(Debug, Clone, Default)]
pub struct FakeFactory {
    storage: FakeStorage,
    failing_regions: HashSet<String>,
    built: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl FakeFactory {
    pub fn new(storage: FakeStorage) -> Self {
        Self { storage, ..Self::default() }
    }

    pub fn failing_region(mut self, region: impl Into<String>) -> Self {
        self.failing_regions.insert(region.into());
        self
    }

    /// Regions a client was built for, in construction order.
    pub async fn built(&self) -> Vec<String> {
        self.built.lock().await.iter().map(|(region, _)| region.clone()).collect()
    }

    /// Profiles passed along with each successful construction.
    pub async fn profiles(&self) -> Vec<Option<String>> {
        self.built.lock().await.iter().map(|(_, profile)| profile.clone()).collect()
    }
}

#[async_trait]
impl ClientFactory for FakeFactory {
    async fn regional_client(&self, region: &str, profile: Option<&str>) -> Result<Arc<dyn StorageApi>, InventoryError> {
        if self.failing_regions.contains(region) {
            return Err(InventoryError::ClientConstruction {
                region: region.to_owned(),
                message: "profile has no credentials for this region".to_owned(),
            });
        }
        self.built.lock().await.push((region.to_owned(), profile.map(str::to_owned)));
        Ok(Arc::new(self.storage.clone()))
    }
}
