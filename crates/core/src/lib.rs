//! Bucket inventory: list an account's buckets, resolve their regions, and
//! enrich each with its policy, encryption and logging configuration using
//! concurrent, cancellable fan-out against a [`StorageApi`].

pub mod config;
pub mod error;
mod fanout;
pub mod fetch;
pub mod inventory;
pub mod model;
pub mod provider;
pub mod region;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{FailurePolicy, InventoryConfig};
pub use error::{ApiError, InventoryError, Operation};
pub use fetch::{fetch_metadata, Attribute};
pub use inventory::{load_inventory, load_names};
pub use model::{normalize_region, BucketRecord, EncryptionConfig, EncryptionRule, LoggingConfig, DEFAULT_REGION};
pub use provider::{ClientFactory, StorageApi};
pub use region::{resolve_regions, RegionalClients};

pub use bucketlens_policy as policy;
