use bucketlens_policy::PolicyError;
use std::fmt;
use thiserror::Error;

/// Error code the API returns when a bucket has no policy attached.
pub const NO_SUCH_BUCKET_POLICY: &str = "NoSuchBucketPolicy";
/// Error code the API returns when a bucket has no SSE configuration.
pub const SSE_CONFIGURATION_NOT_FOUND: &str = "ServerSideEncryptionConfigurationNotFoundError";

/// A failed call against the storage API, as reported by a backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (code: {})", .code.as_deref().unwrap_or("none"))]
pub struct ApiError {
    code: Option<String>,
    message: String,
}

impl ApiError {
    pub fn new(code: Option<String>, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Some(code.into()), message)
    }

    pub fn code(&self) -> Option<&str> { self.code.as_deref() }
    pub fn message(&self) -> &str { &self.message }

    pub(crate) fn is_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListBuckets,
    GetBucketRegion,
    GetBucketPolicy,
    GetBucketEncryption,
    GetBucketLogging,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::ListBuckets => "ListBuckets",
            Operation::GetBucketRegion => "GetBucketLocation",
            Operation::GetBucketPolicy => "GetBucketPolicy",
            Operation::GetBucketEncryption => "GetBucketEncryption",
            Operation::GetBucketLogging => "GetBucketLogging",
        })
    }
}

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("listing buckets failed: {0}")]
    Listing(#[source] ApiError),

    #[error("bucket {bucket}: {operation} failed: {source}")]
    Transport {
        bucket: String,
        operation: Operation,
        #[source]
        source: ApiError,
    },

    #[error("bucket {bucket}: malformed policy document: {source}")]
    MalformedPolicy {
        bucket: String,
        #[source]
        source: PolicyError,
    },

    #[error("cannot build client for region {region}: {message}")]
    ClientConstruction { region: String, message: String },

    #[error("bucket {bucket}: region was never resolved")]
    UnresolvedRegion { bucket: String },

    #[error("{phase} task aborted: {source}")]
    TaskAborted {
        phase: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },

    #[error("{} failures, first: {}", .0.len(), .0.first().map(ToString::to_string).unwrap_or_default())]
    Multiple(Vec<InventoryError>),
}

impl InventoryError {
    pub(crate) fn transport(bucket: &str, operation: Operation, source: ApiError) -> Self {
        InventoryError::Transport { bucket: bucket.to_owned(), operation, source }
    }

    /// Bucket the failure belongs to, when it is per-bucket.
    pub fn bucket(&self) -> Option<&str> {
        match self {
            InventoryError::Transport { bucket, .. }
            | InventoryError::MalformedPolicy { bucket, .. }
            | InventoryError::UnresolvedRegion { bucket } => Some(bucket.as_str()),
            _ => None,
        }
    }
}
