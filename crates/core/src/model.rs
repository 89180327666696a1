use bucketlens_policy::{Diagnostic, ParsedPolicy, PolicyDocument};
use serde::{Deserialize, Serialize};

/// Region a bucket lives in when the API reports no location constraint.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Map a raw location constraint to a region usable as a client key.
///
/// An empty or missing constraint means the default region; `EU` is the
/// legacy alias of `eu-west-1`.
pub fn normalize_region(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        None | Some("") => DEFAULT_REGION.to_owned(),
        Some("EU") => "eu-west-1".to_owned(),
        Some(r) => r.to_owned(),
    }
}

/// Server-side encryption configuration, copied out of the provider response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionConfig {
    pub rules: Vec<EncryptionRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionRule {
    /// `AES256`, `aws:kms`, `aws:kms:dsse`, ...
    pub sse_algorithm: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_master_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_key_enabled: Option<bool>,
}

/// Target of server access logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub target_bucket: String,
    pub target_prefix: String,
}

/// One discovered bucket and everything learned about it.
///
/// `name` is fixed at discovery. Every other field is written at most once,
/// by the orchestrator, from the result of the single task that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketRecord {
    name: String,
    region: Option<String>,
    policy: Option<PolicyDocument>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    policy_diagnostics: Vec<Diagnostic>,
    encryption: Option<EncryptionConfig>,
    logging: Option<LoggingConfig>,
}

impl BucketRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: None,
            policy: None,
            policy_diagnostics: Vec::new(),
            encryption: None,
            logging: None,
        }
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn region(&self) -> Option<&str> { self.region.as_deref() }
    pub fn policy(&self) -> Option<&PolicyDocument> { self.policy.as_ref() }
    pub fn policy_diagnostics(&self) -> &[Diagnostic] { &self.policy_diagnostics }
    pub fn encryption(&self) -> Option<&EncryptionConfig> { self.encryption.as_ref() }
    pub fn logging(&self) -> Option<&LoggingConfig> { self.logging.as_ref() }

    pub(crate) fn set_region(&mut self, region: String) {
        debug_assert!(self.region.is_none(), "region of {} written twice", self.name);
        self.region = Some(region);
    }

    pub(crate) fn set_policy(&mut self, parsed: Option<ParsedPolicy>) {
        debug_assert!(self.policy.is_none(), "policy of {} written twice", self.name);
        if let Some(parsed) = parsed {
            self.policy = Some(parsed.document);
            self.policy_diagnostics = parsed.diagnostics;
        }
    }

    pub(crate) fn set_encryption(&mut self, encryption: Option<EncryptionConfig>) {
        debug_assert!(self.encryption.is_none(), "encryption of {} written twice", self.name);
        self.encryption = encryption;
    }

    pub(crate) fn set_logging(&mut self, logging: Option<LoggingConfig>) {
        debug_assert!(self.logging.is_none(), "logging of {} written twice", self.name);
        self.logging = logging;
    }
}
