//! Inventory configuration.
//!
//! Loaded from environment variables, following the AWS CLI conventions.

use serde::{Deserialize, Serialize};

use crate::model::DEFAULT_REGION;

/// What a phase does when one of its tasks fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Cancel the remaining tasks and return the first error.
    #[default]
    FirstError,
    /// Let every task finish and return all errors together.
    CollectAll,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryConfig {
    /// Named credential profile; `None` uses the default chain.
    #[serde(default)]
    pub profile: Option<String>,
    /// Region of the client used for listing and region lookups.
    #[serde(default = "default_region")]
    pub default_region: String,
    /// Override for S3-compatible endpoints.
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_region() -> String {
    DEFAULT_REGION.to_owned()
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            profile: None,
            default_region: default_region(),
            endpoint_url: None,
            force_path_style: false,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl InventoryConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("AWS_PROFILE") {
            config.profile = Some(v);
        }
        if let Some(v) = non_empty("AWS_REGION").or_else(|| non_empty("AWS_DEFAULT_REGION")) {
            config.default_region = v;
        }
        if let Some(v) = non_empty("AWS_ENDPOINT_URL") {
            config.endpoint_url = Some(v);
        }
        if let Some(v) = non_empty("BUCKETLENS_FORCE_PATH_STYLE") {
            config.force_path_style = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Some(v) = non_empty("BUCKETLENS_FAILURE_POLICY") {
            if v.eq_ignore_ascii_case("collect-all") {
                config.failure_policy = FailurePolicy::CollectAll;
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_should_create_default_config() {
        let config = InventoryConfig::default();
        assert_eq!(config.profile, None);
        assert_eq!(config.default_region, "us-east-1");
        assert_eq!(config.failure_policy, FailurePolicy::FirstError);
    }

    #[test]
    fn test_should_read_overrides_from_environment() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("AWS_PROFILE", "audit"),
            ("AWS_DEFAULT_REGION", "eu-central-1"),
            ("AWS_ENDPOINT_URL", "http://localhost:4566"),
            ("BUCKETLENS_FORCE_PATH_STYLE", "true"),
            ("BUCKETLENS_FAILURE_POLICY", "collect-all"),
        ]);
        let config = InventoryConfig::from_lookup(|k| env.get(k).map(|v| (*v).to_owned()));
        assert_eq!(config.profile.as_deref(), Some("audit"));
        assert_eq!(config.default_region, "eu-central-1");
        assert_eq!(config.endpoint_url.as_deref(), Some("http://localhost:4566"));
        assert!(config.force_path_style);
        assert_eq!(config.failure_policy, FailurePolicy::CollectAll);
    }

    #[test]
    fn test_should_prefer_aws_region_and_ignore_blank_values() {
        let env: HashMap<&str, &str> =
            HashMap::from([("AWS_REGION", "us-west-2"), ("AWS_DEFAULT_REGION", "eu-central-1"), ("AWS_PROFILE", " ")]);
        let config = InventoryConfig::from_lookup(|k| env.get(k).map(|v| (*v).to_owned()));
        assert_eq!(config.default_region, "us-west-2");
        assert_eq!(config.profile, None);
    }

    #[test]
    fn test_should_deserialize_with_defaults() {
        let config: InventoryConfig =
            serde_json::from_str(r#"{"profile":"dev","failurePolicy":"collect-all"}"#).unwrap();
        assert_eq!(config.profile.as_deref(), Some("dev"));
        assert_eq!(config.default_region, "us-east-1");
        assert_eq!(config.failure_policy, FailurePolicy::CollectAll);
    }
}
