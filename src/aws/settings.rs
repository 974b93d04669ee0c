//! AWS deployment settings.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_yaml::Value;

use crate::error::{ResolveError, Result};

/// Resolved `aws` section for one deployment.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AwsSettings {
    /// Primary deployment region.
    pub region: String,

    /// Bucket used for uploaded deployment artifacts.
    pub cfn_bucket: String,

    /// Account id, filled in from the caller identity when not configured.
    #[serde(default)]
    pub account_id: Option<String>,
}

impl AwsSettings {
    /// Builds AWS settings from an already-interpolated `aws` section.
    ///
    /// # Errors
    ///
    /// Returns an error if the section does not match the schema.
    pub fn from_resolved(resolved: BTreeMap<String, Value>) -> Result<Self> {
        let mapping = resolved
            .into_iter()
            .map(|(k, v)| (Value::String(k), v))
            .collect();

        serde_yaml::from_value(Value::Mapping(mapping))
            .map_err(|e| {
                ResolveError::InvalidSettings {
                    section: String::from("aws"),
                    message: e.to_string(),
                }
                .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(yaml: &str) -> BTreeMap<String, Value> {
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        value
            .as_mapping()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.as_str().unwrap().to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_valid_settings() {
        let aws = AwsSettings::from_resolved(resolved(
            "{region: ap-southeast-2, cfn_bucket: deploy-artifacts}",
        ))
        .unwrap();
        assert_eq!(aws.region, "ap-southeast-2");
        assert_eq!(aws.cfn_bucket, "deploy-artifacts");
        assert!(aws.account_id.is_none());
    }

    #[test]
    fn test_missing_region_rejected() {
        let err = AwsSettings::from_resolved(resolved("{cfn_bucket: deploy-artifacts}"))
            .unwrap_err();
        assert!(err.to_string().contains("aws"));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let err = AwsSettings::from_resolved(resolved(
            "{region: us-east-1, cfn_bucket: b, zone: nope}",
        ))
        .unwrap_err();
        assert!(err.to_string().contains("aws"));
    }
}
