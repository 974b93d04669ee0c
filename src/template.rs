//! Template source descriptor.
//!
//! Describes where the stack template comes from: a named template at some
//! version in a repository, or a plain directory root. Acquisition itself
//! (local checkout, remote clone) is the deployment executor's concern.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::{ResolveError, Result};

/// Resolved `template` section for one deployment.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TemplateSource {
    /// Template name within the source.
    pub name: String,

    /// Version (branch, tag, or commit) to deploy from.
    #[serde(default)]
    pub version: Option<String>,

    /// Repository the template lives in.
    #[serde(default)]
    pub repo: Option<String>,

    /// Plain directory root, for templates outside version control.
    #[serde(default)]
    pub root: Option<String>,
}

impl TemplateSource {
    /// Builds a template source from an already-interpolated `template`
    /// section.
    ///
    /// # Errors
    ///
    /// Returns an error if the section does not match the schema.
    pub fn from_resolved(resolved: BTreeMap<String, Value>) -> Result<Self> {
        let mapping = resolved
            .into_iter()
            .map(|(k, v)| (Value::String(k), v))
            .collect();

        serde_yaml::from_value(Value::Mapping(mapping)).map_err(|e| {
            ResolveError::InvalidSettings {
                section: String::from("template"),
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
    fn test_full_descriptor() {
        let source = TemplateSource::from_resolved(resolved(
            "{name: vpc, version: main, repo: \"git@example.com:templates.git\"}",
        ))
        .unwrap();
        assert_eq!(source.name, "vpc");
        assert_eq!(source.version.as_deref(), Some("main"));
        assert!(source.root.is_none());
    }

    #[test]
    fn test_name_is_required() {
        let err = TemplateSource::from_resolved(resolved("{version: main}")).unwrap_err();
        assert!(err.to_string().contains("template"));
    }
}
