//! Core stack settings.
//!
//! The `core` section carries the computed CloudFormation stack name and the
//! list of environments the stack may be deployed into.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_yaml::Value;

use crate::error::{ConfigError, ResolveError, Result};

/// Default stack-name template, applied when the config does not override it.
pub const DEFAULT_STACK_NAME_TEMPLATE: &str = "{{ environment }}-{{ name | replace('/', '-') }}";

/// Resolved core settings for one (stack, environment) pair.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CoreSettings {
    /// The final CloudFormation stack name.
    pub stack_name: String,

    /// Environments this stack may be deployed into. Empty means no
    /// restriction beyond what the config files already validated.
    #[serde(default)]
    pub environments: Vec<String>,
}

impl CoreSettings {
    /// Builds core settings from an already-interpolated `core` section.
    ///
    /// # Errors
    ///
    /// Returns an error if the section does not match the schema or the
    /// stack name fails the naming pattern.
    pub fn from_resolved(resolved: BTreeMap<String, Value>) -> Result<Self> {
        let mapping = resolved
            .into_iter()
            .map(|(k, v)| (Value::String(k), v))
            .collect();

        let settings: Self =
            serde_yaml::from_value(Value::Mapping(mapping)).map_err(|e| {
                ResolveError::InvalidSettings {
                    section: String::from("core"),
                    message: e.to_string(),
                }
            })?;

        if !is_valid_stack_name(&settings.stack_name) {
            return Err(ConfigError::InvalidStackName {
                name: settings.stack_name,
            }
            .into());
        }

        Ok(settings)
    }
}

/// Checks a stack name against `^[A-Za-z0-9-]+$`.
fn is_valid_stack_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
