//! In-memory representation of a single configuration document.
//!
//! A document is one YAML file (or a synthetic override blob) restricted to
//! the recognized section schema. Schema violations are fatal at load time;
//! a constructed document is immutable thereafter.

use std::collections::BTreeMap;

use serde_yaml::Value;
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Section names a configuration document may contain at top level.
pub const RECOGNIZED_SECTIONS: &[&str] = &[
    "aws",
    "core",
    "environments",
    "helpers",
    "includes",
    "params",
    "refs",
    "tags",
    "template",
    "vars",
];

/// One parsed configuration document.
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    /// Logical name (relative path for files, channel label for overrides).
    name: String,
    /// Top-level sections, keyed by section name.
    sections: BTreeMap<String, Value>,
    /// Synthetic documents come from CLI override channels and are excluded
    /// from include traversal and environment validation.
    synthetic: bool,
}

impl ConfigDocument {
    /// Parses a document from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or violates the section
    /// schema.
    pub fn parse(name: impl Into<String>, content: &str) -> Result<Self> {
        let name = name.into();
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
            message: format!("YAML parse error: {e}"),
            location: Some(name.clone()),
        })?;
        Self::from_value(name, value, false)
    }

    /// Builds a synthetic document from pre-assembled sections.
    ///
    /// # Errors
    ///
    /// Returns an error if the sections violate the schema.
    pub fn synthetic(name: impl Into<String>, sections: BTreeMap<String, Value>) -> Result<Self> {
        let mapping = sections
            .into_iter()
            .map(|(k, v)| (Value::String(k), v))
            .collect();
        Self::from_value(name.into(), Value::Mapping(mapping), true)
    }

    /// Builds a document from an already-parsed YAML value.
    fn from_value(name: String, value: Value, synthetic: bool) -> Result<Self> {
        let mut sections = match value {
            // An empty YAML file parses as null, which is a valid (empty) document.
            Value::Null => BTreeMap::new(),
            Value::Mapping(mapping) => {
                let mut sections = BTreeMap::new();
                for (key, body) in mapping {
                    let Value::String(key) = key else {
                        return Err(ConfigError::ParseError {
                            message: String::from("top-level keys must be strings"),
                            location: Some(name),
                        }
                        .into());
                    };
                    sections.insert(key, body);
                }
                sections
            }
            _ => {
                return Err(ConfigError::ParseError {
                    message: String::from("top-level structure must be a mapping"),
                    location: Some(name),
                }
                .into());
            }
        };

        // Shorthand: `template: some-name` expands to `template: {name: some-name}`.
        let template_shorthand = match sections.get("template") {
            Some(Value::String(template_name)) => Some(template_name.clone()),
            _ => None,
        };
        if let Some(template_name) = template_shorthand {
            let mut expanded = serde_yaml::Mapping::new();
            expanded.insert(
                Value::String(String::from("name")),
                Value::String(template_name),
            );
            sections.insert(String::from("template"), Value::Mapping(expanded));
        }

        let document = Self {
            name,
            sections,
            synthetic,
        };
        document.ensure_valid_sections()?;

        debug!(document = %document.name, "loaded config document");
        Ok(document)
    }

    /// Ensures top-level and environment-level keys are within the
    /// recognized set, and environment names do not shadow section names.
    fn ensure_valid_sections(&self) -> Result<()> {
        let unknown: Vec<String> = self
            .sections
            .keys()
            .filter(|k| !RECOGNIZED_SECTIONS.contains(&k.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(ConfigError::UnexpectedSections {
                file: self.name.clone(),
                sections: unknown,
            }
            .into());
        }

        let Some(environments) = self.section("environments") else {
            return Ok(());
        };
        let environments = environments.as_mapping().ok_or_else(|| {
            ConfigError::invalid_section(
                self.name.clone(),
                "environments",
                "expected a mapping of environment names",
            )
        })?;

        for (environment, overlay) in environments {
            let environment = environment.as_str().ok_or_else(|| {
                ConfigError::invalid_section(
                    self.name.clone(),
                    "environments",
                    format!("non-string environment name: {environment:?}"),
                )
            })?;

            if RECOGNIZED_SECTIONS.contains(&environment) {
                return Err(ConfigError::ReservedEnvironmentName {
                    file: self.name.clone(),
                    environment: environment.to_string(),
                }
                .into());
            }

            let overlay = match overlay {
                Value::Null => continue,
                Value::Mapping(mapping) => mapping,
                other => {
                    return Err(ConfigError::invalid_section(
                        self.name.clone(),
                        format!("environments.{environment}"),
                        format!("expected a mapping, got: {other:?}"),
                    )
                    .into());
                }
            };

            let unknown: Vec<String> = overlay
                .keys()
                .filter_map(Value::as_str)
                .filter(|k| *k == "environments" || !RECOGNIZED_SECTIONS.contains(k))
                .map(String::from)
                .collect();
            if !unknown.is_empty() {
                return Err(ConfigError::invalid_section(
                    self.name.clone(),
                    format!("environments.{environment}"),
                    format!("unexpected keys: {}", unknown.join(", ")),
                )
                .into());
            }
        }

        Ok(())
    }

    /// Returns the document's logical name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true for documents created from CLI override channels.
    #[must_use]
    pub const fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    /// Returns a top-level section body, if present.
    #[must_use]
    pub fn section(&self, key: &str) -> Option<&Value> {
        self.sections.get(key).filter(|v| !v.is_null())
    }

    /// Returns the environment names this document declares.
    #[must_use]
    pub fn environments(&self) -> Vec<String> {
        self.section("environments")
            .and_then(Value::as_mapping)
            .map(|m| {
                m.keys()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the overlay mapping for one environment. A declared-but-empty
    /// environment (`prod:` with no body) yields `None`, like an undeclared
    /// one.
    #[must_use]
    pub fn environment(&self, environment: &str) -> Option<&serde_yaml::Mapping> {
        self.section("environments")
            .and_then(Value::as_mapping)
            .and_then(|m| m.get(environment))
            .and_then(Value::as_mapping)
    }

    /// Returns a section body from one environment's overlay.
    #[must_use]
    pub fn environment_section(&self, environment: &str, key: &str) -> Option<&Value> {
        self.environment(environment)
            .and_then(|m| m.get(key))
            .filter(|v| !v.is_null())
    }

    /// Returns the list of include names declared by this document.
    ///
    /// # Errors
    ///
    /// Returns an error if `includes` is present but not a list of strings.
    pub fn includes(&self) -> Result<Vec<String>> {
        let Some(value) = self.section("includes") else {
            return Ok(Vec::new());
        };

        let items = value.as_sequence().ok_or_else(|| {
            ConfigError::invalid_section(
                self.name.clone(),
                "includes",
                "expected a list of file names",
            )
        })?;

        items
            .iter()
            .map(|item| {
                item.as_str().map(String::from).ok_or_else(|| {
                    ConfigError::invalid_section(
                        self.name.clone(),
                        "includes",
                        format!("expected a string entry, got: {item:?}"),
                    )
                    .into()
                })
            })
            .collect()
    }
}
