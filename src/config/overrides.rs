//! CLI override channels.
//!
//! Three channels merge as the highest-precedence documents of a resolution
//! run: a generic structured blob (inline YAML or `@file`), repeated
//! `key=value` variable overrides, and repeated `key=value` parameter
//! overrides. Override values attempt structured parsing and fall back to
//! the raw string, so `--var 'subnets=[a, b]'` yields a list while
//! `--var name=web` stays a string.

use std::collections::BTreeMap;

use serde_yaml::Value;
use tracing::debug;

use crate::error::{ConfigError, Result};

use super::document::ConfigDocument;

/// Collected overrides from the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Variable overrides (`--var`).
    pub vars: BTreeMap<String, Value>,
    /// Parameter overrides (`--param`).
    pub params: BTreeMap<String, Value>,
    /// Generic override blob (`--overrides`), already parsed.
    pub blob: Option<Value>,
}

impl Overrides {
    /// Collects overrides from raw CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed `key=value` entries or an unreadable
    /// or unparsable blob.
    pub fn from_cli(vars: &[String], params: &[String], blob: Option<&str>) -> Result<Self> {
        Ok(Self {
            vars: parse_overrides(vars)?,
            params: parse_overrides(params)?,
            blob: blob.map(parse_blob).transpose()?,
        })
    }

    /// Converts the channels into synthetic documents, lowest precedence
    /// first (`--overrides`, then `--var`, then `--param`).
    ///
    /// # Errors
    ///
    /// Returns an error if the blob violates the document schema.
    pub fn into_documents(self) -> Result<Vec<ConfigDocument>> {
        let mut documents = Vec::new();

        if let Some(blob) = self.blob {
            let Value::Mapping(mapping) = blob else {
                return Err(ConfigError::ParseError {
                    message: String::from("override blob must be a mapping of sections"),
                    location: Some(String::from("--overrides")),
                }
                .into());
            };
            let mut sections = BTreeMap::new();
            for (key, body) in mapping {
                let Value::String(key) = key else {
                    return Err(ConfigError::ParseError {
                        message: String::from("override blob keys must be strings"),
                        location: Some(String::from("--overrides")),
                    }
                    .into());
                };
                sections.insert(key, body);
            }
            documents.push(ConfigDocument::synthetic("--overrides", sections)?);
        }

        if !self.vars.is_empty() {
            documents.push(section_document("--var", "vars", self.vars)?);
        }
        if !self.params.is_empty() {
            documents.push(section_document("--param", "params", self.params)?);
        }

        debug!(count = documents.len(), "built override documents");
        Ok(documents)
    }
}

/// Wraps one override channel as a single-section synthetic document.
fn section_document(
    label: &str,
    section: &str,
    entries: BTreeMap<String, Value>,
) -> Result<ConfigDocument> {
    let mapping = entries
        .into_iter()
        .map(|(k, v)| (Value::String(k), v))
        .collect();
    let mut sections = BTreeMap::new();
    sections.insert(section.to_string(), Value::Mapping(mapping));
    ConfigDocument::synthetic(label, sections)
}

/// Parses repeated `key=value` override arguments.
///
/// # Errors
///
/// Returns an error for entries without a `=` separator.
pub fn parse_overrides(entries: &[String]) -> Result<BTreeMap<String, Value>> {
    let mut parsed = BTreeMap::new();
    for entry in entries {
        let (key, value) = parse_override(entry)?;
        parsed.insert(key, value);
    }
    Ok(parsed)
}

/// Parses one `key=value` override argument.
///
/// The value attempts structured parsing and falls back to the raw string.
///
/// # Errors
///
/// Returns an error if the entry has no `=` separator.
pub fn parse_override(entry: &str) -> Result<(String, Value)> {
    let (key, raw) = entry.split_once('=').ok_or_else(|| ConfigError::ParseError {
        message: format!("expected key=value, got: {entry}"),
        location: None,
    })?;

    let value = serde_yaml::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

/// Parses the `--overrides` blob: inline YAML, or `@path` to read a file.
fn parse_blob(blob: &str) -> Result<Value> {
    let content = if let Some(path) = blob.strip_prefix('@') {
        std::fs::read_to_string(path)?
    } else {
        blob.to_string()
    };

    serde_yaml::from_str(&content).map_err(|e| {
        ConfigError::ParseError {
            message: format!("YAML parse error: {e}"),
            location: Some(String::from("--overrides")),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_parsing_with_string_fallback() {
        let (key, value) = parse_override("name=web").unwrap();
        assert_eq!(key, "name");
        assert_eq!(value, Value::String(String::from("web")));

        let (_, value) = parse_override("count=3").unwrap();
        assert_eq!(value, serde_yaml::from_str::<Value>("3").unwrap());

        let (_, value) = parse_override("subnets=[a, b]").unwrap();
        assert_eq!(value, serde_yaml::from_str::<Value>("[a, b]").unwrap());

        let (_, value) = parse_override("broken={unclosed").unwrap();
        assert_eq!(value, Value::String(String::from("{unclosed")));
    }

    #[test]
    fn test_missing_separator_rejected() {
        let err = parse_override("no-separator").unwrap_err();
        assert!(err.to_string().contains("key=value"));
    }

    #[test]
    fn test_channels_become_synthetic_documents() {
        let overrides = Overrides::from_cli(
            &[String::from("a=1")],
            &[String::from("p=q")],
            Some("vars: {b: 2}"),
        )
        .unwrap();

        let documents = overrides.into_documents().unwrap();
        let names: Vec<&str> = documents.iter().map(ConfigDocument::name).collect();
        assert_eq!(names, vec!["--overrides", "--var", "--param"]);
        assert!(documents.iter().all(ConfigDocument::is_synthetic));
    }

    #[test]
    fn test_blob_schema_is_validated() {
        let overrides =
            Overrides::from_cli(&[], &[], Some("bogus_section: {a: 1}")).unwrap();
        let err = overrides.into_documents().unwrap_err();
        assert!(err.to_string().contains("bogus_section"));
    }
}
