//! Configuration file loading and multi-document merging.
//!
//! A [`ConfigFile`] is a [`ConfigDocument`] loaded from disk by logical name.
//! Its `includes` graph is flattened depth-first into a [`ConfigFileSet`],
//! lowest precedence first, with duplicate includes suppressed. The set
//! exposes the merge operations the resolver is built on.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use tracing::{debug, info};

use crate::error::{ConfigError, Result};

use super::document::ConfigDocument;

/// Subdirectory (relative to the config root) where included files live.
const INCLUDES_DIR: &str = "includes";

/// A configuration document loaded from storage by logical name.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    /// Parsed document.
    document: ConfigDocument,
    /// Root configuration directory all lookups are relative to.
    config_dir: PathBuf,
}

impl ConfigFile {
    /// Loads a configuration file by logical name.
    ///
    /// The name is resolved by trying the literal name, then `.yaml`, then
    /// `.yml` within `config_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if no candidate file exists or the file fails to
    /// parse or validate.
    pub fn load(name: &str, config_dir: impl Into<PathBuf>) -> Result<Self> {
        let config_dir = config_dir.into();
        let relative = find_config_file(&config_dir, Path::new(name))?;
        Self::load_resolved(&relative, config_dir)
    }

    /// Loads a file whose relative path has already been resolved.
    fn load_resolved(relative: &Path, config_dir: PathBuf) -> Result<Self> {
        let full_path = config_dir.join(relative);
        info!("Loading configuration from: {}", full_path.display());

        let content = std::fs::read_to_string(&full_path).map_err(|e| ConfigError::ParseError {
            message: format!("Failed to read file: {e}"),
            location: Some(full_path.display().to_string()),
        })?;

        let document = ConfigDocument::parse(relative.display().to_string(), &content)?;
        Ok(Self {
            document,
            config_dir,
        })
    }

    /// Returns the parsed document.
    #[must_use]
    pub const fn document(&self) -> &ConfigDocument {
        &self.document
    }

    /// Returns the environment names this file declares.
    #[must_use]
    pub fn environments(&self) -> Vec<String> {
        self.document.environments()
    }

    /// Flattens the include graph into a precedence-ordered document set.
    ///
    /// Includes are traversed depth-first, each document placed after all of
    /// its own includes, so the returned order is lowest precedence first
    /// with this file last. A document reached through multiple include
    /// paths is loaded and merged exactly once. Caller-supplied override
    /// documents are appended at the end (highest precedence) and take no
    /// part in the traversal.
    ///
    /// # Errors
    ///
    /// Returns an error if any included file cannot be resolved, parsed, or
    /// validated.
    pub fn load_includes(&self, overrides: Vec<ConfigDocument>) -> Result<ConfigFileSet> {
        let mut seen = BTreeSet::new();
        let mut documents = Vec::new();
        self.collect_includes(&mut seen, &mut documents)?;
        documents.extend(overrides);
        Ok(ConfigFileSet { documents })
    }

    /// Recursive depth-first include collection.
    fn collect_includes(
        &self,
        seen: &mut BTreeSet<PathBuf>,
        documents: &mut Vec<ConfigDocument>,
    ) -> Result<()> {
        for include in self.document.includes()? {
            let relative =
                find_config_file(&self.config_dir, &Path::new(INCLUDES_DIR).join(&include))?;
            if seen.insert(relative.clone()) {
                let included = Self::load_resolved(&relative, self.config_dir.clone())?;
                included.collect_includes(seen, documents)?;
            } else {
                debug!(include = %relative.display(), "include already loaded, skipping");
            }
        }

        documents.push(self.document.clone());
        Ok(())
    }
}

/// Resolves a logical name to an existing file relative to `config_dir`.
///
/// # Errors
///
/// Returns a not-found error naming the search directory if no candidate
/// exists.
fn find_config_file(config_dir: &Path, name: &Path) -> Result<PathBuf> {
    let mut candidates = vec![name.to_path_buf()];
    candidates.push(name.with_extension("yaml"));
    candidates.push(name.with_extension("yml"));

    for candidate in candidates {
        if config_dir.join(&candidate).is_file() {
            return Ok(candidate);
        }
    }

    Err(ConfigError::FileNotFound {
        name: name.display().to_string(),
        search_dir: config_dir.to_path_buf(),
    }
    .into())
}

/// An ordered collection of configuration documents, lowest precedence
/// first.
#[derive(Debug, Clone)]
pub struct ConfigFileSet {
    /// Documents in merge order.
    documents: Vec<ConfigDocument>,
}

impl ConfigFileSet {
    /// Returns the documents in merge order.
    #[must_use]
    pub fn documents(&self) -> &[ConfigDocument] {
        &self.documents
    }

    /// Merges a mapping-valued section across all documents.
    ///
    /// Starting from `defaults`, each document's top-level section is merged
    /// (lower priority), then its environment overlay for `environment`
    /// (higher priority); later documents override earlier ones key by key.
    /// Missing sections act as empty mappings.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending document if a section is
    /// present but not a mapping.
    pub fn fetch_dict(
        &self,
        section: &str,
        environment: &str,
        defaults: BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, Value>> {
        let mut merged = defaults;

        for document in &self.documents {
            if let Some(body) = document.section(section) {
                merge_mapping(&mut merged, document.name(), section, body)?;
            }
            if let Some(body) = document.environment_section(environment, section) {
                merge_mapping(&mut merged, document.name(), section, body)?;
            }
        }

        Ok(merged)
    }

    /// Unions a list-valued section across all documents.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending document if a section is
    /// present but not a list of strings.
    pub fn fetch_set(
        &self,
        section: &str,
        environment: &str,
        defaults: &[&str],
    ) -> Result<BTreeSet<String>> {
        let mut merged: BTreeSet<String> = defaults.iter().map(ToString::to_string).collect();

        for document in &self.documents {
            if let Some(body) = document.section(section) {
                merge_list(&mut merged, document.name(), section, body)?;
            }
            if let Some(body) = document.environment_section(environment, section) {
                merge_list(&mut merged, document.name(), section, body)?;
            }
        }

        Ok(merged)
    }

    /// Validates every merged document's declared environments against an
    /// allowlist. Synthetic override documents are exempt.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending document and environment on
    /// the first violation.
    pub fn validate(&self, permitted: &[String]) -> Result<()> {
        for document in &self.documents {
            if document.is_synthetic() {
                continue;
            }
            for environment in document.environments() {
                if !permitted.contains(&environment) {
                    return Err(ConfigError::EnvironmentNotPermitted {
                        file: document.name().to_string(),
                        environment,
                        permitted: permitted.to_vec(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}

/// Shallow-merges one mapping-valued section body into the accumulator.
fn merge_mapping(
    merged: &mut BTreeMap<String, Value>,
    file: &str,
    section: &str,
    body: &Value,
) -> Result<()> {
    let mapping = body.as_mapping().ok_or_else(|| {
        ConfigError::invalid_section(file, section, "expected a mapping")
    })?;

    for (key, value) in mapping {
        let key = key.as_str().ok_or_else(|| {
            ConfigError::invalid_section(file, section, format!("non-string key: {key:?}"))
        })?;
        merged.insert(key.to_string(), value.clone());
    }

    Ok(())
}

/// Unions one list-valued section body into the accumulator.
fn merge_list(
    merged: &mut BTreeSet<String>,
    file: &str,
    section: &str,
    body: &Value,
) -> Result<()> {
    let items = body.as_sequence().ok_or_else(|| {
        ConfigError::invalid_section(file, section, "expected a list")
    })?;

    for item in items {
        let item = item.as_str().ok_or_else(|| {
            ConfigError::invalid_section(file, section, format!("non-string entry: {item:?}"))
        })?;
        merged.insert(item.to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &Path, relative: &str, content: &str) {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_suffix_resolution_order() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "app.yml", "vars: {from: yml}\n");
        let file = ConfigFile::load("app", dir.path()).unwrap();
        assert_eq!(file.document().name(), "app.yml");

        // A .yaml sibling takes precedence over .yml.
        write_config(dir.path(), "app.yaml", "vars: {from: yaml}\n");
        let file = ConfigFile::load("app", dir.path()).unwrap();
        assert_eq!(file.document().name(), "app.yaml");
    }

    #[test]
    fn test_missing_file_reports_search_path() {
        let dir = TempDir::new().unwrap();
        let err = ConfigFile::load("nope", dir.path()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("nope"));
        assert!(message.contains("tried .yaml, .yml"));
    }

    #[test]
    fn test_includes_flattened_lowest_precedence_first() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "main.yml", "includes: [first]\n");
        write_config(dir.path(), "includes/first.yaml", "includes: [second, third]\n");
        write_config(dir.path(), "includes/second.yaml", "vars: {c: from-second}\n");
        write_config(dir.path(), "includes/third.yaml", "vars: {d: from-third}\n");

        let file = ConfigFile::load("main", dir.path()).unwrap();
        let set = file.load_includes(Vec::new()).unwrap();
        let names: Vec<&str> = set.documents().iter().map(ConfigDocument::name).collect();
        assert_eq!(
            names,
            vec![
                "includes/second.yaml",
                "includes/third.yaml",
                "includes/first.yaml",
                "main.yml"
            ]
        );
    }

    #[test]
    fn test_diamond_include_merged_once() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "main.yaml", "includes: [a, shared]\nvars: {key: from-root}\n");
        write_config(dir.path(), "includes/a.yaml", "includes: [shared]\n");
        write_config(dir.path(), "includes/shared.yaml", "vars: {key: from-shared}\n");

        let file = ConfigFile::load("main", dir.path()).unwrap();
        let set = file.load_includes(Vec::new()).unwrap();

        let names: Vec<&str> = set.documents().iter().map(ConfigDocument::name).collect();
        assert_eq!(
            names,
            vec!["includes/shared.yaml", "includes/a.yaml", "main.yaml"]
        );

        // Root is merged last, so its value wins over the shared include.
        let vars = set.fetch_dict("vars", "dev", BTreeMap::new()).unwrap();
        assert_eq!(
            vars.get("key"),
            Some(&Value::String(String::from("from-root")))
        );
    }

    #[test]
    fn test_fetch_dict_environment_overrides_top_level() {
        let dir = TempDir::new().unwrap();
        write_config(
            dir.path(),
            "main.yaml",
            concat!(
                "vars:\n",
                "  size: small\n",
                "  color: blue\n",
                "environments:\n",
                "  prod:\n",
                "    vars:\n",
                "      size: large\n",
            ),
        );

        let file = ConfigFile::load("main", dir.path()).unwrap();
        let set = file.load_includes(Vec::new()).unwrap();

        let prod = set.fetch_dict("vars", "prod", BTreeMap::new()).unwrap();
        assert_eq!(prod.get("size"), Some(&Value::String(String::from("large"))));
        assert_eq!(prod.get("color"), Some(&Value::String(String::from("blue"))));

        let dev = set.fetch_dict("vars", "dev", BTreeMap::new()).unwrap();
        assert_eq!(dev.get("size"), Some(&Value::String(String::from("small"))));
    }

    #[test]
    fn test_fetch_dict_rejects_non_mapping_section() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "main.yaml", "vars: [not, a, mapping]\n");
        let file = ConfigFile::load("main", dir.path()).unwrap();
        let set = file.load_includes(Vec::new()).unwrap();

        let err = set.fetch_dict("vars", "dev", BTreeMap::new()).unwrap_err();
        assert!(err.to_string().contains("main.yaml"));
        assert!(err.to_string().contains("expected a mapping"));
    }

    #[test]
    fn test_fetch_set_unions_helpers() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "main.yaml", "includes: [base]\nhelpers: [cidr]\n");
        write_config(
            dir.path(),
            "includes/base.yaml",
            "helpers: [cidr, ami_lookup]\nenvironments:\n  dev:\n    helpers: [debugging]\n",
        );

        let file = ConfigFile::load("main", dir.path()).unwrap();
        let set = file.load_includes(Vec::new()).unwrap();

        let helpers = set.fetch_set("helpers", "dev", &[]).unwrap();
        let helpers: Vec<&str> = helpers.iter().map(String::as_str).collect();
        assert_eq!(helpers, vec!["ami_lookup", "cidr", "debugging"]);

        let prod_helpers = set.fetch_set("helpers", "prod", &[]).unwrap();
        assert!(!prod_helpers.contains("debugging"));
    }

    #[test]
    fn test_validate_names_offending_document_and_environment() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "main.yaml", "includes: [extra]\nenvironments: {prod: }\n");
        write_config(dir.path(), "includes/extra.yaml", "environments:\n  staging:\n    vars: {a: 1}\n");

        let file = ConfigFile::load("main", dir.path()).unwrap();
        let set = file.load_includes(Vec::new()).unwrap();

        let err = set.validate(&[String::from("prod")]).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("includes/extra.yaml"));
        assert!(message.contains("staging"));

        set.validate(&[String::from("prod"), String::from("staging")])
            .unwrap();
    }

    #[test]
    fn test_override_documents_append_with_highest_precedence() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "main.yaml", "vars: {a: from-file}\n");

        let mut sections = BTreeMap::new();
        sections.insert(
            String::from("vars"),
            serde_yaml::from_str("{a: from-cli}").unwrap(),
        );
        let override_doc = ConfigDocument::synthetic("--var", sections).unwrap();

        let file = ConfigFile::load("main", dir.path()).unwrap();
        let set = file.load_includes(vec![override_doc]).unwrap();

        let vars = set.fetch_dict("vars", "dev", BTreeMap::new()).unwrap();
        assert_eq!(vars.get("a"), Some(&Value::String(String::from("from-cli"))));

        // Synthetic documents are exempt from environment validation.
        set.validate(&[String::from("dev")]).unwrap();
    }
}
