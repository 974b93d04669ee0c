//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying resolved
//! configuration and resolution failures to the user.

use std::collections::BTreeMap;
use std::fmt::Write;

use colored::Colorize;
use serde::Serialize;
use serde_yaml::Value;
use tabled::{Table, Tabled};

use crate::config::render::stringify;
use crate::config::{Config, Tag, VarValue};
use crate::error::InterpolationFailure;
use crate::template::TemplateSource;

use super::commands::OutputFormat;

/// Maximum length of a value cell before truncation.
const VALUE_WIDTH: usize = 60;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Property row for the template source table.
#[derive(Tabled)]
struct PropertyRow {
    #[tabled(rename = "Property")]
    property: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Parameter row for table display.
#[derive(Tabled)]
struct ParamRow {
    #[tabled(rename = "Parameter")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Type")]
    type_name: String,
}

/// Variable row for table display.
#[derive(Tabled)]
struct VarRow {
    #[tabled(rename = "Variable")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Type")]
    type_name: String,
}

/// Tag row for table display.
#[derive(Tabled)]
struct TagRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Interpolation failure row for table display.
#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Error")]
    error: String,
}

/// JSON projection of a resolved configuration.
#[derive(Serialize)]
struct ConfigJson<'a> {
    name: &'a str,
    environment: &'a str,
    stack_name: &'a str,
    template: &'a TemplateSource,
    vars: BTreeMap<String, serde_json::Value>,
    params: BTreeMap<String, serde_json::Value>,
    tags: Vec<Tag>,
    helpers: Vec<String>,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a resolved configuration for display.
    #[must_use]
    pub fn format_config(&self, config: &Config) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&config_json(config)).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_config_text(config),
        }
    }

    /// Formats a resolved configuration as text tables.
    fn format_config_text(config: &Config) -> String {
        let mut output = String::new();

        let _ = write!(
            output,
            "\n{} {} / {} -> {}\n",
            "Stack:".bold(),
            config.name,
            config.environment,
            config.core.stack_name.green()
        );

        let _ = write!(output, "\n{}\n", "Template Source".bold());
        let source_rows = vec![
            PropertyRow {
                property: String::from("Template Name"),
                value: config.template_source.name.clone(),
            },
            PropertyRow {
                property: String::from("Version"),
                value: config
                    .template_source
                    .version
                    .clone()
                    .unwrap_or_default(),
            },
            PropertyRow {
                property: String::from("Source"),
                value: config
                    .template_source
                    .repo
                    .clone()
                    .or_else(|| config.template_source.root.clone())
                    .unwrap_or_default(),
            },
        ];
        output.push_str(&Table::new(source_rows).to_string());
        output.push('\n');

        let _ = write!(output, "\n{}\n", "Parameters".bold());
        let param_rows: Vec<ParamRow> = config
            .params
            .iter()
            .map(|(name, value)| ParamRow {
                name: name.clone(),
                value: Self::truncate(&display_value(value), VALUE_WIDTH),
                type_name: String::from(value_type_name(value)),
            })
            .collect();
        if param_rows.is_empty() {
            output.push_str("   No parameters defined.\n");
        } else {
            output.push_str(&Table::new(param_rows).to_string());
            output.push('\n');
        }

        let _ = write!(output, "\n{}\n", "Variables".bold());
        let var_rows: Vec<VarRow> = config
            .vars
            .iter()
            .map(|(name, value)| VarRow {
                name: name.clone(),
                value: Self::truncate(&value.display_string(), VALUE_WIDTH),
                type_name: String::from(value.type_name()),
            })
            .collect();
        output.push_str(&Table::new(var_rows).to_string());
        output.push('\n');

        if !config.tags.is_empty() {
            let _ = write!(output, "\n{}\n", "Tags".bold());
            let tag_rows: Vec<TagRow> = config
                .tags
                .to_list()
                .into_iter()
                .map(|tag| TagRow {
                    key: tag.key,
                    value: Self::truncate(&tag.value, VALUE_WIDTH),
                })
                .collect();
            output.push_str(&Table::new(tag_rows).to_string());
            output.push('\n');
        }

        output
    }

    /// Formats the batch of permanent interpolation failures as a table.
    #[must_use]
    pub fn format_interpolation_failures(failures: &[InterpolationFailure]) -> String {
        let mut output = String::new();
        let _ = write!(
            output,
            "\n{} {} variable(s) could not be resolved:\n\n",
            "Error:".red().bold(),
            failures.len()
        );

        let rows: Vec<FailureRow> = failures
            .iter()
            .map(|failure| FailureRow {
                key: failure.key.clone(),
                value: Self::truncate(&failure.value, VALUE_WIDTH),
                error: Self::truncate(&failure.error, VALUE_WIDTH),
            })
            .collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        output
    }

    /// Truncates a string for table display.
    fn truncate(s: &str, max: usize) -> String {
        if s.chars().count() <= max {
            s.to_string()
        } else {
            let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
            format!("{truncated}...")
        }
    }
}

/// Builds the JSON projection of a resolved configuration.
fn config_json(config: &Config) -> ConfigJson<'_> {
    let vars = config
        .vars
        .iter()
        .map(|(name, value)| {
            let json = match value {
                VarValue::Data(data) => {
                    serde_json::to_value(data).unwrap_or(serde_json::Value::Null)
                }
                VarValue::Opaque(opaque) => serde_json::Value::String(opaque.to_string()),
            };
            (name.clone(), json)
        })
        .collect();

    let params = config
        .params
        .iter()
        .map(|(name, value)| {
            (
                name.clone(),
                serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
            )
        })
        .collect();

    ConfigJson {
        name: &config.name,
        environment: &config.environment,
        stack_name: &config.core.stack_name,
        template: &config.template_source,
        vars,
        params,
        tags: config.tags.to_list(),
        helpers: config.helpers.iter().cloned().collect(),
    }
}

/// Returns the display form of a parameter value.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => stringify(other).unwrap_or_else(|_| format!("{other:?}")),
    }
}

/// Returns a short name for a value's type.
const fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) | Value::Tagged(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_preserves_short_strings() {
        assert_eq!(OutputFormatter::truncate("short", 10), "short");
        let long = "x".repeat(100);
        let truncated = OutputFormatter::truncate(&long, 10);
        assert_eq!(truncated.chars().count(), 10);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_failure_table_lists_every_key() {
        let failures = vec![
            InterpolationFailure {
                key: String::from("a"),
                value: String::from("{{ b }}"),
                error: String::from("undefined value"),
            },
            InterpolationFailure {
                key: String::from("b"),
                value: String::from("{{ a }}"),
                error: String::from("undefined value"),
            },
        ];
        let table = OutputFormatter::format_interpolation_failures(&failures);
        assert!(table.contains("{{ b }}"));
        assert!(table.contains("{{ a }}"));
        assert!(table.contains("2 variable(s)"));
    }
}
