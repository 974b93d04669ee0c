//! Fixed-point resolution of interpolated variables.
//!
//! The `vars` section is a bag of values that may reference each other in
//! any order. Rather than building a dependency graph, resolution renders
//! every unresolved value each pass: a value whose dependencies are not yet
//! resolved fails (strict undefined) and is retried on the next pass once
//! they land. Values with no dependencies resolve on the first pass, so the
//! bag converges within one pass per dependency-chain link, bounded by
//! [`MAX_INTERPOLATION_DEPTH`].

use std::collections::BTreeMap;

use minijinja::value::Value as TemplateValue;
use serde_yaml::Value;
use tracing::debug;

use crate::error::{InterpolationFailure, ResolveError, Result};

use super::render::{Renderer, TemplateContext, stringify, to_template_value};

/// Maximum number of retry passes after the first attempt.
pub const MAX_INTERPOLATION_DEPTH: usize = 10;

/// One raw or resolved entry in the variable bag.
///
/// `Data` values are templatable: their string form is rendered and the
/// result parsed back to a native value. `Opaque` values are pre-seeded
/// objects (the process environment, deploy metadata, the stack-reference
/// namespace) that bypass templating entirely.
#[derive(Debug, Clone)]
pub enum VarValue {
    /// A templatable value (string, boolean, number, list, mapping, null).
    Data(Value),
    /// A pre-seeded object passed through to the template context untouched.
    Opaque(TemplateValue),
}

impl VarValue {
    /// Returns the native value for data entries.
    #[must_use]
    pub const fn as_data(&self) -> Option<&Value> {
        match self {
            Self::Data(value) => Some(value),
            Self::Opaque(_) => None,
        }
    }

    /// Returns the template-context representation of this value.
    #[must_use]
    pub fn to_template_value(&self) -> TemplateValue {
        match self {
            Self::Data(value) => to_template_value(value),
            Self::Opaque(value) => value.clone(),
        }
    }

    /// Returns a display form for reports and tables.
    #[must_use]
    pub fn display_string(&self) -> String {
        match self {
            Self::Data(Value::String(s)) => s.clone(),
            Self::Data(value) => stringify(value).unwrap_or_else(|_| format!("{value:?}")),
            Self::Opaque(value) => value.to_string(),
        }
    }

    /// Returns a short name for the value's type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Data(Value::Null) => "null",
            Self::Data(Value::Bool(_)) => "boolean",
            Self::Data(Value::Number(n)) if n.is_f64() => "float",
            Self::Data(Value::Number(_)) => "integer",
            Self::Data(Value::String(_)) => "string",
            Self::Data(Value::Sequence(_)) => "list",
            Self::Data(Value::Mapping(_) | Value::Tagged(_)) => "mapping",
            Self::Opaque(_) => "object",
        }
    }
}

/// The resolved variable bag. Once a name is present it is immutable for
/// the remainder of the run.
#[derive(Debug, Clone, Default)]
pub struct Vars {
    /// Resolved entries.
    values: BTreeMap<String, VarValue>,
}

impl Vars {
    /// Resolves a raw variable bag to its fixed point.
    ///
    /// Iterates up to `MAX_INTERPOLATION_DEPTH + 1` passes over the
    /// not-yet-resolved names (in sorted order, though the outcome is
    /// order-independent); each pass clears superseded per-key errors so
    /// the final report reflects only permanent failures.
    ///
    /// # Errors
    ///
    /// Returns a batch [`ResolveError::Interpolation`] carrying every
    /// permanently failing key with its raw value and captured cause.
    pub fn resolve(raw: BTreeMap<String, VarValue>, renderer: &Renderer) -> Result<Self> {
        let mut remaining = raw;
        let mut resolved: BTreeMap<String, VarValue> = BTreeMap::new();
        let mut context = TemplateContext::new();
        let mut errors: BTreeMap<String, InterpolationFailure> = BTreeMap::new();

        for attempt in 0..=MAX_INTERPOLATION_DEPTH {
            if remaining.is_empty() {
                break;
            }

            let pending: Vec<String> = remaining.keys().cloned().collect();
            debug!(attempt, pending = pending.len(), "variable interpolation pass");

            for key in pending {
                let Some(value) = remaining.get(&key).cloned() else {
                    continue;
                };
                errors.remove(&key);

                match &value {
                    VarValue::Opaque(opaque) => {
                        context.insert(key.clone(), opaque.clone());
                        resolved.insert(key.clone(), value.clone());
                        remaining.remove(&key);
                    }
                    VarValue::Data(Value::Null) => {
                        context.insert(key.clone(), TemplateValue::from(()));
                        resolved.insert(key.clone(), value.clone());
                        remaining.remove(&key);
                    }
                    VarValue::Data(raw_value) => {
                        match renderer.render_value(raw_value, &context.to_value()) {
                            Ok(parsed) => {
                                // A value rendering to nothing resolves to the
                                // empty string, not null.
                                let parsed = if parsed.is_null() {
                                    Value::String(String::new())
                                } else {
                                    parsed
                                };
                                context.insert(key.clone(), to_template_value(&parsed));
                                resolved.insert(key.clone(), VarValue::Data(parsed));
                                remaining.remove(&key);
                            }
                            Err(message) => {
                                debug!(key = %key, error = %message, "interpolation attempt failed");
                                errors.insert(
                                    key.clone(),
                                    InterpolationFailure {
                                        key: key.clone(),
                                        value: stringify(raw_value)
                                            .unwrap_or_else(|_| format!("{raw_value:?}")),
                                        error: message,
                                    },
                                );
                            }
                        }
                    }
                }
            }
        }

        if remaining.is_empty() {
            Ok(Self { values: resolved })
        } else {
            Err(ResolveError::Interpolation {
                errors: errors.into_values().collect(),
            }
            .into())
        }
    }

    /// Returns a resolved variable by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&VarValue> {
        self.values.get(name)
    }

    /// Adds a resolved entry (used to seed the computed stack name back
    /// into the bag before params/tags resolution).
    pub fn insert(&mut self, name: impl Into<String>, value: VarValue) {
        self.values.insert(name.into(), value);
    }

    /// Iterates resolved entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &VarValue)> {
        self.values.iter()
    }

    /// Returns the number of resolved variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true when the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the bag as a template root context for single-pass
    /// interpolation of params, tags, and settings sections.
    #[must_use]
    pub fn context(&self) -> TemplateValue {
        let mut context = TemplateContext::new();
        for (key, value) in &self.values {
            context.insert(key.clone(), value.to_template_value());
        }
        context.to_value()
    }
}
