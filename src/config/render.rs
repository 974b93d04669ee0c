//! Templating backend for configuration interpolation.
//!
//! Wraps a Jinja environment configured with strict undefined semantics:
//! rendering a template that references a name absent from the context is an
//! error, never a silent blank. The fixed-point variable resolution in
//! [`super::vars`] depends on this property to detect not-yet-resolved
//! dependencies.

use std::collections::BTreeMap;
use std::sync::Arc;

use minijinja::value::{Enumerator, Object, Value as TemplateValue};
use minijinja::{Environment, UndefinedBehavior};
use serde_yaml::Value;

/// Strict-undefined Jinja renderer shared across one resolution run.
#[derive(Debug)]
pub struct Renderer {
    /// The underlying template environment.
    env: Environment<'static>,
}

impl Renderer {
    /// Creates a renderer with strict undefined-name semantics.
    #[must_use]
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Self { env }
    }

    /// Renders a template source string against a context.
    ///
    /// # Errors
    ///
    /// Returns an error if the template is malformed or references a name
    /// absent from the context.
    pub fn render(
        &self,
        source: &str,
        context: &TemplateValue,
    ) -> std::result::Result<String, minijinja::Error> {
        self.env.render_str(source, context.clone())
    }

    /// Renders one templatable raw value and parses the result back into a
    /// native value.
    ///
    /// The raw value is stringified (collections in their single-line
    /// structured form, so expressions nested inside them are rendered too),
    /// rendered, and the rendered text parsed as YAML. A value that is
    /// exactly one expression therefore round-trips the referenced value's
    /// native type, while any compound string stays a string.
    ///
    /// # Errors
    ///
    /// Returns the captured failure message if stringification, rendering,
    /// or re-parsing fails.
    pub fn render_value(
        &self,
        raw: &Value,
        context: &TemplateValue,
    ) -> std::result::Result<Value, String> {
        let source = stringify(raw)?;
        let rendered = self
            .render(&source, context)
            .map_err(|e| e.to_string())?;
        parse_rendered(&rendered)
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the template source form of a raw value.
///
/// # Errors
///
/// Returns a message if the value cannot be represented as template text.
pub fn stringify(value: &Value) -> std::result::Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => serde_json::to_string(other).map_err(|e| format!("cannot stringify value: {e}")),
    }
}

/// Parses rendered template output back into a native value.
///
/// # Errors
///
/// Returns a message if the rendered text is not parseable.
pub fn parse_rendered(rendered: &str) -> std::result::Result<Value, String> {
    serde_yaml::from_str(rendered).map_err(|e| format!("rendered value is not valid YAML: {e}"))
}

/// Converts a native value into its template-context representation.
#[must_use]
pub fn to_template_value(value: &Value) -> TemplateValue {
    TemplateValue::from_serialize(value)
}

/// A name → value context exposed to templates with strict lookup:
/// names absent from the map are undefined, which the strict environment
/// turns into render errors.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// Bound names.
    values: BTreeMap<String, TemplateValue>,
}

impl TemplateContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a name in the context.
    pub fn insert(&mut self, key: impl Into<String>, value: TemplateValue) {
        self.values.insert(key.into(), value);
    }

    /// Returns the context as a template root value.
    #[must_use]
    pub fn to_value(&self) -> TemplateValue {
        TemplateValue::from_object(self.clone())
    }
}

impl Object for TemplateContext {
    fn get_value(self: &Arc<Self>, key: &TemplateValue) -> Option<TemplateValue> {
        self.values.get(key.as_str()?).cloned()
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Values(
            self.values
                .keys()
                .map(|k| TemplateValue::from(k.clone()))
                .collect(),
        )
    }
}
