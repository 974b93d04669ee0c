//! Single-pass interpolation against a fully-resolved context.
//!
//! Unlike the fixed-point engine in [`super::vars`], there is no retry: the
//! context is already complete, so any render failure is immediately fatal.
//! Used for `params`, `tags`, `core` settings, the `template` source
//! descriptor, and per-reference option blocks.

use std::collections::BTreeMap;

use minijinja::value::Value as TemplateValue;
use serde_yaml::Value;

use crate::error::{ResolveError, Result};

use super::render::{Renderer, stringify};

/// Resolves a raw mapping in one pass against a resolved context.
///
/// Keys whose rendered value parses to null are omitted from the result.
///
/// # Errors
///
/// Returns an error identifying the key, its raw value, and the underlying
/// cause on the first render or parse failure.
pub fn interpolate_dict(
    raw: BTreeMap<String, Value>,
    context: &TemplateValue,
    renderer: &Renderer,
) -> Result<BTreeMap<String, Value>> {
    let mut resolved = BTreeMap::new();

    for (key, value) in raw {
        let parsed = renderer.render_value(&value, context).map_err(|cause| {
            ResolveError::key_failed(
                key.clone(),
                stringify(&value).unwrap_or_else(|_| format!("{value:?}")),
                cause,
            )
        })?;

        if !parsed.is_null() {
            resolved.insert(key, parsed);
        }
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::render::{TemplateContext, to_template_value};

    fn context_with(pairs: &[(&str, &str)]) -> TemplateValue {
        let mut context = TemplateContext::new();
        for (key, yaml) in pairs {
            let value: Value = serde_yaml::from_str(yaml).unwrap();
            context.insert(*key, to_template_value(&value));
        }
        context.to_value()
    }

    fn raw(entries: &[(&str, &str)]) -> BTreeMap<String, Value> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), serde_yaml::from_str(v).unwrap()))
            .collect()
    }

    #[test]
    fn test_resolves_against_context() {
        let renderer = Renderer::new();
        let context = context_with(&[("greeting", "\"hello, world!\"")]);
        let resolved = interpolate_dict(
            raw(&[("jane", "\"Jane said {{ greeting }}\"")]),
            &context,
            &renderer,
        )
        .unwrap();
        assert_eq!(
            resolved.get("jane"),
            Some(&Value::String(String::from("Jane said hello, world!")))
        );
    }

    #[test]
    fn test_null_values_are_omitted() {
        let renderer = Renderer::new();
        let context = context_with(&[]);
        let resolved =
            interpolate_dict(raw(&[("present", "kept"), ("absent", "null")]), &context, &renderer)
                .unwrap();
        assert!(resolved.contains_key("present"));
        assert!(!resolved.contains_key("absent"));
    }

    #[test]
    fn test_render_failure_is_fatal_and_identifies_key() {
        let renderer = Renderer::new();
        let context = context_with(&[]);
        let err = interpolate_dict(
            raw(&[("broken", "\"{{ missing_var }}\"")]),
            &context,
            &renderer,
        )
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("broken"));
        assert!(message.contains("{{ missing_var }}"));
    }
}
