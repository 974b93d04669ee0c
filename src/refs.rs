//! Named references to already-deployed stacks.
//!
//! The `refs` section declares pointers to other stacks whose outputs feed
//! this deployment's variables. Each reference resolves its option block
//! (stack-name template, region, optional flag), is described exactly once
//! per resolution run, and exposes output lookups: optional references to
//! absent stacks yield nothing, required ones fail with the resolved stack
//! name and region.

use std::collections::BTreeMap;
use std::sync::Arc;

use minijinja::value::{Enumerator, Object, Value as TemplateValue};
use serde::Deserialize;
use serde_yaml::Value;
use tracing::{debug, info};

use crate::aws::{StackDescription, StackOutput, StackProvider};
use crate::config::interpolate::interpolate_dict;
use crate::config::render::{Renderer, TemplateContext};
use crate::error::{RefError, Result};

/// Default stack-name template for references.
const DEFAULT_REF_STACK_NAME: &str = "{{ environment }}-{{ name }}";

/// Reference names that are silently skipped; `environment` in a `refs`
/// block is a recurring authoring mistake.
const RESERVED_REF_NAMES: &[&str] = &["environment"];

/// Resolved option block for one stack reference.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct RefOpts {
    /// Resolved CloudFormation stack name.
    stack_name: String,
    /// Region the referenced stack lives in.
    region: String,
    /// Whether the reference may point at a stack that does not exist.
    #[serde(default)]
    optional: bool,
}

/// A handle to one referenced stack, with its describe result cached for
/// the lifetime of the resolution run.
#[derive(Debug, Clone)]
pub struct StackReference {
    /// Name the reference is declared under.
    ref_name: String,
    /// Resolved CloudFormation stack name.
    stack_name: String,
    /// Region the stack was looked up in.
    region: String,
    /// Whether the reference tolerates a missing stack.
    optional: bool,
    /// Cached describe result; `None` means the stack does not exist.
    state: Option<StackDescription>,
}

impl StackReference {
    /// Returns the name the reference is declared under.
    #[must_use]
    pub fn ref_name(&self) -> &str {
        &self.ref_name
    }

    /// Returns the resolved CloudFormation stack name.
    #[must_use]
    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    /// Returns the region the stack was looked up in.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Returns true if the reference tolerates a missing stack.
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        self.optional
    }

    /// Returns true if the referenced stack exists.
    #[must_use]
    pub const fn exists(&self) -> bool {
        self.state.is_some()
    }

    /// Returns the stack status, if the stack exists.
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.state.as_ref().map(|s| s.status.as_str())
    }

    /// Returns the stack outputs, if the stack exists.
    #[must_use]
    pub fn outputs(&self) -> Option<&[StackOutput]> {
        self.state.as_ref().map(|s| s.outputs.as_slice())
    }

    /// Looks up one output by key.
    ///
    /// Returns `None` when the stack is absent and the reference is
    /// optional.
    ///
    /// # Errors
    ///
    /// Returns an error when a required stack is absent (naming the
    /// resolved stack name and region), or when the stack exists but does
    /// not expose the key (listing the keys it does expose).
    pub fn output(&self, key: &str) -> Result<Option<&StackOutput>> {
        match &self.state {
            Some(description) => description
                .outputs
                .iter()
                .find(|o| o.key == key)
                .map(Some)
                .ok_or_else(|| {
                    RefError::OutputNotFound {
                        key: key.to_string(),
                        stack_name: self.stack_name.clone(),
                        available: description.outputs.iter().map(|o| o.key.clone()).collect(),
                    }
                    .into()
                }),
            None if self.optional => {
                debug!(
                    key,
                    stack = %self.description(),
                    "returning nothing for optional reference to missing stack"
                );
                Ok(None)
            }
            None => Err(RefError::StackNotFound {
                name: self.ref_name.clone(),
                stack_name: self.stack_name.clone(),
                region: self.region.clone(),
            }
            .into()),
        }
    }

    /// Returns a short operator-facing description of the stack.
    #[must_use]
    pub fn description(&self) -> String {
        format!(
            "[cfn_name={},region={},status={}]",
            self.stack_name,
            self.region,
            self.status().unwrap_or("?")
        )
    }
}

/// The resolved reference namespace for one resolution run.
#[derive(Debug, Clone, Default)]
pub struct StackRefs {
    /// Handles keyed by reference name.
    stacks: BTreeMap<String, StackReference>,
}

impl StackRefs {
    /// Builds one handle per declared reference.
    ///
    /// Each reference's options are resolved single-pass against
    /// `{environment, name, region}` (with the declared name's underscores
    /// hyphenated), then the referenced stack is described once; the result
    /// is cached on the handle for the rest of the run.
    ///
    /// # Errors
    ///
    /// Returns an error if an option block is malformed or a lookup fails.
    pub async fn load(
        refs: BTreeMap<String, Value>,
        environment: &str,
        region: &str,
        provider: &dyn StackProvider,
        renderer: &Renderer,
    ) -> Result<Self> {
        let mut stacks = BTreeMap::new();

        for (name, options) in refs {
            if RESERVED_REF_NAMES.contains(&name.as_str()) {
                debug!(name = %name, "skipping reserved ref name");
                continue;
            }

            let reference =
                Self::build_reference(&name, &options, environment, region, provider, renderer)
                    .await?;

            if reference.exists() {
                info!(
                    name = %name,
                    stack = %reference.description(),
                    outputs = reference.outputs().map_or(0, <[StackOutput]>::len),
                    "resolved stack reference"
                );
            } else {
                info!(name = %name, stack = %reference.description(), "referenced stack does not exist");
            }

            stacks.insert(name, reference);
        }

        Ok(Self { stacks })
    }

    /// Resolves one reference's options and describes its stack.
    async fn build_reference(
        name: &str,
        options: &Value,
        environment: &str,
        region: &str,
        provider: &dyn StackProvider,
        renderer: &Renderer,
    ) -> Result<StackReference> {
        let mut raw_opts: BTreeMap<String, Value> = BTreeMap::new();
        raw_opts.insert(
            String::from("stack_name"),
            Value::String(String::from(DEFAULT_REF_STACK_NAME)),
        );
        raw_opts.insert(String::from("region"), Value::String(region.to_string()));
        raw_opts.insert(String::from("optional"), Value::Bool(false));

        match options {
            Value::Null => {}
            Value::Mapping(mapping) => {
                for (key, value) in mapping {
                    let key = key.as_str().ok_or_else(|| RefError::InvalidRefOptions {
                        name: name.to_string(),
                        message: format!("non-string option key: {key:?}"),
                    })?;
                    raw_opts.insert(key.to_string(), value.clone());
                }
            }
            other => {
                return Err(RefError::InvalidRefOptions {
                    name: name.to_string(),
                    message: format!("expected a mapping of options, got: {other:?}"),
                }
                .into());
            }
        }

        let mut context = TemplateContext::new();
        context.insert("environment", TemplateValue::from(environment));
        context.insert("name", TemplateValue::from(name.replace('_', "-")));
        context.insert("region", TemplateValue::from(region));

        let resolved =
            interpolate_dict(raw_opts, &context.to_value(), renderer).map_err(|e| {
                RefError::InvalidRefOptions {
                    name: name.to_string(),
                    message: e.to_string(),
                }
            })?;

        let mapping = resolved
            .into_iter()
            .map(|(k, v)| (Value::String(k), v))
            .collect();
        let opts: RefOpts = serde_yaml::from_value(Value::Mapping(mapping)).map_err(|e| {
            RefError::InvalidRefOptions {
                name: name.to_string(),
                message: e.to_string(),
            }
        })?;

        debug!(name, stack_name = %opts.stack_name, region = %opts.region, optional = opts.optional, "looking up stack reference");
        let state = provider.describe_stack(&opts.region, &opts.stack_name).await?;

        Ok(StackReference {
            ref_name: name.to_string(),
            stack_name: opts.stack_name,
            region: opts.region,
            optional: opts.optional,
            state,
        })
    }

    /// Returns the declared reference names.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.stacks.keys().map(String::as_str).collect()
    }

    /// Returns true if a reference with this name is declared.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.stacks.contains_key(name)
    }

    /// Returns true if no references are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// Returns a reference handle by name.
    ///
    /// # Errors
    ///
    /// Returns an error for names not declared in `refs` (listing the valid
    /// names), or for required references whose stack does not exist.
    pub fn stack(&self, name: &str) -> Result<&StackReference> {
        let reference = self.stacks.get(name).ok_or_else(|| RefError::UnknownRef {
            name: name.to_string(),
            known: self.stacks.keys().cloned().collect(),
        })?;

        if reference.exists() || reference.is_optional() {
            Ok(reference)
        } else {
            Err(RefError::StackNotFound {
                name: reference.ref_name.clone(),
                stack_name: reference.stack_name.clone(),
                region: reference.region.clone(),
            }
            .into())
        }
    }

    /// Looks up one output from a referenced stack.
    ///
    /// Returns `None` when the reference is optional and its stack does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Propagates the unknown-name, required-missing, and missing-key
    /// policies of [`Self::stack`] and [`StackReference::output`].
    pub fn output(&self, name: &str, key: &str) -> Result<Option<&StackOutput>> {
        info!(name, key, "getting output from referenced stack");
        self.stack(name)?.output(key)
    }

    /// Returns the namespace exposed to templates as `refs.<name>.<OutputKey>`.
    #[must_use]
    pub fn namespace(&self) -> TemplateValue {
        let handles = self
            .stacks
            .values()
            .map(|reference| {
                let state = match &reference.state {
                    Some(description) => RefObjectState::Present(
                        description
                            .outputs
                            .iter()
                            .map(|o| (o.key.clone(), o.value.clone()))
                            .collect(),
                    ),
                    None if reference.optional => RefObjectState::OptionalAbsent,
                    None => RefObjectState::RequiredAbsent,
                };
                (
                    reference.ref_name.clone(),
                    TemplateValue::from_object(RefOutputsObject {
                        description: reference.description(),
                        state,
                    }),
                )
            })
            .collect();

        TemplateValue::from_object(RefsNamespace { handles })
    }
}

/// Template object mapping reference names to their output objects.
#[derive(Debug)]
struct RefsNamespace {
    /// One output object per declared reference.
    handles: BTreeMap<String, TemplateValue>,
}

impl Object for RefsNamespace {
    fn get_value(self: &Arc<Self>, key: &TemplateValue) -> Option<TemplateValue> {
        self.handles.get(key.as_str()?).cloned()
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Values(
            self.handles
                .keys()
                .map(|k| TemplateValue::from(k.clone()))
                .collect(),
        )
    }
}

/// Cached lookup state backing one reference's template object.
#[derive(Debug)]
enum RefObjectState {
    /// Stack exists; key → output value.
    Present(BTreeMap<String, String>),
    /// Stack absent, reference optional: every key yields none.
    OptionalAbsent,
    /// Stack absent, reference required: every key is undefined, which the
    /// strict renderer reports as an error.
    RequiredAbsent,
}

/// Template object exposing one reference's outputs by key.
#[derive(Debug)]
struct RefOutputsObject {
    /// Operator-facing stack description for log messages.
    description: String,
    /// Lookup state.
    state: RefObjectState,
}

impl Object for RefOutputsObject {
    fn get_value(self: &Arc<Self>, key: &TemplateValue) -> Option<TemplateValue> {
        let key = key.as_str()?;
        match &self.state {
            RefObjectState::Present(outputs) => outputs.get(key).cloned().map(TemplateValue::from),
            RefObjectState::OptionalAbsent => {
                debug!(key, stack = %self.description, "optional referenced stack does not exist");
                Some(TemplateValue::from(()))
            }
            RefObjectState::RequiredAbsent => {
                debug!(key, stack = %self.description, "required referenced stack does not exist");
                None
            }
        }
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        match &self.state {
            RefObjectState::Present(outputs) => Enumerator::Values(
                outputs.keys().map(|k| TemplateValue::from(k.clone())).collect(),
            ),
            RefObjectState::OptionalAbsent | RefObjectState::RequiredAbsent => Enumerator::Empty,
        }
    }
}
