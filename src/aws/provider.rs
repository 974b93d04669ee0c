//! Stack lookup trait definition.
//!
//! This module defines the capability the resolution engine consumes from
//! the deployment backend: account identity and a point-in-time description
//! of an already-deployed stack.

use async_trait::async_trait;

use crate::error::Result;

/// One output exposed by a deployed stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackOutput {
    /// Output key.
    pub key: String,
    /// Output value.
    pub value: String,
    /// Human-readable description attached to the output.
    pub description: String,
}

/// Point-in-time description of a deployed stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackDescription {
    /// Current stack status (e.g. `CREATE_COMPLETE`).
    pub status: String,
    /// Outputs exposed by the stack.
    pub outputs: Vec<StackOutput>,
}

/// Trait for backends that can describe deployed stacks.
#[async_trait]
pub trait StackProvider: Send + Sync {
    /// Returns the account id of the active credentials.
    async fn account_id(&self) -> Result<String>;

    /// Describes a stack by name in a region.
    ///
    /// Returns `None` if no stack with that name exists.
    async fn describe_stack(
        &self,
        region: &str,
        stack_name: &str,
    ) -> Result<Option<StackDescription>>;
}

#[async_trait]
impl StackProvider for Box<dyn StackProvider> {
    async fn account_id(&self) -> Result<String> {
        (**self).account_id().await
    }

    async fn describe_stack(
        &self,
        region: &str,
        stack_name: &str,
    ) -> Result<Option<StackDescription>> {
        (**self).describe_stack(region, stack_name).await
    }
}
