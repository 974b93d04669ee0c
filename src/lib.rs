// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Cirrus Deploy Stacks
//!
//! A declarative, environment-aware deployment system for AWS CloudFormation
//! stacks.
//!
//! ## Overview
//!
//! Cirrus resolves layered YAML configuration into everything a stack
//! deployment needs:
//!
//! - Merge a root config document and its transitive includes with defined
//!   precedence, per target environment
//! - Resolve interdependent templated variables to a fixed point, in any
//!   declaration order
//! - Pull outputs from already-deployed stacks through named references
//! - Produce the final stack name, parameters, and tags for the deployment
//!   executor
//!
//! ## Architecture
//!
//! The system is built around one **resolution run** per (stack,
//! environment) pair:
//!
//! 1. **Load**: root document + includes flatten into a precedence-ordered
//!    document set
//! 2. **Resolve**: AWS settings, stack references, then the variable bag to
//!    its fixed point
//! 3. **Project**: core settings, parameters, template source, and tags
//!    against the fixed variables
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading, merging, and resolution
//! - [`refs`]: References to already-deployed stacks
//! - [`aws`]: AWS settings and the stack lookup provider
//! - [`template`]: Template source descriptor
//! - [`error`]: Error hierarchy
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! aws:
//!   region: ap-southeast-2
//!   cfn_bucket: my-deploy-artifacts
//!
//! environments:
//!   dev:
//!   prod:
//!
//! refs:
//!   network:
//!
//! vars:
//!   subnet: "{{ refs.network.PublicSubnetId }}"
//!
//! params:
//!   SubnetId: "{{ subnet }}"
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod aws;
pub mod cli;
pub mod config;
pub mod error;
pub mod refs;
pub mod template;

// ============================================================================
// Re-exports
// ============================================================================

pub use aws::{AwsSettings, AwsStackProvider, StackDescription, StackOutput, StackProvider};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{
    Config, ConfigDocument, ConfigFile, ConfigFileSet, CoreSettings, DeployMetadata, Overrides,
    ResolveRequest, Tag, Tags, VarValue, Vars,
};
pub use error::{CirrusError, Result};
pub use refs::{StackReference, StackRefs};
pub use template::TemplateSource;
