//! Error types for the Cirrus deployment system.
//!
//! This module provides a comprehensive error hierarchy for configuration
//! loading, variable resolution, stack references, and AWS access.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the Cirrus deployment system.
#[derive(Debug, Error)]
pub enum CirrusError {
    /// Configuration loading and schema errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Variable/parameter resolution errors.
    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),

    /// Stack reference errors.
    #[error("Stack reference error: {0}")]
    Ref(#[from] RefError),

    /// AWS API errors.
    #[error("AWS error: {0}")]
    Aws(#[from] AwsError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration loading and schema errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No file matched the logical name (tried literal, `.yaml`, `.yml`).
    #[error("Configuration file '{name}' not found in {} (tried .yaml, .yml)", search_dir.display())]
    FileNotFound {
        /// The logical name that could not be resolved.
        name: String,
        /// Directory searched.
        search_dir: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// The document contains sections outside the recognized set.
    #[error("Config file {file} has unexpected sections: {}", sections.join(", "))]
    UnexpectedSections {
        /// Offending document.
        file: String,
        /// The unrecognized section names.
        sections: Vec<String>,
    },

    /// An environment name collides with a recognized section name.
    #[error("Config file {file} declares environment '{environment}' which collides with a reserved section name")]
    ReservedEnvironmentName {
        /// Offending document.
        file: String,
        /// The colliding environment name.
        environment: String,
    },

    /// A section is present but is not the expected shape.
    #[error("Config file {file} section '{section}' is invalid: {message}")]
    InvalidSection {
        /// Offending document.
        file: String,
        /// Offending section.
        section: String,
        /// What was wrong with it.
        message: String,
    },

    /// The requested environment is not declared by the root document.
    #[error("Environment '{environment}' is not a valid environment for {file}. Only {} permitted", permitted.join(", "))]
    UnknownEnvironment {
        /// The requested environment.
        environment: String,
        /// Root document.
        file: String,
        /// Environments the root document declares.
        permitted: Vec<String>,
    },

    /// A merged document declares an environment outside the allowlist.
    #[error("Config file {file} declares environment '{environment}' which is not permitted (allowed: {})", permitted.join(", "))]
    EnvironmentNotPermitted {
        /// Offending document.
        file: String,
        /// The invalid environment name.
        environment: String,
        /// The allowlist in force.
        permitted: Vec<String>,
    },

    /// The resolved stack name fails the CloudFormation naming pattern.
    #[error("Stack name '{name}' is invalid: must match ^[A-Za-z0-9-]+$")]
    InvalidStackName {
        /// The rejected stack name.
        name: String,
    },
}

/// Variable and parameter resolution errors.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// One or more variables failed to render after exhausting retries.
    #[error("{} variable(s) could not be resolved: {}", errors.len(), errors.iter().map(|e| e.key.as_str()).collect::<Vec<_>>().join(", "))]
    Interpolation {
        /// One record per permanently failing key.
        errors: Vec<InterpolationFailure>,
    },

    /// A single-pass interpolation failed for one key.
    #[error("Unable to process {key}, value={value}: {cause}")]
    KeyFailed {
        /// The failing key.
        key: String,
        /// The raw (uninterpolated) value.
        value: String,
        /// The underlying render/parse error.
        cause: String,
    },

    /// A resolved settings block did not match its schema.
    #[error("Invalid '{section}' settings: {message}")]
    InvalidSettings {
        /// The settings section (e.g. `aws`, `core`).
        section: String,
        /// Description of the mismatch.
        message: String,
    },
}

/// One permanently failing key from the fixed-point interpolation loop.
#[derive(Debug, Clone)]
pub struct InterpolationFailure {
    /// The variable name.
    pub key: String,
    /// The raw value that failed to render.
    pub value: String,
    /// The captured error message from the last attempt.
    pub error: String,
}

/// Stack reference errors.
#[derive(Debug, Error)]
pub enum RefError {
    /// A reference name was requested that is not declared in `refs`.
    #[error("'{name}' is not a known stack ref - only know about {}", known.join(", "))]
    UnknownRef {
        /// The requested reference name.
        name: String,
        /// Names declared in the `refs` section.
        known: Vec<String>,
    },

    /// A required reference points at a stack that does not exist.
    #[error("Referenced stack '{name}' does not exist (stack name={stack_name}, region={region})")]
    StackNotFound {
        /// The reference name.
        name: String,
        /// The resolved CloudFormation stack name.
        stack_name: String,
        /// The region that was searched.
        region: String,
    },

    /// The referenced stack exists but does not expose the requested output.
    #[error("'{key}' not in outputs of {stack_name} - only have {}", available.join(", "))]
    OutputNotFound {
        /// The requested output key.
        key: String,
        /// The resolved CloudFormation stack name.
        stack_name: String,
        /// Output keys the stack does expose.
        available: Vec<String>,
    },

    /// The per-reference option block could not be resolved.
    #[error("Invalid options for stack ref '{name}': {message}")]
    InvalidRefOptions {
        /// The reference name.
        name: String,
        /// Description of the problem.
        message: String,
    },
}

/// AWS API errors.
#[derive(Debug, Error)]
pub enum AwsError {
    /// A CloudFormation API call failed.
    #[error("CloudFormation API error: {message}")]
    CloudFormation {
        /// Description of the API failure.
        message: String,
    },

    /// The caller identity (account id) could not be determined.
    #[error("Failed to determine AWS account id: {message}")]
    CallerIdentity {
        /// Description of the STS failure.
        message: String,
    },
}

/// Result type alias for Cirrus operations.
pub type Result<T> = std::result::Result<T, CirrusError>;

impl CirrusError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl ConfigError {
    /// Creates an invalid-section error for a specific document and section.
    #[must_use]
    pub fn invalid_section(
        file: impl Into<String>,
        section: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidSection {
            file: file.into(),
            section: section.into(),
            message: message.into(),
        }
    }
}

impl ResolveError {
    /// Creates a single-pass failure record for one key.
    #[must_use]
    pub fn key_failed(
        key: impl Into<String>,
        value: impl Into<String>,
        cause: impl Into<String>,
    ) -> Self {
        Self::KeyFailed {
            key: key.into(),
            value: value.into(),
            cause: cause.into(),
        }
    }
}

impl AwsError {
    /// Creates a CloudFormation API error.
    #[must_use]
    pub fn cloudformation(message: impl Into<String>) -> Self {
        Self::CloudFormation {
            message: message.into(),
        }
    }
}
