//! AWS integration: deployment settings and the stack lookup provider.

pub mod client;
pub mod provider;
pub mod settings;

pub use client::AwsStackProvider;
pub use provider::{StackDescription, StackOutput, StackProvider};
pub use settings::AwsSettings;
