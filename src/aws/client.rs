//! AWS-backed stack provider.
//!
//! Implements [`StackProvider`] with CloudFormation `DescribeStacks` and STS
//! `GetCallerIdentity`. Stack references may live in a region other than the
//! primary deployment region, so a client is built per lookup with the
//! requested region; callers memoize results per referenced stack.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_cloudformation::error::ProvideErrorMetadata;
use tracing::debug;

use crate::error::{AwsError, Result};

use super::provider::{StackDescription, StackOutput, StackProvider};

/// Stack provider backed by the AWS APIs.
#[derive(Debug, Clone, Default)]
pub struct AwsStackProvider {
    /// Optional named credentials profile.
    profile: Option<String>,
}

impl AwsStackProvider {
    /// Creates a provider, optionally bound to a named credentials profile.
    #[must_use]
    pub const fn new(profile: Option<String>) -> Self {
        Self { profile }
    }

    /// Loads SDK configuration for an optional region override.
    async fn sdk_config(&self, region: Option<&str>) -> aws_config::SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(profile) = &self.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        loader.load().await
    }
}

#[async_trait]
impl StackProvider for AwsStackProvider {
    async fn account_id(&self) -> Result<String> {
        let config = self.sdk_config(None).await;
        let sts = aws_sdk_sts::Client::new(&config);

        let identity = sts.get_caller_identity().send().await.map_err(|e| {
            AwsError::CallerIdentity {
                message: e.to_string(),
            }
        })?;

        identity
            .account()
            .map(ToString::to_string)
            .ok_or_else(|| {
                AwsError::CallerIdentity {
                    message: String::from("caller identity has no account id"),
                }
                .into()
            })
    }

    async fn describe_stack(
        &self,
        region: &str,
        stack_name: &str,
    ) -> Result<Option<StackDescription>> {
        debug!(stack_name, region, "describing stack");

        let config = self.sdk_config(Some(region)).await;
        let cfn = aws_sdk_cloudformation::Client::new(&config);

        let output = match cfn.describe_stacks().stack_name(stack_name).send().await {
            Ok(output) => output,
            Err(err) if is_missing_stack_error(&err) => return Ok(None),
            Err(err) => {
                return Err(AwsError::cloudformation(format!(
                    "DescribeStacks failed for {stack_name} in {region}: {err}"
                ))
                .into());
            }
        };

        let Some(stack) = output.stacks().first() else {
            return Ok(None);
        };

        let status = stack
            .stack_status()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default();
        let outputs = stack
            .outputs()
            .iter()
            .map(|o| StackOutput {
                key: o.output_key().unwrap_or_default().to_string(),
                value: o.output_value().unwrap_or_default().to_string(),
                description: o.description().unwrap_or_default().to_string(),
            })
            .collect();

        Ok(Some(StackDescription { status, outputs }))
    }
}

/// CloudFormation reports a missing stack as a `ValidationError` rather than
/// a distinct error type.
fn is_missing_stack_error<E: ProvideErrorMetadata>(err: &E) -> bool {
    err.code() == Some("ValidationError")
        && err.message().is_some_and(|m| m.contains("does not exist"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_cloudformation::error::ErrorMetadata;

    struct FakeError(ErrorMetadata);

    impl ProvideErrorMetadata for FakeError {
        fn meta(&self) -> &ErrorMetadata {
            &self.0
        }
    }

    #[test]
    fn test_missing_stack_detected_from_validation_error() {
        let err = FakeError(
            ErrorMetadata::builder()
                .code("ValidationError")
                .message("Stack with id dev-network does not exist")
                .build(),
        );
        assert!(is_missing_stack_error(&err));
    }

    #[test]
    fn test_other_validation_errors_are_not_missing_stacks() {
        let err = FakeError(
            ErrorMetadata::builder()
                .code("ValidationError")
                .message("1 validation error detected")
                .build(),
        );
        assert!(!is_missing_stack_error(&err));

        let err = FakeError(
            ErrorMetadata::builder()
                .code("Throttling")
                .message("Rate exceeded, does not exist is irrelevant here")
                .build(),
        );
        assert!(!is_missing_stack_error(&err));
    }
}
