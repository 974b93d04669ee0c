//! The resolved configuration façade.
//!
//! Orchestrates one resolution run for a (stack, environment) pair: load the
//! root document and its includes, resolve AWS settings and stack
//! references, run the fixed-point variable interpolation, then resolve
//! core settings, params, template source, and tags against the fixed
//! variable bag. The resulting [`Config`] is immutable.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use minijinja::value::Value as TemplateValue;
use serde::Serialize;
use serde_yaml::Value;
use tracing::{debug, info};

use crate::aws::{AwsSettings, StackProvider};
use crate::error::{ConfigError, Result};
use crate::refs::StackRefs;
use crate::template::TemplateSource;

use super::core::{CoreSettings, DEFAULT_STACK_NAME_TEMPLATE};
use super::file::{ConfigFile, ConfigFileSet};
use super::interpolate::interpolate_dict;
use super::overrides::Overrides;
use super::render::{Renderer, TemplateContext};
use super::tags::Tags;
use super::vars::{VarValue, Vars};

/// Inputs for one resolution run.
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    /// Stack config name (may contain `/` for nested configs).
    pub name: String,
    /// Target environment.
    pub environment: String,
    /// Root configuration directory.
    pub config_dir: PathBuf,
    /// Default template repository/path, if the config does not set one.
    pub template_path: Option<String>,
    /// CLI override channels.
    pub overrides: Overrides,
}

/// Metadata describing the deployment in flight, exposed to templates as
/// the `deploy` variable.
#[derive(Debug, Clone, Serialize)]
pub struct DeployMetadata {
    /// When this resolution run started.
    pub deployed_at: DateTime<Utc>,
    /// Who is deploying (from `USER`).
    pub deployed_by: String,
    /// Version of the tool performing the deployment.
    pub tool_version: String,
}

impl DeployMetadata {
    /// Captures metadata for the current process.
    #[must_use]
    pub fn collect() -> Self {
        Self {
            deployed_at: Utc::now(),
            deployed_by: std::env::var("USER").unwrap_or_else(|_| String::from("unknown")),
            tool_version: String::from(env!("CARGO_PKG_VERSION")),
        }
    }
}

/// A fully resolved configuration for one (stack, environment) pair.
#[derive(Debug)]
pub struct Config {
    /// Stack config name.
    pub name: String,
    /// Target environment.
    pub environment: String,
    /// Resolved AWS settings.
    pub aws: AwsSettings,
    /// Resolved core settings (final stack name, permitted environments).
    pub core: CoreSettings,
    /// Resolved variable bag.
    pub vars: Vars,
    /// Resolved template parameters.
    pub params: BTreeMap<String, Value>,
    /// Resolved stack tags.
    pub tags: Tags,
    /// Resolved template source descriptor.
    pub template_source: TemplateSource,
    /// Stack reference namespace.
    pub refs: StackRefs,
    /// Names of template helpers to load.
    pub helpers: BTreeSet<String>,
}

impl Config {
    /// Runs one full resolution.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error per the taxonomy: schema and load
    /// errors, batched interpolation failures, reference errors, or AWS
    /// failures. No partial configuration is ever returned.
    pub async fn resolve(mut request: ResolveRequest, provider: &dyn StackProvider) -> Result<Self> {
        info!(
            name = %request.name,
            environment = %request.environment,
            "resolving configuration"
        );
        let renderer = Renderer::new();

        let root = ConfigFile::load(&request.name, &request.config_dir)?;
        let root_environments = root.environments();
        if !root_environments.contains(&request.environment) {
            return Err(ConfigError::UnknownEnvironment {
                environment: request.environment,
                file: root.document().name().to_string(),
                permitted: root_environments,
            }
            .into());
        }

        let override_documents = std::mem::take(&mut request.overrides).into_documents()?;
        let file_set = root.load_includes(override_documents)?;
        debug!(documents = file_set.documents().len(), "flattened document set");

        let aws = Self::resolve_aws(&file_set, &request.environment, provider, &renderer).await?;

        let refs_section = file_set.fetch_dict("refs", &request.environment, BTreeMap::new())?;
        let refs = StackRefs::load(
            refs_section,
            &request.environment,
            &aws.region,
            provider,
            &renderer,
        )
        .await?;

        let raw_vars = Self::seed_vars(&request, &aws, &refs, &file_set)?;
        let mut vars = Vars::resolve(raw_vars, &renderer)?;
        debug!(count = vars.len(), "variables resolved");

        let mut core_defaults = BTreeMap::new();
        core_defaults.insert(
            String::from("stack_name"),
            Value::String(String::from(DEFAULT_STACK_NAME_TEMPLATE)),
        );
        let core_section = file_set.fetch_dict("core", &request.environment, core_defaults)?;
        let core = CoreSettings::from_resolved(interpolate_dict(
            core_section,
            &vars.context(),
            &renderer,
        )?)?;
        info!(stack_name = %core.stack_name, "computed stack name");

        vars.insert(
            "stack_name",
            VarValue::Data(Value::String(core.stack_name.clone())),
        );

        let params_section = file_set.fetch_dict("params", &request.environment, BTreeMap::new())?;
        let params = interpolate_dict(params_section, &vars.context(), &renderer)?;

        let mut template_defaults = BTreeMap::new();
        template_defaults.insert(String::from("name"), Value::String(request.name.clone()));
        template_defaults.insert(String::from("version"), Value::String(String::from("main")));
        if let Some(template_path) = &request.template_path {
            template_defaults.insert(String::from("repo"), Value::String(template_path.clone()));
        }
        let template_section =
            file_set.fetch_dict("template", &request.environment, template_defaults)?;
        let template_source = TemplateSource::from_resolved(interpolate_dict(
            template_section,
            &vars.context(),
            &renderer,
        )?)?;

        let tags_section = file_set.fetch_dict("tags", &request.environment, BTreeMap::new())?;
        let tags = Tags::new(interpolate_dict(tags_section, &vars.context(), &renderer)?);

        let helpers = file_set.fetch_set("helpers", &request.environment, &[])?;

        let permitted = if core.environments.is_empty() {
            root_environments
        } else {
            core.environments.clone()
        };
        file_set.validate(&permitted)?;

        Ok(Self {
            name: request.name,
            environment: request.environment,
            aws,
            core,
            vars,
            params,
            tags,
            template_source,
            refs,
            helpers,
        })
    }

    /// Resolves the `aws` section and fills in the account id.
    async fn resolve_aws(
        file_set: &ConfigFileSet,
        environment: &str,
        provider: &dyn StackProvider,
        renderer: &Renderer,
    ) -> Result<AwsSettings> {
        let mut context = TemplateContext::new();
        context.insert("environment", TemplateValue::from(environment));

        let section = file_set.fetch_dict("aws", environment, BTreeMap::new())?;
        let resolved = interpolate_dict(section, &context.to_value(), renderer)?;
        let mut aws = AwsSettings::from_resolved(resolved)?;

        if aws.account_id.is_none() {
            aws.account_id = Some(provider.account_id().await?);
        }

        Ok(aws)
    }

    /// Assembles the default variable seed and overlays the merged `vars`
    /// section.
    fn seed_vars(
        request: &ResolveRequest,
        aws: &AwsSettings,
        refs: &StackRefs,
        file_set: &ConfigFileSet,
    ) -> Result<BTreeMap<String, VarValue>> {
        let environ: BTreeMap<String, String> = std::env::vars().collect();
        let deploy = DeployMetadata::collect();

        let mut raw: BTreeMap<String, VarValue> = BTreeMap::new();
        raw.insert(
            String::from("environ"),
            VarValue::Opaque(TemplateValue::from_serialize(&environ)),
        );
        raw.insert(
            String::from("deploy"),
            VarValue::Opaque(TemplateValue::from_serialize(&deploy)),
        );
        raw.insert(String::from("refs"), VarValue::Opaque(refs.namespace()));
        raw.insert(
            String::from("environment"),
            VarValue::Data(Value::String(request.environment.clone())),
        );
        raw.insert(
            String::from("name"),
            VarValue::Data(Value::String(request.name.clone())),
        );
        raw.insert(
            String::from("region"),
            VarValue::Data(Value::String(aws.region.clone())),
        );
        raw.insert(
            String::from("cfn_bucket"),
            VarValue::Data(Value::String(aws.cfn_bucket.clone())),
        );
        if let Some(account_id) = &aws.account_id {
            raw.insert(
                String::from("account_id"),
                VarValue::Data(Value::String(account_id.clone())),
            );
        }

        for (key, value) in file_set.fetch_dict("vars", &request.environment, BTreeMap::new())? {
            raw.insert(key, VarValue::Data(value));
        }

        Ok(raw)
    }

    /// Returns a resolved variable by name.
    #[must_use]
    pub fn var(&self, name: &str) -> Option<&VarValue> {
        self.vars.get(name)
    }

    /// Returns a resolved parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::provider::testing::StaticStackProvider;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_config(dir: &Path, relative: &str, content: &str) {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn request(name: &str, environment: &str, dir: &Path) -> ResolveRequest {
        ResolveRequest {
            name: name.to_string(),
            environment: environment.to_string(),
            config_dir: dir.to_path_buf(),
            template_path: None,
            overrides: Overrides::default(),
        }
    }

    fn provider() -> StaticStackProvider {
        StaticStackProvider::new("123456789012").with_stack(
            "ap-southeast-2",
            "dev-network",
            "CREATE_COMPLETE",
            &[("VpcId", "vpc-0abc", "The VPC id")],
        )
    }

    const BASE_CONFIG: &str = concat!(
        "aws:\n",
        "  region: ap-southeast-2\n",
        "  cfn_bucket: deploy-artifacts\n",
        "environments:\n",
        "  dev:\n",
        "  prod:\n",
    );

    fn string_var(config: &Config, name: &str) -> String {
        match config.var(name) {
            Some(VarValue::Data(Value::String(s))) => s.clone(),
            other => panic!("{name} is not a string var: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_resolution() {
        let dir = TempDir::new().unwrap();
        write_config(
            dir.path(),
            "app.yaml",
            &format!(
                "{BASE_CONFIG}\
refs:
  network:
vars:
  service: app
  greeting: \"hello from {{{{ service }}}}\"
  vpc: \"{{{{ refs.network.VpcId }}}}\"
params:
  VpcId: \"{{{{ vpc }}}}\"
  StackName: \"{{{{ stack_name }}}}\"
tags:
  environment: \"{{{{ environment }}}}\"
helpers: [cidr]
template: app-template
"
            ),
        );

        let provider = provider();
        let config = Config::resolve(request("app", "dev", dir.path()), &provider)
            .await
            .unwrap();

        assert_eq!(config.core.stack_name, "dev-app");
        assert_eq!(string_var(&config, "greeting"), "hello from app");
        assert_eq!(string_var(&config, "vpc"), "vpc-0abc");
        assert_eq!(string_var(&config, "stack_name"), "dev-app");
        assert_eq!(
            config.param("VpcId"),
            Some(&Value::String(String::from("vpc-0abc")))
        );
        assert_eq!(
            config.param("StackName"),
            Some(&Value::String(String::from("dev-app")))
        );
        assert_eq!(
            config.tags.get("environment"),
            Some(&Value::String(String::from("dev")))
        );
        assert!(config.helpers.contains("cidr"));
        assert_eq!(config.template_source.name, "app-template");
        assert_eq!(config.template_source.version.as_deref(), Some("main"));
        assert_eq!(config.aws.account_id.as_deref(), Some("123456789012"));
    }

    #[tokio::test]
    async fn test_nested_name_flattened_into_stack_name() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "network/vpc.yaml", BASE_CONFIG);

        let provider = provider();
        let config = Config::resolve(request("network/vpc", "dev", dir.path()), &provider)
            .await
            .unwrap();
        assert_eq!(config.core.stack_name, "dev-network-vpc");
    }

    #[tokio::test]
    async fn test_unknown_environment_rejected_up_front() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "app.yaml", BASE_CONFIG);

        let provider = provider();
        let err = Config::resolve(request("app", "staging", dir.path()), &provider)
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("staging"));
        assert!(message.contains("app.yaml"));
    }

    #[tokio::test]
    async fn test_included_environment_outside_allowlist_fails_validation() {
        let dir = TempDir::new().unwrap();
        write_config(
            dir.path(),
            "app.yaml",
            &format!("{BASE_CONFIG}includes: [extras]\n"),
        );
        write_config(
            dir.path(),
            "includes/extras.yaml",
            "environments:\n  staging:\n    vars: {a: 1}\n",
        );

        let provider = provider();
        let err = Config::resolve(request("app", "dev", dir.path()), &provider)
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("includes/extras.yaml"));
        assert!(message.contains("staging"));
    }

    #[tokio::test]
    async fn test_environment_overlay_and_include_precedence() {
        let dir = TempDir::new().unwrap();
        write_config(
            dir.path(),
            "app.yaml",
            concat!(
                "aws:\n",
                "  region: ap-southeast-2\n",
                "  cfn_bucket: deploy-artifacts\n",
                "includes: [defaults]\n",
                "vars:\n",
                "  instance_type: t3.small\n",
                "environments:\n",
                "  dev:\n",
                "  prod:\n",
                "    vars:\n",
                "      instance_type: m5.large\n",
            ),
        );
        write_config(
            dir.path(),
            "includes/defaults.yaml",
            "vars:\n  instance_type: t2.nano\n  retention_days: 14\n",
        );

        let provider = provider();
        let dev = Config::resolve(request("app", "dev", dir.path()), &provider)
            .await
            .unwrap();
        assert_eq!(string_var(&dev, "instance_type"), "t3.small");
        assert_eq!(
            dev.var("retention_days").unwrap().as_data(),
            Some(&serde_yaml::from_str("14").unwrap())
        );

        let provider = StaticStackProvider::new("123456789012");
        let prod = Config::resolve(request("app", "prod", dir.path()), &provider)
            .await
            .unwrap();
        assert_eq!(string_var(&prod, "instance_type"), "m5.large");
    }

    #[tokio::test]
    async fn test_cli_var_override_wins() {
        let dir = TempDir::new().unwrap();
        write_config(
            dir.path(),
            "app.yaml",
            &format!("{BASE_CONFIG}vars:\n  service: from-file\n"),
        );

        let provider = provider();
        let mut req = request("app", "dev", dir.path());
        req.overrides = Overrides::from_cli(&[String::from("service=from-cli")], &[], None).unwrap();

        let config = Config::resolve(req, &provider).await.unwrap();
        assert_eq!(string_var(&config, "service"), "from-cli");
    }

    #[tokio::test]
    async fn test_core_environments_restrict_validation() {
        let dir = TempDir::new().unwrap();
        write_config(
            dir.path(),
            "app.yaml",
            &format!("{BASE_CONFIG}core:\n  environments: [dev]\n"),
        );

        let provider = provider();
        // prod is declared in the root's environments section but excluded
        // by core.environments, so validation fails on the root itself.
        let err = Config::resolve(request("app", "dev", dir.path()), &provider)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("prod"));
    }

    #[tokio::test]
    async fn test_deploy_metadata_and_builtin_seed_vars() {
        let dir = TempDir::new().unwrap();
        write_config(
            dir.path(),
            "app.yaml",
            &format!(
                "{BASE_CONFIG}\
vars:
  deployed_stamp: \"{{{{ deploy.deployed_at }}}}\"
  account: \"{{{{ account_id }}}}\"
  bucket: \"{{{{ cfn_bucket }}}}\"
"
            ),
        );

        let provider = provider();
        let config = Config::resolve(request("app", "dev", dir.path()), &provider)
            .await
            .unwrap();
        assert!(string_var(&config, "deployed_stamp").starts_with("20"));
        assert_eq!(string_var(&config, "account"), "123456789012");
        assert_eq!(string_var(&config, "bucket"), "deploy-artifacts");
    }

    #[tokio::test]
    async fn test_interpolation_failures_reported_as_batch() {
        let dir = TempDir::new().unwrap();
        write_config(
            dir.path(),
            "app.yaml",
            &format!(
                "{BASE_CONFIG}\
vars:
  a: \"{{{{ b }}}}\"
  b: \"{{{{ a }}}}\"
  fine: ok
"
            ),
        );

        let provider = provider();
        let err = Config::resolve(request("app", "dev", dir.path()), &provider)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("2 variable(s) could not be resolved"));
    }

    #[tokio::test]
    async fn test_optional_ref_missing_stack_does_not_abort() {
        let dir = TempDir::new().unwrap();
        write_config(
            dir.path(),
            "app.yaml",
            &format!("{BASE_CONFIG}refs:\n  legacy:\n    optional: true\n"),
        );

        let provider = StaticStackProvider::new("123456789012");
        let config = Config::resolve(request("app", "dev", dir.path()), &provider)
            .await
            .unwrap();
        assert!(config.refs.output("legacy", "VpcId").unwrap().is_none());
    }
}
