//! Cloud Deployment Manager configuration for a function.
//!
//! Shares the function model with the REST payload, but follows the shape of the
//! `cloudfunctions-v1` type provider: the function lives under `properties.function` and its
//! parent location is given separately.

use super::errors::TemplateError;
use super::{find_function, TemplateRenderer};
use crate::consts::{CLOUD_FUNCTIONS_TYPE, ENABLED_FUNCTIONS_ENV_VAR};
use crate::config::units::format_seconds;
use crate::registry::{ConfiguredFunction, FunctionRegistry};
use crate::types::{ProviderContext, Trigger};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

const BYTES_PER_MEGABYTE: u64 = 1024 * 1024;

/// Sizes below one megabyte still ask for memory, so partial megabytes count as whole ones.
fn megabytes_rounded_up(bytes: u64) -> u64 {
    (bytes + BYTES_PER_MEGABYTE - 1) / BYTES_PER_MEGABYTE
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentConfig {
    pub resources: Vec<DeploymentResource>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentResource {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: FunctionProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionProperties {
    /// parent is the location, `projects/*/locations/*`
    pub parent: String,
    /// function is the short function name
    pub function: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub entry_point: String,
    pub runtime: String,
    pub source_archive_url: String,
    pub event_trigger: Trigger,
    pub environment_variables: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_memory_mb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_email: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_instances: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_connector: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

pub struct DeploymentManagerTemplateBuilder {
    provider: Arc<ProviderContext>,
    registry: Arc<dyn FunctionRegistry>,
}

impl DeploymentManagerTemplateBuilder {
    pub fn new(provider: Arc<ProviderContext>, registry: Arc<dyn FunctionRegistry>) -> Self {
        Self { provider, registry }
    }

    pub fn to_config(&self, function: &ConfiguredFunction) -> DeploymentConfig {
        let name = function.name.as_str();
        let specification = &function.specification;

        let properties = FunctionProperties {
            parent: self.provider.location_name(),
            function: name.to_string(),
            description: specification.description.clone(),
            entry_point: function.kind.entry_point().to_string(),
            runtime: self.provider.runtime.clone(),
            source_archive_url: self.provider.source_archive_url(name),
            event_trigger: specification.trigger.clone(),
            environment_variables: [(ENABLED_FUNCTIONS_ENV_VAR.to_string(), name.to_string())]
                .into(),
            timeout: (!specification.timeout.is_zero())
                .then(|| format_seconds(specification.timeout)),
            available_memory_mb: (specification.memory_size > 0)
                .then(|| megabytes_rounded_up(specification.memory_size)),
            service_account_email: non_empty(&specification.service_account),
            labels: specification.labels.clone(),
            max_instances: Some(specification.max_instances).filter(|max| *max > 0),
            vpc_connector: non_empty(&specification.vpc_connector),
        };

        DeploymentConfig {
            resources: vec![DeploymentResource {
                name: name.to_string(),
                kind: CLOUD_FUNCTIONS_TYPE.to_string(),
                properties,
            }],
        }
    }
}

impl TemplateRenderer for DeploymentManagerTemplateBuilder {
    /// The configuration as YAML, ready for `gcloud deployment-manager deployments create`.
    fn raw_template(&self, name: &str) -> Result<String, TemplateError> {
        let function = find_function(&*self.registry, name)?;
        Ok(serde_yaml::to_string(&self.to_config(function))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defs::FunctionName;
    use crate::registry::{ConfigRegistry, RegisteredFunction};
    use crate::test_utils::{provider, pubsub_specification};
    use crate::types::{FunctionKind, FunctionSpecification};
    use std::time::Duration;

    fn builder(specification: FunctionSpecification) -> DeploymentManagerTemplateBuilder {
        let function = RegisteredFunction::Configured(ConfiguredFunction {
            name: FunctionName::try_from("fn").unwrap(),
            kind: FunctionKind::PubSub,
            specification,
        });
        DeploymentManagerTemplateBuilder::new(
            Arc::new(provider()),
            Arc::new(ConfigRegistry::new(vec![function])),
        )
    }

    #[test]
    fn renders_minimal_function() {
        let yaml = builder(pubsub_specification()).raw_template("fn").unwrap();

        let expected = "\
resources:
- name: fn
  type: gcp-types/cloudfunctions-v1:projects.locations.functions
  properties:
    parent: projects/my-project/locations/europe-west2
    function: fn
    entryPoint: RunPubSub
    runtime: go121
    sourceArchiveUrl: gs://my-bucket/fn.zip
    eventTrigger:
      eventType: google.pubsub.topic.publish
      resource: projects/my-project/topics/my-topic
      service: pubsub.googleapis.com
    environmentVariables:
      ENABLED_FUNCTIONS: fn
";
        let rendered: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        let expected: serde_yaml::Value = serde_yaml::from_str(expected).unwrap();
        assert_eq!(rendered, expected);
    }

    #[test]
    fn renders_optional_fields_when_set() {
        let yaml = builder(FunctionSpecification {
            timeout: Duration::from_secs(90),
            memory_size: 256 * BYTES_PER_MEGABYTE,
            max_instances: 2,
            ..pubsub_specification()
        })
        .raw_template("fn")
        .unwrap();

        let rendered: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        let properties = &rendered["resources"][0]["properties"];

        assert_eq!(properties["timeout"].as_str(), Some("90s"));
        assert_eq!(properties["availableMemoryMb"].as_u64(), Some(256));
        assert_eq!(properties["maxInstances"].as_u64(), Some(2));
        assert!(properties.get("vpcConnector").is_none(), "{yaml}");
    }

    #[test]
    fn partial_megabytes_round_up() {
        for (memory_size, expected) in [
            (64, 1),
            (BYTES_PER_MEGABYTE + 64, 2),
            (128 * BYTES_PER_MEGABYTE, 128),
        ] {
            let yaml = builder(FunctionSpecification {
                memory_size,
                ..pubsub_specification()
            })
            .raw_template("fn")
            .unwrap();

            let rendered: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
            assert_eq!(
                rendered["resources"][0]["properties"]["availableMemoryMb"].as_u64(),
                Some(expected),
                "{memory_size} bytes"
            );
        }
    }

    #[test]
    fn unknown_function_is_not_found() {
        assert!(matches!(
            builder(pubsub_specification()).raw_template("other"),
            Err(TemplateError::NotFound(_))
        ));
    }
}
