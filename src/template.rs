//! Turns a registered function into what gets sent to the cloud.

pub mod deployment_manager;
pub mod errors;
pub mod package;

use crate::config::units::format_seconds;
use crate::consts::ENABLED_FUNCTIONS_ENV_VAR;
use crate::registry::{ConfiguredFunction, FunctionRegistry, RegisteredFunction};
use crate::request::functions::RequestPayload;
use crate::types::{Artifact, ProviderContext};
use errors::TemplateError;
use package::Packager;
use serde_json::json;
use std::sync::Arc;

/// Renders the deployable form of a function as text, without side effects.
pub trait TemplateRenderer: Send + Sync {
    fn raw_template(&self, name: &str) -> Result<String, TemplateError>;
}

/// Looks up a function that carries a deployable configuration.
pub(crate) fn find_function<'a>(
    registry: &'a dyn FunctionRegistry,
    name: &str,
) -> Result<&'a ConfiguredFunction, TemplateError> {
    match registry.find_function(name) {
        Some(RegisteredFunction::Configured(function)) => Ok(function),
        Some(RegisteredFunction::Unsupported { name, kind }) => {
            Err(TemplateError::CapabilityMismatch {
                name: name.to_string(),
                kind: kind.clone(),
            })
        }
        None => Err(TemplateError::NotFound(name.to_string())),
    }
}

/// The archive and the request body of one deployment.
#[derive(Debug, Clone)]
pub struct FunctionData {
    pub artifact: Artifact,
    pub payload: RequestPayload,
}

/// Builds Cloud Functions REST API payloads.
pub struct TemplateBuilder {
    provider: Arc<ProviderContext>,
    registry: Arc<dyn FunctionRegistry>,
    packager: Arc<dyn Packager>,
}

impl TemplateBuilder {
    pub fn new(
        provider: Arc<ProviderContext>,
        registry: Arc<dyn FunctionRegistry>,
        packager: Arc<dyn Packager>,
    ) -> Self {
        Self {
            provider,
            registry,
            packager,
        }
    }

    /// Packages the function sources and builds the request body.
    pub async fn build(&self, name: &str) -> Result<FunctionData, TemplateError> {
        let function = find_function(&*self.registry, name)?;

        let bytes = self.packager.package(function).await?;
        let artifact = Artifact {
            key: self.provider.artifact_key(function.name.as_str()),
            bytes,
        };

        Ok(FunctionData {
            artifact,
            payload: self.request_payload(function),
        })
    }

    /// Fields left at their zero value are not sent, the API rejects some of them.
    pub fn request_payload(&self, function: &ConfiguredFunction) -> RequestPayload {
        let name = function.name.as_str();
        let specification = &function.specification;

        let mut payload = RequestPayload::new();
        payload.insert("name", self.provider.function_name(name));
        payload.insert("description", specification.description.as_str());
        payload.insert("entryPoint", function.kind.entry_point());
        payload.insert("runtime", self.provider.runtime.as_str());
        payload.insert("sourceArchiveUrl", self.provider.source_archive_url(name));
        payload.insert("eventTrigger", json!(specification.trigger));
        payload.insert(
            "environmentVariables",
            json!({ (ENABLED_FUNCTIONS_ENV_VAR): name }),
        );

        if !specification.timeout.is_zero() {
            payload.insert("timeout", format_seconds(specification.timeout));
        }
        if specification.memory_size > 0 {
            payload.insert("memorySize", specification.memory_size);
        }
        if !specification.service_account.is_empty() {
            payload.insert(
                "serviceAccountEmail",
                specification.service_account.as_str(),
            );
        }
        if !specification.labels.is_empty() {
            payload.insert("labels", json!(specification.labels));
        }
        if specification.max_instances > 0 {
            payload.insert("maxInstances", specification.max_instances);
        }
        if !specification.vpc_connector.is_empty() {
            payload.insert("vpcConnector", specification.vpc_connector.as_str());
        }

        payload
    }
}

impl TemplateRenderer for TemplateBuilder {
    /// The request body as pretty printed JSON. Nothing is packaged.
    fn raw_template(&self, name: &str) -> Result<String, TemplateError> {
        let function = find_function(&*self.registry, name)?;
        Ok(self.request_payload(function).to_pretty_string()?)
    }
}
