pub mod defs;
pub mod errors;
pub mod units;

use crate::consts::STORAGE_URL_SCHEME;
use crate::types::{FunctionSpecification, ProviderContext};
use crate::util::remove_trailling_slash;
use defs::{Config, FunctionConfig, FunctionName, PackageConfig, ProviderConfig};
use errors::{ConfigError, ValidationError};
use itertools::Itertools;
use std::time::Duration;

/// Configuration that passed validation. Built once at startup and handed to the components.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub provider: ProviderContext,
    pub package: PackageConfig,
    pub functions: Vec<FunctionEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionEntry {
    pub name: FunctionName,
    /// kind as written in the configuration, unknown kinds are kept as is
    pub kind: String,
    pub enabled: bool,
    pub specification: FunctionSpecification,
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> Result<ValidatedConfig, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml).map_err(ConfigError::Parse)?;
        Ok(config.validate()?)
    }

    pub fn validate(self) -> Result<ValidatedConfig, ValidationError> {
        let provider = self.provider.to_provider_context()?;

        let functions = self
            .provider
            .functions
            .iter()
            .map(FunctionConfig::to_entry)
            .collect::<Result<Vec<_>, _>>()?;

        validate_unique_names(&functions)?;

        Ok(ValidatedConfig {
            provider,
            package: self.provider.package,
            functions,
        })
    }

    pub fn json_schema() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&schemars::schema_for!(Config))
    }
}

/// Enforces that enabled function names are unique. Disabled functions may share a name.
fn validate_unique_names(functions: &[FunctionEntry]) -> Result<(), ValidationError> {
    if let Some(name) = functions
        .iter()
        .filter(|function| function.enabled)
        .map(|function| &function.name)
        .duplicates()
        .next()
    {
        return Err(ValidationError::DuplicateName(name.to_string()));
    }

    Ok(())
}

impl ProviderConfig {
    fn to_provider_context(&self) -> Result<ProviderContext, ValidationError> {
        let project_id = self.project_id.trim();
        if project_id.is_empty() {
            return Err(ValidationError::MissingProviderField("project_id"));
        }

        let location = self.location_id.trim();
        if location.is_empty() {
            return Err(ValidationError::MissingProviderField("location_id"));
        }

        let storage_url = self.storage_url.trim();
        let bucket = remove_trailling_slash(
            storage_url
                .strip_prefix(STORAGE_URL_SCHEME)
                .unwrap_or(storage_url),
        );
        if bucket.is_empty() {
            return Err(ValidationError::MissingProviderField("storage_url"));
        }

        Ok(ProviderContext::new(project_id, location, bucket).with_runtime(self.runtime.trim()))
    }
}

impl FunctionConfig {
    fn to_entry(&self) -> Result<FunctionEntry, ValidationError> {
        Ok(FunctionEntry {
            name: FunctionName::try_from(self.name.as_str())?,
            kind: self.kind.clone(),
            enabled: self.enabled,
            specification: self.to_specification()?,
        })
    }

    pub fn to_specification(&self) -> Result<FunctionSpecification, ValidationError> {
        let name = &self.name;

        let memory_size = match self.memory_size {
            Some(ref value) => units::MemSizeFactor64::unpack(value)
                .map_err(|error| ValidationError::MemorySize {
                    name: name.clone(),
                    error,
                })?
                .bytes(),
            None => 0,
        };

        let timeout = match self.timeout {
            Some(ref value) => {
                let timeout =
                    units::unpack_duration(value).map_err(|error| ValidationError::Timeout {
                        name: name.clone(),
                        error,
                    })?;
                if timeout == Duration::ZERO {
                    return Err(ValidationError::NonPositiveTimeout { name: name.clone() });
                }
                timeout
            }
            None => Duration::ZERO,
        };

        let trigger = &self.trigger;
        for (field, value) in [
            ("event_type", &trigger.event_type),
            ("resource", &trigger.resource),
            ("service", &trigger.service),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingTriggerField {
                    name: name.clone(),
                    field,
                });
            }
        }

        Ok(FunctionSpecification {
            description: self.description.clone(),
            memory_size,
            timeout,
            service_account: self.service_account_email.clone(),
            labels: self.labels.clone(),
            max_instances: self.maximum_instances,
            vpc_connector: self.vpc_connector.clone(),
            trigger: trigger.clone(),
        })
    }
}
