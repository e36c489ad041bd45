use super::units::NumberOrString;
use crate::consts::{DEFAULT_RUNTIME, FUNCTION_NAME_MAX_LEN};
use crate::types::{Resource, Trigger};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProviderConfig {
    /// project_id of the Google Cloud project
    pub project_id: String,

    /// location_id is the region functions are deployed to, e.g. `europe-west2`
    pub location_id: String,

    /// storage_url is the bucket holding the function archives, with or without `gs://`
    pub storage_url: String,

    /// runtime of the deployed functions
    #[serde(default = "default_runtime")]
    pub runtime: String,

    #[serde(default)]
    pub package: PackageConfig,

    #[serde(default)]
    pub functions: Vec<FunctionConfig>,
}

fn default_runtime() -> String {
    DEFAULT_RUNTIME.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PackageConfig {
    /// root directory resources are read from, defaults to the working directory
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// resources override the default sources of each function kind
    #[serde(default)]
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FunctionConfig {
    /// name must match `^[A-Za-z][A-Za-z0-9-]{0,139}$`
    pub name: String,

    /// type of the function, `pubsub` or `storage`
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub description: String,

    /// memory_size, e.g. `128MiB`. Must be a multiple of 64 bytes.
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub memory_size: Option<NumberOrString>,

    /// timeout, e.g. `60s`. Bare numbers are seconds.
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub timeout: Option<NumberOrString>,

    #[serde(default)]
    pub service_account_email: String,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub vpc_connector: String,

    #[serde(default)]
    pub maximum_instances: u32,

    pub trigger: Trigger,
}

fn default_enabled() -> bool {
    true
}

/// A function name matching `^[A-Za-z][A-Za-z0-9-]{0,139}$`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionName(String);

impl FunctionName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(name: &str) -> bool {
        let mut chars = name.chars();
        let Some(first) = chars.next() else {
            return false;
        };

        first.is_ascii_alphabetic()
            && name.len() <= FUNCTION_NAME_MAX_LEN
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
    }
}

impl TryFrom<&str> for FunctionName {
    type Error = super::errors::ValidationError;

    fn try_from(name: &str) -> Result<Self, Self::Error> {
        if !Self::is_valid(name) {
            return Err(super::errors::ValidationError::InvalidName(
                name.to_string(),
            ));
        }
        Ok(Self(name.to_string()))
    }
}

impl std::fmt::Display for FunctionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        for name in ["a", "fn", "my-function", "Fn2", "A-1-b"] {
            assert!(FunctionName::try_from(name).is_ok(), "{name} should be valid");
        }

        let longest = format!("a{}", "b".repeat(139));
        assert!(FunctionName::try_from(longest.as_str()).is_ok());
    }

    #[test]
    fn invalid_names() {
        let too_long = format!("a{}", "b".repeat(140));
        for name in ["", "my_function", "1fn", "-fn", "fn.name", "fn name", too_long.as_str()] {
            assert!(
                FunctionName::try_from(name).is_err(),
                "{name} should be invalid"
            );
        }
    }
}
