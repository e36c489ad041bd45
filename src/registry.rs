//! Lookup of the functions declared for a provider.
//!
//! Entries are resolved into a tagged variant when the registry is built, so callers never
//! have to inspect an entry for the configuration it carries.

use crate::config::{defs::FunctionName, FunctionEntry, ValidatedConfig};
use crate::types::{FunctionKind, FunctionSpecification};

/// A function that can be packaged and deployed by this provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfiguredFunction {
    pub name: FunctionName,
    pub kind: FunctionKind,
    pub specification: FunctionSpecification,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisteredFunction {
    Configured(ConfiguredFunction),
    /// Declared with a kind this provider cannot deploy.
    Unsupported { name: FunctionName, kind: String },
}

impl RegisteredFunction {
    pub fn name(&self) -> &FunctionName {
        match self {
            RegisteredFunction::Configured(function) => &function.name,
            RegisteredFunction::Unsupported { name, .. } => name,
        }
    }
}

impl From<&FunctionEntry> for RegisteredFunction {
    fn from(entry: &FunctionEntry) -> Self {
        match FunctionKind::from_type(&entry.kind) {
            Some(kind) => RegisteredFunction::Configured(ConfiguredFunction {
                name: entry.name.clone(),
                kind,
                specification: entry.specification.clone(),
            }),
            None => RegisteredFunction::Unsupported {
                name: entry.name.clone(),
                kind: entry.kind.clone(),
            },
        }
    }
}

pub trait FunctionRegistry: Send + Sync {
    /// Finds an enabled function by name.
    fn find_function(&self, name: &str) -> Option<&RegisteredFunction>;
}

/// Registry holding the enabled functions of a validated configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigRegistry {
    functions: Vec<RegisteredFunction>,
}

impl ConfigRegistry {
    pub fn new(functions: Vec<RegisteredFunction>) -> Self {
        Self { functions }
    }

    pub fn functions(&self) -> &[RegisteredFunction] {
        &self.functions
    }
}

impl From<&ValidatedConfig> for ConfigRegistry {
    fn from(config: &ValidatedConfig) -> Self {
        let functions = config
            .functions
            .iter()
            .filter(|entry| entry.enabled)
            .map(RegisteredFunction::from)
            .collect();

        Self::new(functions)
    }
}

impl FunctionRegistry for ConfigRegistry {
    fn find_function(&self, name: &str) -> Option<&RegisteredFunction> {
        self.functions
            .iter()
            .find(|function| function.name().as_str() == name)
    }
}
