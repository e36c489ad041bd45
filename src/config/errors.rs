use super::units::UnitError;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(#[source] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Validation(
        #[source]
        #[from]
        ValidationError,
    ),
}

#[derive(ThisError, Debug)]
pub enum ValidationError {
    #[error(
        "invalid name: '{0}', name must match [a-zA-Z0-9-] and be at most 140 characters"
    )]
    InvalidName(String),
    #[error("function name '{0}' already exist, name must be unique")]
    DuplicateName(String),
    #[error("provider field '{0}' is required")]
    MissingProviderField(&'static str),
    #[error("function '{name}': invalid memory_size: {error}")]
    MemorySize {
        name: String,
        #[source]
        error: UnitError,
    },
    #[error("function '{name}': invalid timeout: {error}")]
    Timeout {
        name: String,
        #[source]
        error: UnitError,
    },
    #[error("function '{name}': timeout must be positive")]
    NonPositiveTimeout { name: String },
    #[error("function '{name}': trigger field '{field}' is required")]
    MissingTriggerField { name: String, field: &'static str },
}
