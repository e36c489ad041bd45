use super::package::PackageError;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum TemplateError {
    #[error("Function {0} not found or not enabled")]
    NotFound(String),
    #[error("Function {name} has type {kind}, which cannot be deployed to Google Cloud Functions")]
    CapabilityMismatch { name: String, kind: String },
    #[error("Failed to package function: {0}")]
    Package(
        #[source]
        #[from]
        PackageError,
    ),
    #[error("Failed to render json template: {0}")]
    Json(
        #[source]
        #[from]
        serde_json::Error,
    ),
    #[error("Failed to render yaml template: {0}")]
    Yaml(
        #[source]
        #[from]
        serde_yaml::Error,
    ),
}
