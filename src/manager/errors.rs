use crate::config::errors::ValidationError;
use crate::credentials::CredentialError;
use crate::executor::errors::{ExecutorError, StepFailure};
use crate::template::errors::TemplateError;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum ManagerError {
    #[error("{0}")]
    Validation(
        #[source]
        #[from]
        ValidationError,
    ),
    #[error("{0}")]
    Template(
        #[source]
        #[from]
        TemplateError,
    ),
    #[error("{0}")]
    Credential(
        #[source]
        #[from]
        CredentialError,
    ),
    #[error("Deployment failed: {0}")]
    Execution(
        #[source]
        #[from]
        ExecutorError,
    ),
    /// Removal does not roll back, the remaining steps were not run.
    #[error("Removal failed: {0}")]
    Removal(#[source] StepFailure),
}
