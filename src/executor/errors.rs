use crate::client::ApiError;
use itertools::Itertools;
use std::time::Duration;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum OperationError {
    #[error("Api error: {0}")]
    Api(
        #[source]
        #[from]
        ApiError,
    ),
    #[error("Remote operation {name} failed: {message}")]
    Remote { name: String, message: String },
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Operation timed out after {0:?}")]
    TimedOut(Duration),
    #[error("Request for {0} was interrupted before the API answered, its outcome is unknown")]
    Interrupted(String),
    /// The step failed after changing remote state and undoing that change failed too.
    #[error(
        "{cause}, cleaning up failed: {cleanup}. Remote resources may be left behind and need manual inspection"
    )]
    LeftBehind {
        #[source]
        cause: Box<OperationError>,
        cleanup: Box<OperationError>,
    },
}

/// A failed step, numbered from 1 in execution order.
#[derive(ThisError, Debug)]
#[error("step {step} ({operation}) failed: {error}")]
pub struct StepFailure {
    pub step: usize,
    pub operation: &'static str,
    #[source]
    pub error: OperationError,
}

/// Every rollback step that failed, in the order rollback ran them.
#[derive(ThisError, Debug)]
#[error("rollback failed: {}", .failures.iter().join(", "))]
pub struct RollbackFailure {
    pub failures: Vec<StepFailure>,
}

#[derive(ThisError, Debug)]
pub enum ExecutorError {
    /// A step failed and every completed step was rolled back.
    #[error("{0}")]
    Operation(#[source] StepFailure),
    /// A step failed and rolling back the completed steps failed too.
    /// Remote state is left partially provisioned.
    #[error(
        "{cause}, could not rollback: {rollback}. Remote resources may be left behind and need manual inspection"
    )]
    Rollback {
        #[source]
        cause: StepFailure,
        rollback: RollbackFailure,
    },
}

impl ExecutorError {
    /// Whether remote state may be left partially provisioned.
    pub fn needs_inspection(&self) -> bool {
        match self {
            ExecutorError::Operation(cause) => {
                matches!(cause.error, OperationError::LeftBehind { .. })
            }
            ExecutorError::Rollback { .. } => true,
        }
    }

    /// The step failure that started the rollback.
    pub fn cause(&self) -> &StepFailure {
        match self {
            ExecutorError::Operation(cause) => cause,
            ExecutorError::Rollback { cause, .. } => cause,
        }
    }
}
