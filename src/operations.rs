//! Provisioning steps run by the [`Executor`](crate::executor::Executor).

mod artifact;
mod bucket;
mod function;

pub use artifact::{DeleteArtifact, UploadArtifact};
pub use bucket::EnsureStorageBucket;
pub use function::{CreateFunction, DeleteFunction, UpdateFunction};

use crate::client::FunctionsApi;
use crate::executor::{errors::OperationError, ExecutionContext};
use crate::request::functions::LongRunningOperation;

/// How a wait reacts to the run being cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wait {
    /// Give up with [`OperationError::Cancelled`].
    Cancellable,
    /// Keep polling. Rollbacks wait like this.
    UntilDone,
}

/// Polls a long-running operation until it is done.
async fn wait_for_operation(
    functions: &dyn FunctionsApi,
    context: &ExecutionContext,
    mut operation: LongRunningOperation,
    wait: Wait,
) -> Result<(), OperationError> {
    while !operation.done {
        tracing::debug!(operation = %operation.name, "Waiting for remote operation.");

        match wait {
            Wait::Cancellable => context.wait_poll_interval().await?,
            Wait::UntilDone => tokio::time::sleep(context.poll_interval()).await,
        }

        operation = functions
            .get_operation(context.credential(), &operation.name)
            .await?;
    }

    match operation.error {
        Some(status) => Err(OperationError::Remote {
            name: operation.name,
            message: status.message,
        }),
        None => Ok(()),
    }
}
