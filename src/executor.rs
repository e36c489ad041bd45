//! Sequential execution of reversible operations.
//!
//! Operations run strictly in the order they were added. The first failure stops the run and
//! the operations that completed are rolled back in reverse order, each at most once.

pub mod errors;

use crate::credentials::Credential;
use async_trait::async_trait;
use errors::{ExecutorError, OperationError, RollbackFailure, StepFailure};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{trace_span, Instrument};

/// One reversible provisioning step.
#[async_trait]
pub trait Operation: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &'static str;

    async fn execute(&self, context: &ExecutionContext) -> Result<(), OperationError>;

    /// Undoes the remote effect of a successful [`Operation::execute`].
    async fn rollback(&self, context: &ExecutionContext) -> Result<(), OperationError>;

    /// Cleans up after an [`Operation::execute`] that failed or was interrupted.
    ///
    /// Only called for the failing step, which is never rolled back.
    async fn abort(&self, _context: &ExecutionContext) -> Result<(), OperationError> {
        Ok(())
    }
}

/// Shared by every operation of one run.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    credential: Credential,
    cancellation: CancellationToken,
    step_timeout: Option<Duration>,
    poll_interval: Duration,
}

impl ExecutionContext {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            cancellation: CancellationToken::new(),
            step_timeout: None,
            poll_interval: Duration::from_secs(crate::consts::DEFAULT_POLL_INTERVAL_SECS),
        }
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn with_step_timeout(mut self, step_timeout: Option<Duration>) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Sleeps for the poll interval, failing early if the run is cancelled.
    pub async fn wait_poll_interval(&self) -> Result<(), OperationError> {
        tokio::select! {
            _ = self.cancellation.cancelled() => Err(OperationError::Cancelled),
            _ = tokio::time::sleep(self.poll_interval) => Ok(()),
        }
    }

    async fn with_timeout<F>(&self, future: F) -> Result<(), OperationError>
    where
        F: Future<Output = Result<(), OperationError>>,
    {
        match self.step_timeout {
            Some(timeout) => tokio::time::timeout(timeout, future)
                .await
                .unwrap_or(Err(OperationError::TimedOut(timeout))),
            None => future.await,
        }
    }
}

/// Aborts a step that started and failed, keeping its error.
///
/// Not gated by cancellation, the step may have been interrupted by it.
async fn abort(
    operation: &dyn Operation,
    step: usize,
    context: &ExecutionContext,
    error: OperationError,
) -> OperationError {
    match context.with_timeout(operation.abort(context)).await {
        Ok(()) => error,
        Err(cleanup) => {
            tracing::error!(
                step,
                operation = operation.name(),
                error = %cleanup,
                "Cleaning up the failed operation failed."
            );
            OperationError::LeftBehind {
                cause: Box::new(error),
                cleanup: Box::new(cleanup),
            }
        }
    }
}

/// Runs operations in order and rolls back the completed ones on failure.
///
/// Built fresh for every run, it keeps no state between runs.
#[derive(Default)]
pub struct Executor {
    operations: Vec<Box<dyn Operation>>,
    /// Indices of the operations that completed, in completion order.
    completed: Vec<usize>,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, operation: impl Operation + 'static) {
        self.operations.push(Box::new(operation));
    }

    /// Runs the pending operations in insertion order, stopping at the first failure.
    ///
    /// The failing operation is not recorded as completed, it is aborted instead. Cancellation
    /// or a step timeout count as a failure of the running step.
    pub async fn execute(&mut self, context: &ExecutionContext) -> Result<(), StepFailure> {
        let total = self.operations.len();

        for index in self.completed.len()..total {
            let operation = &self.operations[index];
            let step = index + 1;
            let name = operation.name();

            tracing::info!(step, total, operation = name, "Executing operation.");

            let result = if context.cancellation.is_cancelled() {
                Err(OperationError::Cancelled)
            } else {
                let execute = context.with_timeout(operation.execute(context));
                let result = tokio::select! {
                    biased;
                    _ = context.cancellation.cancelled() => Err(OperationError::Cancelled),
                    result = execute => result,
                };
                match result {
                    Ok(()) => Ok(()),
                    Err(error) => Err(abort(&**operation, step, context, error).await),
                }
            };

            if let Err(error) = result {
                tracing::error!(step, operation = name, %error, "Operation failed.");
                return Err(StepFailure {
                    step,
                    operation: name,
                    error,
                });
            }

            tracing::info!(step, operation = name, "Operation succeeded.");
            self.completed.push(index);
        }

        Ok(())
    }

    /// Rolls back every completed operation in reverse order.
    ///
    /// A failing rollback does not stop the remaining ones, all failures are reported together.
    /// Rollback ignores cancellation, it is what cleans up after a cancelled run.
    pub async fn rollback(&mut self, context: &ExecutionContext) -> Result<(), RollbackFailure> {
        let mut failures = Vec::new();

        while let Some(index) = self.completed.pop() {
            let operation = &self.operations[index];
            let step = index + 1;
            let name = operation.name();

            tracing::info!(step, operation = name, "Rolling back operation.");

            match context.with_timeout(operation.rollback(context)).await {
                Ok(()) => tracing::info!(step, operation = name, "Operation rolled back."),
                Err(error) => {
                    tracing::error!(step, operation = name, %error, "Rollback failed.");
                    failures.push(StepFailure {
                        step,
                        operation: name,
                        error,
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(RollbackFailure { failures })
        }
    }

    /// Executes and, on failure, rolls back. The original failure is always kept.
    pub async fn run(&mut self, context: &ExecutionContext) -> Result<(), ExecutorError> {
        let cause = match self
            .execute(context)
            .instrument(trace_span!("Execute"))
            .await
        {
            Ok(()) => return Ok(()),
            Err(cause) => cause,
        };

        match self
            .rollback(context)
            .instrument(trace_span!("Rollback"))
            .await
        {
            Ok(()) => Err(ExecutorError::Operation(cause)),
            Err(rollback) => Err(ExecutorError::Rollback { cause, rollback }),
        }
    }
}
