use super::{wait_for_operation, Wait};
use crate::client::{ApiError, FunctionsApi};
use crate::executor::{errors::OperationError, ExecutionContext, Operation};
use crate::request::functions::{LongRunningOperation, RequestPayload};
use async_trait::async_trait;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

/// Fields of a fetched function that can be sent back in an update.
///
/// Output-only fields like `status` or `updateTime` are rejected by the API.
const RESTORABLE_FIELDS: [&str; 16] = [
    "name",
    "description",
    "entryPoint",
    "runtime",
    "timeout",
    "availableMemoryMb",
    "memorySize",
    "serviceAccountEmail",
    "labels",
    "environmentVariables",
    "maxInstances",
    "vpcConnector",
    "sourceArchiveUrl",
    "sourceUploadUrl",
    "eventTrigger",
    "httpsTrigger",
];

/// Deletes a function, treating an already absent one as deleted.
async fn delete_function(
    functions: &dyn FunctionsApi,
    context: &ExecutionContext,
    name: &str,
    wait: Wait,
) -> Result<(), OperationError> {
    match functions.delete_function(context.credential(), name).await {
        Ok(operation) => wait_for_operation(functions, context, operation, wait).await,
        Err(ApiError::NotFound) => {
            tracing::debug!(%name, "Function already absent.");
            Ok(())
        }
        Err(error) => Err(error.into()),
    }
}

fn function_name(payload: &RequestPayload) -> &str {
    payload.function_name().unwrap_or_default()
}

/// How far the request of a step got.
#[derive(Debug, Default)]
enum Progress {
    #[default]
    Idle,
    /// Sent, the answer never arrived.
    Requested,
    Accepted(LongRunningOperation),
}

struct Tracker(Mutex<Progress>);

impl Tracker {
    fn new() -> Self {
        Self(Mutex::new(Progress::Idle))
    }

    fn set(&self, progress: Progress) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = progress;
    }

    fn take(&self) -> Progress {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Sends the request, keeping track of whether the API accepted it.
async fn send<F>(tracker: &Tracker, request: F) -> Result<LongRunningOperation, OperationError>
where
    F: Future<Output = Result<LongRunningOperation, ApiError>>,
{
    tracker.set(Progress::Requested);
    match request.await {
        Ok(operation) => {
            tracker.set(Progress::Accepted(operation.clone()));
            Ok(operation)
        }
        Err(error) => {
            tracker.set(Progress::Idle);
            Err(error.into())
        }
    }
}

/// Lets an accepted operation finish. Its own outcome is already reported by the step.
async fn settle(
    functions: &dyn FunctionsApi,
    context: &ExecutionContext,
    operation: LongRunningOperation,
) {
    let refreshed = match functions
        .get_operation(context.credential(), &operation.name)
        .await
    {
        Ok(refreshed) => refreshed,
        Err(error) => {
            tracing::warn!(
                operation = %operation.name,
                %error,
                "Failed to refresh remote operation."
            );
            return;
        }
    };

    if let Err(error) = wait_for_operation(functions, context, refreshed, Wait::UntilDone).await {
        tracing::debug!(operation = %operation.name, %error, "Remote operation settled.");
    }
}

/// Creates the function from a built request payload.
pub struct CreateFunction {
    functions: Arc<dyn FunctionsApi>,
    /// location is the parent of the function, `projects/*/locations/*`
    location: String,
    payload: RequestPayload,
    progress: Tracker,
}

impl CreateFunction {
    pub fn new(
        functions: Arc<dyn FunctionsApi>,
        location: impl Into<String>,
        payload: RequestPayload,
    ) -> Self {
        Self {
            functions,
            location: location.into(),
            payload,
            progress: Tracker::new(),
        }
    }
}

#[async_trait]
impl Operation for CreateFunction {
    fn name(&self) -> &'static str {
        "create-function"
    }

    async fn execute(&self, context: &ExecutionContext) -> Result<(), OperationError> {
        tracing::info!(name = %function_name(&self.payload), "Creating function.");

        let request = self.functions.create_function(
            context.credential(),
            &self.location,
            &self.payload,
        );
        let operation = send(&self.progress, request).await?;

        wait_for_operation(&*self.functions, context, operation, Wait::Cancellable).await
    }

    async fn rollback(&self, context: &ExecutionContext) -> Result<(), OperationError> {
        let name = function_name(&self.payload);
        tracing::info!(%name, "Deleting created function.");

        delete_function(&*self.functions, context, name, Wait::UntilDone).await
    }

    /// Deletes the function if the create was accepted.
    async fn abort(&self, context: &ExecutionContext) -> Result<(), OperationError> {
        let name = function_name(&self.payload);

        match self.progress.take() {
            Progress::Idle => Ok(()),
            Progress::Requested => {
                // An existing function may be ours or may have been there before.
                match self.functions.get_function(context.credential(), name).await? {
                    None => Ok(()),
                    Some(_) => Err(OperationError::Interrupted(name.to_string())),
                }
            }
            Progress::Accepted(operation) => {
                tracing::info!(%name, "Deleting function of the failed create.");
                settle(&*self.functions, context, operation).await;
                delete_function(&*self.functions, context, name, Wait::UntilDone).await
            }
        }
    }
}

/// Replaces an existing function with a built request payload.
///
/// The remote function is fetched first and patched back on rollback.
pub struct UpdateFunction {
    functions: Arc<dyn FunctionsApi>,
    payload: RequestPayload,
    snapshot: Mutex<Option<RequestPayload>>,
    progress: Tracker,
}

impl UpdateFunction {
    pub fn new(functions: Arc<dyn FunctionsApi>, payload: RequestPayload) -> Self {
        Self {
            functions,
            payload,
            snapshot: Mutex::new(None),
            progress: Tracker::new(),
        }
    }

    fn take_snapshot(&self) -> Option<RequestPayload> {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    async fn restore(
        &self,
        context: &ExecutionContext,
        snapshot: RequestPayload,
    ) -> Result<(), OperationError> {
        let name = function_name(&self.payload);
        tracing::info!(%name, "Restoring previous function.");

        let operation = self
            .functions
            .update_function(context.credential(), name, &snapshot)
            .await?;

        wait_for_operation(&*self.functions, context, operation, Wait::UntilDone).await
    }

    fn restorable(current: &RequestPayload) -> RequestPayload {
        let mut snapshot = RequestPayload::new();
        for field in RESTORABLE_FIELDS {
            if let Some(value) = current.get(field) {
                snapshot.insert(field, value.clone());
            }
        }
        snapshot
    }
}

#[async_trait]
impl Operation for UpdateFunction {
    fn name(&self) -> &'static str {
        "update-function"
    }

    async fn execute(&self, context: &ExecutionContext) -> Result<(), OperationError> {
        let name = function_name(&self.payload);

        let current = self
            .functions
            .get_function(context.credential(), name)
            .await?
            .ok_or(ApiError::NotFound)?;
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Self::restorable(&current));

        tracing::info!(%name, "Updating function.");
        let request = self
            .functions
            .update_function(context.credential(), name, &self.payload);
        let operation = send(&self.progress, request).await?;

        wait_for_operation(&*self.functions, context, operation, Wait::Cancellable).await
    }

    async fn rollback(&self, context: &ExecutionContext) -> Result<(), OperationError> {
        match self.take_snapshot() {
            Some(snapshot) => self.restore(context, snapshot).await,
            None => Ok(()),
        }
    }

    /// Puts the snapshot back if the update may have been applied.
    async fn abort(&self, context: &ExecutionContext) -> Result<(), OperationError> {
        match self.progress.take() {
            Progress::Idle => return Ok(()),
            Progress::Requested => {}
            Progress::Accepted(operation) => settle(&*self.functions, context, operation).await,
        }

        match self.take_snapshot() {
            Some(snapshot) => self.restore(context, snapshot).await,
            None => Ok(()),
        }
    }
}

/// Deletes a deployed function. Deleting is terminal, there is nothing to roll back.
pub struct DeleteFunction {
    functions: Arc<dyn FunctionsApi>,
    /// name is the full function name, `projects/*/locations/*/functions/*`
    name: String,
}

impl DeleteFunction {
    pub fn new(functions: Arc<dyn FunctionsApi>, name: impl Into<String>) -> Self {
        Self {
            functions,
            name: name.into(),
        }
    }
}

#[async_trait]
impl Operation for DeleteFunction {
    fn name(&self) -> &'static str {
        "delete-function"
    }

    async fn execute(&self, context: &ExecutionContext) -> Result<(), OperationError> {
        tracing::info!(name = %self.name, "Deleting function.");
        delete_function(&*self.functions, context, &self.name, Wait::Cancellable).await
    }

    async fn rollback(&self, _context: &ExecutionContext) -> Result<(), OperationError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{credential, FakeFunctions};
    use serde_json::json;
    use std::time::Duration;

    const NAME: &str = "projects/my-project/locations/europe-west2/functions/fn";
    const LOCATION: &str = "projects/my-project/locations/europe-west2";

    fn context() -> ExecutionContext {
        ExecutionContext::new(credential()).with_poll_interval(Duration::from_millis(1))
    }

    fn payload(runtime: &str) -> RequestPayload {
        let mut payload = RequestPayload::new();
        payload.insert("name", NAME);
        payload.insert("runtime", runtime);
        payload
    }

    #[tokio::test]
    async fn create_waits_and_rollback_deletes() {
        let functions = Arc::new(FakeFunctions::default().pending_operations());
        let operation = CreateFunction::new(functions.clone(), LOCATION, payload("go121"));
        let context = context();

        operation.execute(&context).await.unwrap();
        assert!(functions.function(NAME).is_some());

        operation.rollback(&context).await.unwrap();
        assert!(functions.function(NAME).is_none());

        assert_eq!(
            functions.calls(),
            vec![
                format!("create_function {NAME}"),
                String::from("get_operation operations/0"),
                format!("delete_function {NAME}"),
                String::from("get_operation operations/1"),
            ]
        );
    }

    #[tokio::test]
    async fn create_rollback_tolerates_missing_function() {
        let functions = Arc::new(FakeFunctions::default());
        let operation = CreateFunction::new(functions.clone(), LOCATION, payload("go121"));

        operation.rollback(&context()).await.unwrap();
    }

    #[tokio::test]
    async fn create_reports_remote_failure() {
        let functions = Arc::new(FakeFunctions::default().failing_next_operation("bad runtime"));
        let operation = CreateFunction::new(functions, LOCATION, payload("go121"));

        let error = operation.execute(&context()).await.unwrap_err();
        assert!(error.to_string().contains("bad runtime"), "{error}");
    }

    #[tokio::test]
    async fn abort_deletes_function_of_failed_create() {
        let functions = Arc::new(FakeFunctions::default().failing_next_operation("quota"));
        let operation = CreateFunction::new(functions.clone(), LOCATION, payload("go121"));
        let context = context();

        assert!(operation.execute(&context).await.is_err());
        assert!(functions.function(NAME).is_some());

        operation.abort(&context).await.unwrap();
        assert!(functions.function(NAME).is_none());
    }

    #[tokio::test]
    async fn abort_deletes_function_of_cancelled_create() {
        let functions = Arc::new(FakeFunctions::default().pending_operations());
        let operation = CreateFunction::new(functions.clone(), LOCATION, payload("go121"));
        let context = context();
        context.cancellation().cancel();

        let error = operation.execute(&context).await.unwrap_err();
        assert!(matches!(error, OperationError::Cancelled));

        operation.abort(&context).await.unwrap();
        assert!(functions.function(NAME).is_none());
        assert_eq!(
            functions.calls(),
            vec![
                format!("create_function {NAME}"),
                String::from("get_operation operations/0"),
                format!("delete_function {NAME}"),
                String::from("get_operation operations/1"),
            ]
        );
    }

    #[tokio::test]
    async fn abort_of_rejected_create_keeps_existing_function() {
        let functions = Arc::new(FakeFunctions::default().with_function(payload("go111")));
        let operation = CreateFunction::new(functions.clone(), LOCATION, payload("go121"));
        let context = context();

        let error = operation.execute(&context).await.unwrap_err();
        assert!(matches!(error, OperationError::Api(ApiError::Conflict)));

        operation.abort(&context).await.unwrap();
        assert!(functions.function(NAME).is_some());
        assert_eq!(functions.calls(), vec![format!("create_function {NAME}")]);
    }

    #[tokio::test]
    async fn abort_of_interrupted_create_reports_unknown_outcome() {
        let functions = Arc::new(FakeFunctions::default().with_function(payload("go121")));
        let operation = CreateFunction::new(functions.clone(), LOCATION, payload("go121"));
        operation.progress.set(Progress::Requested);

        let error = operation.abort(&context()).await.unwrap_err();
        assert!(matches!(error, OperationError::Interrupted(ref name) if name == NAME));

        let functions = Arc::new(FakeFunctions::default());
        let operation = CreateFunction::new(functions, LOCATION, payload("go121"));
        operation.progress.set(Progress::Requested);

        operation.abort(&context()).await.unwrap();
    }

    #[tokio::test]
    async fn abort_restores_snapshot_of_cancelled_update() {
        let functions = Arc::new(
            FakeFunctions::default()
                .with_function(payload("go111"))
                .pending_operations(),
        );
        let operation = UpdateFunction::new(functions.clone(), payload("go121"));
        let context = context();
        context.cancellation().cancel();

        let error = operation.execute(&context).await.unwrap_err();
        assert!(matches!(error, OperationError::Cancelled));
        assert_eq!(
            functions.function(NAME).unwrap().get("runtime"),
            Some(&json!("go121"))
        );

        operation.abort(&context).await.unwrap();
        assert_eq!(
            functions.function(NAME).unwrap().get("runtime"),
            Some(&json!("go111"))
        );
    }

    #[tokio::test]
    async fn abort_restores_snapshot_of_failed_update() {
        let functions = Arc::new(
            FakeFunctions::default()
                .with_function(payload("go111"))
                .failing_next_operation("bad runtime"),
        );
        let operation = UpdateFunction::new(functions.clone(), payload("go121"));
        let context = context();

        assert!(operation.execute(&context).await.is_err());
        operation.abort(&context).await.unwrap();

        assert_eq!(
            functions.function(NAME).unwrap().get("runtime"),
            Some(&json!("go111"))
        );
    }

    #[tokio::test]
    async fn abort_of_missing_function_update_patches_nothing() {
        let functions = Arc::new(FakeFunctions::default());
        let operation = UpdateFunction::new(functions.clone(), payload("go121"));
        let context = context();

        assert!(operation.execute(&context).await.is_err());
        operation.abort(&context).await.unwrap();

        assert_eq!(functions.calls(), vec![format!("get_function {NAME}")]);
    }

    #[tokio::test]
    async fn update_rollback_restores_snapshot() {
        let mut current = payload("go111");
        current.insert("status", "ACTIVE");
        current.insert("labels", json!({"team": "a"}));
        let functions = Arc::new(FakeFunctions::default().with_function(current));

        let operation = UpdateFunction::new(functions.clone(), payload("go121"));
        let context = context();

        operation.execute(&context).await.unwrap();
        assert_eq!(
            functions.function(NAME).unwrap().get("runtime"),
            Some(&json!("go121"))
        );

        operation.rollback(&context).await.unwrap();
        let restored = functions.function(NAME).unwrap();
        assert_eq!(restored.get("runtime"), Some(&json!("go111")));
        assert_eq!(restored.get("labels"), Some(&json!({"team": "a"})));
        assert!(!restored.contains_key("status"));
    }

    #[tokio::test]
    async fn update_of_missing_function_fails_without_patching() {
        let functions = Arc::new(FakeFunctions::default());
        let operation = UpdateFunction::new(functions.clone(), payload("go121"));

        let error = operation.execute(&context()).await.unwrap_err();

        assert!(matches!(error, OperationError::Api(ApiError::NotFound)));
        assert_eq!(functions.calls(), vec![format!("get_function {NAME}")]);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let functions = Arc::new(FakeFunctions::default().with_function(payload("go121")));
        let operation = DeleteFunction::new(functions.clone(), NAME);
        let context = context();

        operation.execute(&context).await.unwrap();
        operation.execute(&context).await.unwrap();

        assert!(functions.function(NAME).is_none());
    }
}
