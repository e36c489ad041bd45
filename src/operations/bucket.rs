use crate::client::{ApiError, ObjectStorage};
use crate::executor::{errors::OperationError, ExecutionContext, Operation};
use crate::types::ProviderContext;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Makes sure the bucket holding the function archives exists.
///
/// Safe to run whether or not the bucket is already there. Only a bucket created by this
/// operation is deleted on rollback.
pub struct EnsureStorageBucket {
    storage: Arc<dyn ObjectStorage>,
    provider: Arc<ProviderContext>,
    created: AtomicBool,
}

impl EnsureStorageBucket {
    pub fn new(storage: Arc<dyn ObjectStorage>, provider: Arc<ProviderContext>) -> Self {
        Self {
            storage,
            provider,
            created: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Operation for EnsureStorageBucket {
    fn name(&self) -> &'static str {
        "ensure-storage-bucket"
    }

    async fn execute(&self, context: &ExecutionContext) -> Result<(), OperationError> {
        let bucket = &self.provider.function_storage;

        if self
            .storage
            .bucket_exists(context.credential(), bucket)
            .await?
        {
            tracing::debug!(%bucket, "Bucket already exists.");
            return Ok(());
        }

        tracing::info!(%bucket, location = %self.provider.location, "Creating bucket.");
        match self
            .storage
            .create_bucket(
                context.credential(),
                &self.provider.project_id,
                bucket,
                &self.provider.location,
            )
            .await
        {
            Ok(()) => {
                self.created.store(true, Ordering::SeqCst);
                Ok(())
            }
            // Created concurrently by someone else.
            Err(ApiError::Conflict) => {
                tracing::debug!(%bucket, "Bucket appeared while creating it.");
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn rollback(&self, context: &ExecutionContext) -> Result<(), OperationError> {
        if !self.created.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let bucket = &self.provider.function_storage;
        tracing::info!(%bucket, "Deleting bucket.");

        match self.storage.delete_bucket(context.credential(), bucket).await {
            Ok(()) | Err(ApiError::NotFound) => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{credential, provider, FakeStorage};

    fn operation(storage: &Arc<FakeStorage>) -> EnsureStorageBucket {
        EnsureStorageBucket::new(storage.clone(), Arc::new(provider()))
    }

    #[tokio::test]
    async fn creates_missing_bucket_and_deletes_it_on_rollback() {
        let storage = Arc::new(FakeStorage::default());
        let operation = operation(&storage);
        let context = ExecutionContext::new(credential());

        operation.execute(&context).await.unwrap();
        assert!(storage.has_bucket("my-bucket"));

        operation.rollback(&context).await.unwrap();
        assert!(!storage.has_bucket("my-bucket"));
    }

    #[tokio::test]
    async fn existing_bucket_is_left_alone() {
        let storage = Arc::new(FakeStorage::with_bucket("my-bucket"));
        let operation = operation(&storage);
        let context = ExecutionContext::new(credential());

        operation.execute(&context).await.unwrap();
        operation.execute(&context).await.unwrap();
        operation.rollback(&context).await.unwrap();

        assert!(storage.has_bucket("my-bucket"));
        assert_eq!(
            storage.calls(),
            vec!["bucket_exists my-bucket", "bucket_exists my-bucket"]
        );
    }

    #[tokio::test]
    async fn create_failure_is_reported() {
        let storage = Arc::new(FakeStorage::default());
        storage.fail_on("create_bucket");

        let error = operation(&storage)
            .execute(&ExecutionContext::new(credential()))
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            OperationError::Api(ApiError::InternalServerError)
        ));
    }
}
