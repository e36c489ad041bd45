use crate::client::{ApiError, ObjectStorage};
use crate::executor::{errors::OperationError, ExecutionContext, Operation};
use crate::types::{Artifact, ProviderContext};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};

/// What was stored under the artifact key before the upload.
#[derive(Debug, Default)]
enum Backup {
    #[default]
    NotTaken,
    Absent,
    Present(Vec<u8>),
}

/// Uploads the packaged function sources to the function bucket.
///
/// An object already stored under the same key is kept in memory and put back on rollback,
/// so a failed update leaves the previous sources in place.
pub struct UploadArtifact {
    storage: Arc<dyn ObjectStorage>,
    provider: Arc<ProviderContext>,
    artifact: Artifact,
    backup: Mutex<Backup>,
}

impl UploadArtifact {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        provider: Arc<ProviderContext>,
        artifact: Artifact,
    ) -> Self {
        Self {
            storage,
            provider,
            artifact,
            backup: Mutex::new(Backup::NotTaken),
        }
    }

    fn set_backup(&self, backup: Backup) {
        *self.backup.lock().unwrap_or_else(PoisonError::into_inner) = backup;
    }

    fn take_backup(&self) -> Backup {
        std::mem::take(&mut *self.backup.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[async_trait]
impl Operation for UploadArtifact {
    fn name(&self) -> &'static str {
        "upload-artifact"
    }

    async fn execute(&self, context: &ExecutionContext) -> Result<(), OperationError> {
        let bucket = &self.provider.function_storage;
        let key = &self.artifact.key;

        let backup = match self
            .storage
            .download_object(context.credential(), bucket, key)
            .await?
        {
            Some(bytes) => {
                tracing::debug!(%bucket, %key, size = bytes.len(), "Keeping previous artifact.");
                Backup::Present(bytes)
            }
            None => Backup::Absent,
        };
        self.set_backup(backup);

        tracing::info!(%bucket, %key, size = self.artifact.bytes.len(), "Uploading artifact.");
        self.storage
            .upload_object(context.credential(), bucket, key, &self.artifact.bytes)
            .await?;

        Ok(())
    }

    async fn rollback(&self, context: &ExecutionContext) -> Result<(), OperationError> {
        let bucket = &self.provider.function_storage;
        let key = &self.artifact.key;

        match self.take_backup() {
            Backup::NotTaken => Ok(()),
            Backup::Present(bytes) => {
                tracing::info!(%bucket, %key, "Restoring previous artifact.");
                self.storage
                    .upload_object(context.credential(), bucket, key, &bytes)
                    .await?;
                Ok(())
            }
            Backup::Absent => {
                tracing::info!(%bucket, %key, "Deleting artifact.");
                match self
                    .storage
                    .delete_object(context.credential(), bucket, key)
                    .await
                {
                    Ok(()) | Err(ApiError::NotFound) => Ok(()),
                    Err(error) => Err(error.into()),
                }
            }
        }
    }

    /// The upload may have landed before the step failed, so the backup is put back.
    async fn abort(&self, context: &ExecutionContext) -> Result<(), OperationError> {
        self.rollback(context).await
    }
}

/// Deletes the archive of a removed function. An already missing archive is fine.
pub struct DeleteArtifact {
    storage: Arc<dyn ObjectStorage>,
    provider: Arc<ProviderContext>,
    key: String,
}

impl DeleteArtifact {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        provider: Arc<ProviderContext>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            provider,
            key: key.into(),
        }
    }
}

#[async_trait]
impl Operation for DeleteArtifact {
    fn name(&self) -> &'static str {
        "delete-artifact"
    }

    async fn execute(&self, context: &ExecutionContext) -> Result<(), OperationError> {
        let bucket = &self.provider.function_storage;
        let key = &self.key;

        match self
            .storage
            .delete_object(context.credential(), bucket, key)
            .await
        {
            Ok(()) => {
                tracing::info!(%bucket, %key, "Artifact deleted.");
                Ok(())
            }
            Err(ApiError::NotFound) => {
                tracing::debug!(%bucket, %key, "Artifact already absent.");
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Deletion is terminal.
    async fn rollback(&self, _context: &ExecutionContext) -> Result<(), OperationError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{credential, provider, FakeStorage};

    fn artifact(bytes: &[u8]) -> Artifact {
        Artifact {
            key: String::from("fn.zip"),
            bytes: bytes.to_vec(),
        }
    }

    fn upload(storage: &Arc<FakeStorage>, bytes: &[u8]) -> UploadArtifact {
        UploadArtifact::new(storage.clone(), Arc::new(provider()), artifact(bytes))
    }

    #[tokio::test]
    async fn rollback_deletes_new_object() {
        let storage = Arc::new(FakeStorage::with_bucket("my-bucket"));
        let operation = upload(&storage, b"new");
        let context = ExecutionContext::new(credential());

        operation.execute(&context).await.unwrap();
        assert_eq!(storage.object("my-bucket", "fn.zip").unwrap(), b"new");

        operation.rollback(&context).await.unwrap();
        assert!(storage.object("my-bucket", "fn.zip").is_none());
    }

    #[tokio::test]
    async fn rollback_restores_previous_object() {
        let storage =
            Arc::new(FakeStorage::with_bucket("my-bucket").with_object("my-bucket", "fn.zip", b"old"));
        let operation = upload(&storage, b"new");
        let context = ExecutionContext::new(credential());

        operation.execute(&context).await.unwrap();
        assert_eq!(storage.object("my-bucket", "fn.zip").unwrap(), b"new");

        operation.rollback(&context).await.unwrap();
        assert_eq!(storage.object("my-bucket", "fn.zip").unwrap(), b"old");
    }

    #[tokio::test]
    async fn failed_backup_does_not_upload() {
        let storage = Arc::new(FakeStorage::with_bucket("my-bucket"));
        storage.fail_on("download_object");

        let operation = upload(&storage, b"new");
        assert!(operation
            .execute(&ExecutionContext::new(credential()))
            .await
            .is_err());

        assert_eq!(storage.calls(), vec!["download_object fn.zip"]);
    }

    #[tokio::test]
    async fn abort_after_failed_upload_cleans_up() {
        let storage = Arc::new(FakeStorage::with_bucket("my-bucket"));
        storage.fail_on("upload_object");
        let operation = upload(&storage, b"new");
        let context = ExecutionContext::new(credential());

        assert!(operation.execute(&context).await.is_err());
        operation.abort(&context).await.unwrap();

        assert_eq!(
            storage.calls(),
            vec![
                "download_object fn.zip",
                "upload_object fn.zip",
                "delete_object fn.zip"
            ]
        );
    }

    #[tokio::test]
    async fn abort_without_backup_touches_nothing() {
        let storage = Arc::new(FakeStorage::with_bucket("my-bucket"));
        storage.fail_on("download_object");
        let operation = upload(&storage, b"new");
        let context = ExecutionContext::new(credential());

        assert!(operation.execute(&context).await.is_err());
        operation.abort(&context).await.unwrap();

        assert_eq!(storage.calls(), vec!["download_object fn.zip"]);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let storage =
            Arc::new(FakeStorage::with_bucket("my-bucket").with_object("my-bucket", "fn.zip", b"old"));
        let operation = DeleteArtifact::new(storage.clone(), Arc::new(provider()), "fn.zip");
        let context = ExecutionContext::new(credential());

        operation.execute(&context).await.unwrap();
        operation.execute(&context).await.unwrap();

        assert!(storage.object("my-bucket", "fn.zip").is_none());
    }
}
