use super::{join_segments, read_json, send, ApiError, ApiResult, ObjectStorage};
use crate::consts::ARTIFACT_CONTENT_TYPE;
use crate::credentials::Credential;
use crate::request::storage::CreateBucketRequest;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use url::Url;

/// Cloud Storage JSON API client.
pub struct StorageClient {
    client: reqwest::Client,
    /// Base URL of the storage API
    /// e.g. https://storage.googleapis.com
    base_url: Url,
}

impl StorageClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn bucket_url(&self, bucket: &str) -> ApiResult<Url> {
        join_segments(&self.base_url, ["storage", "v1", "b", bucket])
    }

    fn object_url(&self, bucket: &str, key: &str) -> ApiResult<Url> {
        join_segments(&self.base_url, ["storage", "v1", "b", bucket, "o", key])
    }

    fn upload_url(&self, bucket: &str) -> ApiResult<Url> {
        join_segments(&self.base_url, ["upload", "storage", "v1", "b", bucket, "o"])
    }
}

#[async_trait]
impl ObjectStorage for StorageClient {
    async fn bucket_exists(&self, credential: &Credential, bucket: &str) -> ApiResult<bool> {
        let url = self.bucket_url(bucket)?;

        match send(&self.client, credential, self.client.get(url)).await {
            Ok(_) => Ok(true),
            Err(ApiError::NotFound) => Ok(false),
            Err(error) => Err(error),
        }
    }

    async fn create_bucket(
        &self,
        credential: &Credential,
        project_id: &str,
        bucket: &str,
        location: &str,
    ) -> ApiResult<()> {
        let url = join_segments(&self.base_url, ["storage", "v1", "b"])?;

        let body = serde_json::to_string(&CreateBucketRequest {
            name: bucket.to_string(),
            location: location.to_string(),
        })?;

        let builder = self
            .client
            .post(url)
            .query(&[("project", project_id)])
            .header(CONTENT_TYPE, "application/json")
            .body(body);

        send(&self.client, credential, builder).await?;
        Ok(())
    }

    async fn delete_bucket(&self, credential: &Credential, bucket: &str) -> ApiResult<()> {
        let url = self.bucket_url(bucket)?;

        send(&self.client, credential, self.client.delete(url)).await?;
        Ok(())
    }

    async fn upload_object(
        &self,
        credential: &Credential,
        bucket: &str,
        key: &str,
        bytes: &[u8],
    ) -> ApiResult<()> {
        let url = self.upload_url(bucket)?;

        let builder = self
            .client
            .post(url)
            .query(&[("uploadType", "media"), ("name", key)])
            .header(CONTENT_TYPE, ARTIFACT_CONTENT_TYPE)
            .body(bytes.to_vec());

        let resp = send(&self.client, credential, builder).await?;
        let object: serde_json::Value = read_json(resp).await?;
        tracing::debug!(%bucket, %key, generation = %object["generation"], "Object uploaded.");

        Ok(())
    }

    async fn download_object(
        &self,
        credential: &Credential,
        bucket: &str,
        key: &str,
    ) -> ApiResult<Option<Vec<u8>>> {
        let url = self.object_url(bucket, key)?;
        let builder = self.client.get(url).query(&[("alt", "media")]);

        match send(&self.client, credential, builder).await {
            Ok(resp) => {
                let bytes = resp.bytes().await.map_err(ApiError::HttpError)?;
                Ok(Some(bytes.to_vec()))
            }
            Err(ApiError::NotFound) => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn delete_object(
        &self,
        credential: &Credential,
        bucket: &str,
        key: &str,
    ) -> ApiResult<()> {
        let url = self.object_url(bucket, key)?;

        send(&self.client, credential, self.client.delete(url)).await?;
        Ok(())
    }
}
