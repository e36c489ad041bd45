use super::{join_segments, read_json, send, ApiError, ApiResult, FunctionsApi};
use crate::consts::FUNCTIONS_API_VERSION;
use crate::credentials::Credential;
use crate::request::functions::{LongRunningOperation, RequestPayload};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use url::Url;

/// Cloud Functions API client.
pub struct FunctionsClient {
    client: reqwest::Client,
    /// Base URL of the functions API
    /// e.g. https://cloudfunctions.googleapis.com
    base_url: Url,
}

impl FunctionsClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// URL of a resource given by its full name, e.g. `projects/p/locations/l/functions/f`.
    fn resource_url(&self, resource: &str) -> ApiResult<Url> {
        join_segments(
            &self.base_url,
            std::iter::once(FUNCTIONS_API_VERSION).chain(resource.split('/')),
        )
    }

    fn payload_body(payload: &RequestPayload) -> ApiResult<String> {
        Ok(serde_json::to_string(payload)?)
    }
}

#[async_trait]
impl FunctionsApi for FunctionsClient {
    async fn create_function(
        &self,
        credential: &Credential,
        location: &str,
        payload: &RequestPayload,
    ) -> ApiResult<LongRunningOperation> {
        let url = self.resource_url(&format!("{location}/functions"))?;

        let builder = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(Self::payload_body(payload)?);

        let resp = send(&self.client, credential, builder).await?;
        read_json(resp).await
    }

    async fn update_function(
        &self,
        credential: &Credential,
        name: &str,
        payload: &RequestPayload,
    ) -> ApiResult<LongRunningOperation> {
        let url = self.resource_url(name)?;

        let builder = self
            .client
            .patch(url)
            .header(CONTENT_TYPE, "application/json")
            .body(Self::payload_body(payload)?);

        let resp = send(&self.client, credential, builder).await?;
        read_json(resp).await
    }

    async fn get_function(
        &self,
        credential: &Credential,
        name: &str,
    ) -> ApiResult<Option<RequestPayload>> {
        let url = self.resource_url(name)?;

        match send(&self.client, credential, self.client.get(url)).await {
            Ok(resp) => Ok(Some(read_json(resp).await?)),
            Err(ApiError::NotFound) => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn delete_function(
        &self,
        credential: &Credential,
        name: &str,
    ) -> ApiResult<LongRunningOperation> {
        let url = self.resource_url(name)?;

        let resp = send(&self.client, credential, self.client.delete(url)).await?;
        read_json(resp).await
    }

    async fn get_operation(
        &self,
        credential: &Credential,
        name: &str,
    ) -> ApiResult<LongRunningOperation> {
        let url = self.resource_url(name)?;

        let resp = send(&self.client, credential, self.client.get(url)).await?;
        read_json(resp).await
    }
}
