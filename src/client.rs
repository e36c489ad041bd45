//! Capability interfaces of the remote APIs and their HTTP implementations.

pub mod functions;
pub mod storage;

use crate::consts::USER_AGENT;
use crate::credentials::Credential;
use crate::request::functions::{LongRunningOperation, RequestPayload};
use async_trait::async_trait;
use reqwest::{Error as ReqwestError, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Error as SerdeJsonError;
use thiserror::Error as ThisError;
use url::Url;

pub use functions::FunctionsClient;
pub use storage::StorageClient;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(ThisError, Debug)]
pub enum ApiError {
    #[error("Serializing error: {0}")]
    SerializingError(
        #[source]
        #[from]
        SerdeJsonError,
    ),
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("HTTP build error: {0}")]
    HttpBuilderError(#[source] ReqwestError),
    #[error("HTTP error: {0}")]
    HttpError(#[source] ReqwestError),
    #[error("Api: bad request")]
    BadRequest,
    #[error("Api: unauthorized")]
    Unauthorized,
    #[error("Api: forbidden")]
    Forbidden,
    #[error("Api: not found")]
    NotFound,
    #[error("Api: conflict")]
    Conflict,
    #[error("Api: internal server error")]
    InternalServerError,
    #[error("Api: unknown status code: {0}")]
    UnknownStatusCode(u16),
}

impl From<StatusCode> for ApiError {
    fn from(status_code: StatusCode) -> Self {
        match status_code {
            StatusCode::BAD_REQUEST => ApiError::BadRequest,
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            StatusCode::FORBIDDEN => ApiError::Forbidden,
            StatusCode::NOT_FOUND => ApiError::NotFound,
            StatusCode::CONFLICT => ApiError::Conflict,
            StatusCode::INTERNAL_SERVER_ERROR => ApiError::InternalServerError,
            _ => ApiError::UnknownStatusCode(status_code.as_u16()),
        }
    }
}

/// Object storage holding the function archives.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn bucket_exists(&self, credential: &Credential, bucket: &str) -> ApiResult<bool>;

    async fn create_bucket(
        &self,
        credential: &Credential,
        project_id: &str,
        bucket: &str,
        location: &str,
    ) -> ApiResult<()>;

    async fn delete_bucket(&self, credential: &Credential, bucket: &str) -> ApiResult<()>;

    async fn upload_object(
        &self,
        credential: &Credential,
        bucket: &str,
        key: &str,
        bytes: &[u8],
    ) -> ApiResult<()>;

    /// Returns `None` if the object does not exist.
    async fn download_object(
        &self,
        credential: &Credential,
        bucket: &str,
        key: &str,
    ) -> ApiResult<Option<Vec<u8>>>;

    async fn delete_object(&self, credential: &Credential, bucket: &str, key: &str)
        -> ApiResult<()>;
}

/// Function management API.
#[async_trait]
pub trait FunctionsApi: Send + Sync {
    /// `location` is `projects/*/locations/*`.
    async fn create_function(
        &self,
        credential: &Credential,
        location: &str,
        payload: &RequestPayload,
    ) -> ApiResult<LongRunningOperation>;

    /// `name` is `projects/*/locations/*/functions/*`.
    async fn update_function(
        &self,
        credential: &Credential,
        name: &str,
        payload: &RequestPayload,
    ) -> ApiResult<LongRunningOperation>;

    /// Returns `None` if the function does not exist.
    async fn get_function(
        &self,
        credential: &Credential,
        name: &str,
    ) -> ApiResult<Option<RequestPayload>>;

    async fn delete_function(
        &self,
        credential: &Credential,
        name: &str,
    ) -> ApiResult<LongRunningOperation>;

    async fn get_operation(
        &self,
        credential: &Credential,
        name: &str,
    ) -> ApiResult<LongRunningOperation>;
}

/// Appends path segments to a base URL, percent-encoding each one.
fn join_segments<'a>(
    base_url: &Url,
    segments: impl IntoIterator<Item = &'a str>,
) -> ApiResult<Url> {
    let mut url = base_url.clone();
    url.path_segments_mut()
        .map_err(|_| ApiError::InvalidBaseUrl(base_url.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn status_code_into_api_result(status_code: StatusCode) -> ApiResult<()> {
    if status_code.is_success() {
        return Ok(());
    }
    Err(status_code.into())
}

async fn send(
    client: &reqwest::Client,
    credential: &Credential,
    builder: reqwest::RequestBuilder,
) -> ApiResult<reqwest::Response> {
    let req = credential
        .apply(builder.header(reqwest::header::USER_AGENT, USER_AGENT))
        .build()
        .map_err(ApiError::HttpBuilderError)?;

    tracing::trace!(method = %req.method(), url = %req.url(), "Sending request.");

    let resp = client.execute(req).await.map_err(ApiError::HttpError)?;

    status_code_into_api_result(resp.status())?;

    Ok(resp)
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> ApiResult<T> {
    let bytes = resp.bytes().await.map_err(ApiError::HttpError)?;
    Ok(serde_json::from_slice(&bytes)?)
}
