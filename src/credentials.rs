use crate::consts::{ACCESS_TOKEN_ENV_VAR, API_KEY_ENV_VAR};
use async_trait::async_trait;
use thiserror::Error as ThisError;

/// Credential attached to every call against the Google APIs.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Sent as the `key` query parameter.
    ApiKey(String),
    /// OAuth access token, sent as a bearer token.
    AccessToken(String),
}

impl Credential {
    pub fn apply(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Credential::ApiKey(key) => builder.query(&[("key", key)]),
            Credential::AccessToken(token) => builder.bearer_auth(token),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::ApiKey(_) => write!(f, "ApiKey(***)"),
            Credential::AccessToken(_) => write!(f, "AccessToken(***)"),
        }
    }
}

#[derive(ThisError, Debug, PartialEq, Eq)]
pub enum CredentialError {
    #[error(
        "No credential found. Set GOOGLE_CLOUD_PLATFORM_API_KEY or GOOGLE_OAUTH_ACCESS_TOKEN"
    )]
    Missing,
}

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn credential(&self) -> Result<Credential, CredentialError>;
}

/// Credential given on the command line.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenSource {
    credential: Option<Credential>,
}

impl StaticTokenSource {
    pub fn new(credential: Option<Credential>) -> Self {
        Self { credential }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn credential(&self) -> Result<Credential, CredentialError> {
        self.credential.clone().ok_or(CredentialError::Missing)
    }
}

/// Reads the access token or API key from the environment on every call.
#[derive(Debug, Clone, Default)]
pub struct EnvTokenSource;

#[async_trait]
impl TokenSource for EnvTokenSource {
    async fn credential(&self) -> Result<Credential, CredentialError> {
        let non_empty = |var: &str| std::env::var(var).ok().filter(|value| !value.is_empty());

        if let Some(token) = non_empty(ACCESS_TOKEN_ENV_VAR) {
            return Ok(Credential::AccessToken(token));
        }

        non_empty(API_KEY_ENV_VAR)
            .map(Credential::ApiKey)
            .ok_or(CredentialError::Missing)
    }
}

/// Tries the given sources in order and returns the first credential found.
pub struct ChainTokenSource {
    sources: Vec<Box<dyn TokenSource>>,
}

impl ChainTokenSource {
    pub fn new(sources: Vec<Box<dyn TokenSource>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl TokenSource for ChainTokenSource {
    async fn credential(&self) -> Result<Credential, CredentialError> {
        for source in &self.sources {
            if let Ok(credential) = source.credential().await {
                return Ok(credential);
            }
        }
        Err(CredentialError::Missing)
    }
}
