use const_format::concatcp;

pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");

pub const USER_AGENT: &str = concatcp!(PKG_NAME, "/", PKG_VERSION);

pub const CONFIG_PATH_ENV_VAR: &str = "GCP_FUNCTIONS_CONFIG";
pub const CONFIG_DEFAULT_PATH: &str = "functions.yml";

pub const API_KEY_ENV_VAR: &str = "GOOGLE_CLOUD_PLATFORM_API_KEY";
pub const ACCESS_TOKEN_ENV_VAR: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

pub const FUNCTIONS_API_URL_ENV_VAR: &str = "GCP_FUNCTIONS_API_URL";
pub const FUNCTIONS_API_DEFAULT_URL: &str = "https://cloudfunctions.googleapis.com";
pub const FUNCTIONS_API_VERSION: &str = "v1";

pub const STORAGE_API_URL_ENV_VAR: &str = "GCP_STORAGE_API_URL";
pub const STORAGE_API_DEFAULT_URL: &str = "https://storage.googleapis.com";

pub const DEFAULT_RUNTIME: &str = "go121";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

pub const STORAGE_URL_SCHEME: &str = "gs://";
pub const ARTIFACT_EXTENSION: &str = ".zip";
pub const ARTIFACT_CONTENT_TYPE: &str = "application/zip";

pub const ENABLED_FUNCTIONS_ENV_VAR: &str = "ENABLED_FUNCTIONS";

pub const CLOUD_FUNCTIONS_TYPE: &str = concatcp!(
    "gcp-types/cloudfunctions-",
    FUNCTIONS_API_VERSION,
    ":projects.locations.functions"
);

pub const FUNCTION_NAME_MAX_LEN: usize = 140;
pub const MEMORY_SIZE_FACTOR: u64 = 64;
