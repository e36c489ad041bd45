use crate::consts::{ARTIFACT_EXTENSION, DEFAULT_RUNTIME, STORAGE_URL_SCHEME};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Validated description of one deployable function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionSpecification {
    /// description is shown in the cloud console
    pub description: String,

    /// memory_size in bytes, always a multiple of 64. Zero means provider default.
    pub memory_size: u64,

    /// timeout of one invocation. Zero means provider default.
    pub timeout: Duration,

    /// service_account is the email of the identity the function runs as
    pub service_account: String,

    /// labels are attached to the deployed function
    pub labels: BTreeMap<String, String>,

    /// max_instances caps scaling. Zero means unlimited.
    pub max_instances: u32,

    /// vpc_connector routes egress through a serverless VPC connector
    pub vpc_connector: String,

    /// trigger is the event source invoking the function
    pub trigger: Trigger,
}

/// Written in snake case in the configuration, sent in camel case to the APIs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all(serialize = "camelCase"))]
pub struct Trigger {
    /// event_type, e.g. `google.pubsub.topic.publish`
    pub event_type: String,
    /// resource the events come from, e.g. `projects/my-project/topics/my-topic`
    pub resource: String,
    /// service producing the events, e.g. `pubsub.googleapis.com`
    pub service: String,
}

/// Kinds of functions this provider knows how to package and deploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    PubSub,
    CloudStorage,
}

impl FunctionKind {
    pub fn from_type(kind: &str) -> Option<Self> {
        match kind {
            "pubsub" => Some(FunctionKind::PubSub),
            "storage" => Some(FunctionKind::CloudStorage),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionKind::PubSub => "pubsub",
            FunctionKind::CloudStorage => "storage",
        }
    }

    /// Name of the exported handler inside the packaged sources.
    pub fn entry_point(&self) -> &'static str {
        match self {
            FunctionKind::PubSub => "RunPubSub",
            FunctionKind::CloudStorage => "RunCloudStorage",
        }
    }

    /// Sources packaged when the configuration does not list any.
    pub fn default_resources(&self) -> Vec<Resource> {
        let kind = self.as_str();
        let dir = PathBuf::from("pkg").join(kind);
        vec![
            Resource::new(dir.join(format!("{kind}.go")), 0o755),
            Resource::new(dir.join("go.mod"), 0o644),
            Resource::new(dir.join("go.sum"), 0o644),
        ]
    }
}

impl std::fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A local file included in the function archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Resource {
    /// path relative to the package root, also used as the path inside the archive
    pub path: PathBuf,
    /// mode are the unix permissions stored in the archive
    #[serde(default = "default_resource_mode")]
    pub mode: u32,
}

fn default_resource_mode() -> u32 {
    0o644
}

impl Resource {
    pub fn new(path: impl Into<PathBuf>, mode: u32) -> Self {
        Self {
            path: path.into(),
            mode,
        }
    }

    /// Path inside the archive, always `/` separated.
    pub fn archive_path(&self) -> String {
        self.path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Where functions of one provider are deployed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderContext {
    pub project_id: String,
    pub location: String,
    /// function_storage is the bucket holding the function archives
    pub function_storage: String,
    pub runtime: String,
}

impl ProviderContext {
    pub fn new(
        project_id: impl Into<String>,
        location: impl Into<String>,
        function_storage: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            location: location.into(),
            function_storage: function_storage.into(),
            runtime: DEFAULT_RUNTIME.to_string(),
        }
    }

    pub fn with_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = runtime.into();
        self
    }

    /// Full name of the location, `projects/{project}/locations/{location}`.
    pub fn location_name(&self) -> String {
        format!("projects/{}/locations/{}", self.project_id, self.location)
    }

    /// Full name of a function, `projects/{project}/locations/{location}/functions/{name}`.
    pub fn function_name(&self, name: &str) -> String {
        format!("{}/functions/{}", self.location_name(), name)
    }

    pub fn artifact_key(&self, name: &str) -> String {
        format!("{name}{ARTIFACT_EXTENSION}")
    }

    pub fn source_archive_url(&self, name: &str) -> String {
        format!(
            "{STORAGE_URL_SCHEME}{}/{}",
            self.function_storage,
            self.artifact_key(name)
        )
    }
}

/// Packaged function sources and the key they are stored under.
#[derive(Clone, PartialEq, Eq)]
pub struct Artifact {
    pub key: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Artifact")
            .field("key", &self.key)
            .field("size", &self.bytes.len())
            .finish()
    }
}
