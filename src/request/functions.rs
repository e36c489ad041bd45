use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of a create or update call against the functions API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestPayload(Map<String, Value>);

impl RequestPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Full name of the function, `projects/*/locations/*/functions/*`.
    pub fn function_name(&self) -> Option<&str> {
        self.get("name").and_then(Value::as_str)
    }

    pub fn to_pretty_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.0)
    }
}

impl From<Map<String, Value>> for RequestPayload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// google.longrunning.Operation as returned by create, update and delete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LongRunningOperation {
    /// name is used to poll the operation
    pub name: String,

    #[serde(default)]
    pub done: bool,

    /// error is set when the operation finished unsuccessfully
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationStatus>,
}

impl LongRunningOperation {
    pub fn done(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            done: true,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationStatus {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}
