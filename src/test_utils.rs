//! Recording in-memory stand-ins for the remote APIs and the packager.

use crate::client::{ApiError, ApiResult, FunctionsApi, ObjectStorage};
use crate::credentials::Credential;
use crate::registry::ConfiguredFunction;
use crate::request::functions::{LongRunningOperation, OperationStatus, RequestPayload};
use crate::template::package::{PackageError, Packager};
use crate::types::{FunctionSpecification, ProviderContext, Trigger};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn provider() -> ProviderContext {
    ProviderContext::new("my-project", "europe-west2", "my-bucket")
}

pub fn credential() -> Credential {
    Credential::ApiKey(String::from("key"))
}

pub fn pubsub_specification() -> FunctionSpecification {
    FunctionSpecification {
        trigger: Trigger {
            event_type: String::from("google.pubsub.topic.publish"),
            resource: String::from("projects/my-project/topics/my-topic"),
            service: String::from("pubsub.googleapis.com"),
        },
        ..Default::default()
    }
}

#[derive(Default)]
struct Calls {
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashSet<&'static str>>,
}

impl Calls {
    fn record(&self, method: &'static str, argument: &str) -> ApiResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{method} {argument}"));
        if self.failures.lock().unwrap().contains(method) {
            return Err(ApiError::InternalServerError);
        }
        Ok(())
    }

    fn fail_on(&self, method: &'static str) {
        self.failures.lock().unwrap().insert(method);
    }

    fn all(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct FakeStorage {
    calls: Calls,
    buckets: Mutex<BTreeSet<String>>,
    objects: Mutex<BTreeMap<(String, String), Vec<u8>>>,
}

impl FakeStorage {
    pub fn with_bucket(bucket: &str) -> Self {
        let storage = Self::default();
        storage.buckets.lock().unwrap().insert(bucket.to_string());
        storage
    }

    pub fn with_object(self, bucket: &str, key: &str, bytes: &[u8]) -> Self {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), bytes.to_vec());
        self
    }

    pub fn fail_on(&self, method: &'static str) {
        self.calls.fail_on(method);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.all()
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.buckets.lock().unwrap().contains(bucket)
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn bucket_exists(&self, _credential: &Credential, bucket: &str) -> ApiResult<bool> {
        self.calls.record("bucket_exists", bucket)?;
        Ok(self.has_bucket(bucket))
    }

    async fn create_bucket(
        &self,
        _credential: &Credential,
        _project_id: &str,
        bucket: &str,
        _location: &str,
    ) -> ApiResult<()> {
        self.calls.record("create_bucket", bucket)?;
        if !self.buckets.lock().unwrap().insert(bucket.to_string()) {
            return Err(ApiError::Conflict);
        }
        Ok(())
    }

    async fn delete_bucket(&self, _credential: &Credential, bucket: &str) -> ApiResult<()> {
        self.calls.record("delete_bucket", bucket)?;
        if !self.buckets.lock().unwrap().remove(bucket) {
            return Err(ApiError::NotFound);
        }
        Ok(())
    }

    async fn upload_object(
        &self,
        _credential: &Credential,
        bucket: &str,
        key: &str,
        bytes: &[u8],
    ) -> ApiResult<()> {
        self.calls.record("upload_object", key)?;
        if !self.has_bucket(bucket) {
            return Err(ApiError::NotFound);
        }
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), bytes.to_vec());
        Ok(())
    }

    async fn download_object(
        &self,
        _credential: &Credential,
        bucket: &str,
        key: &str,
    ) -> ApiResult<Option<Vec<u8>>> {
        self.calls.record("download_object", key)?;
        Ok(self.object(bucket, key))
    }

    async fn delete_object(
        &self,
        _credential: &Credential,
        bucket: &str,
        key: &str,
    ) -> ApiResult<()> {
        self.calls.record("delete_object", key)?;
        self.objects
            .lock()
            .unwrap()
            .remove(&(bucket.to_string(), key.to_string()))
            .map(|_| ())
            .ok_or(ApiError::NotFound)
    }
}

#[derive(Default)]
pub struct FakeFunctions {
    calls: Calls,
    functions: Mutex<BTreeMap<String, RequestPayload>>,
    /// Operations start pending and finish on the first poll.
    pending: AtomicBool,
    /// Error reported by the next operation started.
    next_error: Mutex<Option<String>>,
    /// Errors of the failed operations by operation name.
    failed: Mutex<BTreeMap<String, String>>,
    operations: AtomicUsize,
}

impl FakeFunctions {
    pub fn with_function(self, payload: RequestPayload) -> Self {
        let name = payload.function_name().unwrap_or_default().to_string();
        self.functions.lock().unwrap().insert(name, payload);
        self
    }

    pub fn pending_operations(self) -> Self {
        self.pending.store(true, Ordering::SeqCst);
        self
    }

    /// The next operation started finishes with a remote error.
    pub fn failing_next_operation(self, message: &str) -> Self {
        *self.next_error.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn fail_on(&self, method: &'static str) {
        self.calls.fail_on(method);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.all()
    }

    pub fn function(&self, name: &str) -> Option<RequestPayload> {
        self.functions.lock().unwrap().get(name).cloned()
    }

    fn operation(&self) -> LongRunningOperation {
        let id = self.operations.fetch_add(1, Ordering::SeqCst);
        let name = format!("operations/{id}");
        if let Some(message) = self.next_error.lock().unwrap().take() {
            self.failed.lock().unwrap().insert(name.clone(), message);
        }

        let mut operation = LongRunningOperation::done(name);
        if self.pending.load(Ordering::SeqCst) {
            operation.done = false;
        } else {
            operation.error = self.remote_status(&operation.name);
        }
        operation
    }

    fn remote_status(&self, operation: &str) -> Option<OperationStatus> {
        self.failed
            .lock()
            .unwrap()
            .get(operation)
            .cloned()
            .map(|message| OperationStatus { code: 3, message })
    }
}

#[async_trait]
impl FunctionsApi for FakeFunctions {
    async fn create_function(
        &self,
        _credential: &Credential,
        _location: &str,
        payload: &RequestPayload,
    ) -> ApiResult<LongRunningOperation> {
        let name = payload.function_name().unwrap_or_default().to_string();
        self.calls.record("create_function", &name)?;

        let mut functions = self.functions.lock().unwrap();
        if functions.contains_key(&name) {
            return Err(ApiError::Conflict);
        }
        functions.insert(name, payload.clone());
        drop(functions);

        Ok(self.operation())
    }

    async fn update_function(
        &self,
        _credential: &Credential,
        name: &str,
        payload: &RequestPayload,
    ) -> ApiResult<LongRunningOperation> {
        self.calls.record("update_function", name)?;

        let mut functions = self.functions.lock().unwrap();
        if !functions.contains_key(name) {
            return Err(ApiError::NotFound);
        }
        functions.insert(name.to_string(), payload.clone());
        drop(functions);

        Ok(self.operation())
    }

    async fn get_function(
        &self,
        _credential: &Credential,
        name: &str,
    ) -> ApiResult<Option<RequestPayload>> {
        self.calls.record("get_function", name)?;
        Ok(self.function(name))
    }

    async fn delete_function(
        &self,
        _credential: &Credential,
        name: &str,
    ) -> ApiResult<LongRunningOperation> {
        self.calls.record("delete_function", name)?;

        if self.functions.lock().unwrap().remove(name).is_none() {
            return Err(ApiError::NotFound);
        }

        Ok(self.operation())
    }

    async fn get_operation(
        &self,
        _credential: &Credential,
        name: &str,
    ) -> ApiResult<LongRunningOperation> {
        self.calls.record("get_operation", name)?;

        let mut operation = LongRunningOperation::done(name);
        operation.error = self.remote_status(name);
        Ok(operation)
    }
}

/// Packager returning fixed bytes and counting its calls.
#[derive(Default)]
pub struct RecordingPackager {
    calls: AtomicUsize,
}

impl RecordingPackager {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Packager for RecordingPackager {
    async fn package(&self, function: &ConfiguredFunction) -> Result<Vec<u8>, PackageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("archive of {}", function.name).into_bytes())
    }
}
