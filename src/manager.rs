//! Deploy, update and remove one named function.
//!
//! Every action builds a fixed list of operations and hands it to a fresh
//! [`Executor`]. Anything that can be checked locally (lookup, packaging, credential) is done
//! before the first remote call, so a failure there leaves nothing behind.

pub mod errors;

use crate::client::{FunctionsApi, ObjectStorage};
use crate::config::defs::FunctionName;
use crate::consts::DEFAULT_POLL_INTERVAL_SECS;
use crate::credentials::TokenSource;
use crate::executor::{ExecutionContext, Executor};
use crate::operations::{
    CreateFunction, DeleteArtifact, DeleteFunction, EnsureStorageBucket, UpdateFunction,
    UploadArtifact,
};
use crate::template::{FunctionData, TemplateBuilder};
use crate::types::ProviderContext;
use errors::ManagerError;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{trace_span, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentState {
    Idle,
    Deploying,
    Deployed,
    /// A step failed and every completed step was undone.
    RolledBack,
    Removing,
    Removed,
    /// A step failed and cleaning up failed too, remote state needs manual inspection.
    Failed,
}

impl std::fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self {
            DeploymentState::Idle => "idle",
            DeploymentState::Deploying => "deploying",
            DeploymentState::Deployed => "deployed",
            DeploymentState::RolledBack => "rolled-back",
            DeploymentState::Removing => "removing",
            DeploymentState::Removed => "removed",
            DeploymentState::Failed => "failed",
        };
        write!(f, "{state}")
    }
}

#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// cancellation stops the running step and starts the rollback
    pub cancellation: CancellationToken,
    pub step_timeout: Option<Duration>,
    /// poll_interval between two checks of a long-running operation
    pub poll_interval: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            cancellation: CancellationToken::new(),
            step_timeout: None,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

pub struct DeploymentManager {
    template_builder: TemplateBuilder,
    provider: Arc<ProviderContext>,
    storage: Arc<dyn ObjectStorage>,
    functions: Arc<dyn FunctionsApi>,
    token_source: Arc<dyn TokenSource>,
    options: ManagerOptions,
    state: DeploymentState,
}

impl DeploymentManager {
    pub fn new(
        template_builder: TemplateBuilder,
        provider: Arc<ProviderContext>,
        storage: Arc<dyn ObjectStorage>,
        functions: Arc<dyn FunctionsApi>,
        token_source: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            template_builder,
            provider,
            storage,
            functions,
            token_source,
            options: ManagerOptions::default(),
            state: DeploymentState::Idle,
        }
    }

    pub fn with_options(mut self, options: ManagerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn state(&self) -> DeploymentState {
        self.state
    }

    /// Uploads the function sources and creates the function.
    pub async fn deploy(&mut self, name: &str) -> Result<(), ManagerError> {
        tracing::info!(%name, "Deploying function.");

        let (data, context) = self.prepare(name).await?;

        let mut executor = Executor::new();
        executor.add(EnsureStorageBucket::new(
            self.storage.clone(),
            self.provider.clone(),
        ));
        executor.add(UploadArtifact::new(
            self.storage.clone(),
            self.provider.clone(),
            data.artifact,
        ));
        executor.add(CreateFunction::new(
            self.functions.clone(),
            self.provider.location_name(),
            data.payload,
        ));

        self.run(name, executor, &context)
            .instrument(trace_span!("Deploy", %name))
            .await
    }

    /// Uploads the function sources and replaces the existing function.
    pub async fn update(&mut self, name: &str) -> Result<(), ManagerError> {
        tracing::info!(%name, "Updating function.");

        let (data, context) = self.prepare(name).await?;

        let mut executor = Executor::new();
        executor.add(EnsureStorageBucket::new(
            self.storage.clone(),
            self.provider.clone(),
        ));
        executor.add(UploadArtifact::new(
            self.storage.clone(),
            self.provider.clone(),
            data.artifact,
        ));
        executor.add(UpdateFunction::new(self.functions.clone(), data.payload));

        self.run(name, executor, &context)
            .instrument(trace_span!("Update", %name))
            .await
    }

    /// Deletes the function and its archive. Missing ones count as deleted.
    ///
    /// The bucket is shared by every function of the provider and stays.
    pub async fn remove(&mut self, name: &str) -> Result<(), ManagerError> {
        tracing::info!(%name, "Removing function.");

        let name = FunctionName::try_from(name)?;
        let name = name.as_str();
        let context = self.context().await?;

        let mut executor = Executor::new();
        executor.add(DeleteFunction::new(
            self.functions.clone(),
            self.provider.function_name(name),
        ));
        executor.add(DeleteArtifact::new(
            self.storage.clone(),
            self.provider.clone(),
            self.provider.artifact_key(name),
        ));

        self.state = DeploymentState::Removing;
        let result = executor
            .execute(&context)
            .instrument(trace_span!("Remove", %name))
            .await;

        match result {
            Ok(()) => {
                self.state = DeploymentState::Removed;
                tracing::info!(%name, "Function removed.");
                Ok(())
            }
            Err(failure) => {
                self.state = DeploymentState::Failed;
                tracing::error!(%name, error = %failure, "Failed to remove function.");
                Err(ManagerError::Removal(failure))
            }
        }
    }

    async fn prepare(&self, name: &str) -> Result<(FunctionData, ExecutionContext), ManagerError> {
        let data = self.template_builder.build(name).await?;
        let context = self.context().await?;
        Ok((data, context))
    }

    async fn context(&self) -> Result<ExecutionContext, ManagerError> {
        let credential = self.token_source.credential().await?;

        Ok(ExecutionContext::new(credential)
            .with_cancellation(self.options.cancellation.clone())
            .with_step_timeout(self.options.step_timeout)
            .with_poll_interval(self.options.poll_interval))
    }

    async fn run(
        &mut self,
        name: &str,
        mut executor: Executor,
        context: &ExecutionContext,
    ) -> Result<(), ManagerError> {
        self.state = DeploymentState::Deploying;

        match executor.run(context).await {
            Ok(()) => {
                self.state = DeploymentState::Deployed;
                tracing::info!(%name, "Function deployed.");
                Ok(())
            }
            Err(error) => {
                self.state = if error.needs_inspection() {
                    tracing::error!(
                        %name,
                        %error,
                        "Deployment failed and could not be rolled back."
                    );
                    DeploymentState::Failed
                } else {
                    tracing::error!(%name, %error, "Deployment rolled back.");
                    DeploymentState::RolledBack
                };
                Err(error.into())
            }
        }
    }
}
