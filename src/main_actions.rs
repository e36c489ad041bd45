use crate::{
    cli::{ExportFormat, RemoteArgs},
    client::{FunctionsClient, StorageClient},
    config::{defs::Config, ValidatedConfig},
    credentials::{ChainTokenSource, Credential, EnvTokenSource, StaticTokenSource, TokenSource},
    manager::{DeploymentManager, ManagerOptions},
    registry::{ConfigRegistry, FunctionRegistry, RegisteredFunction},
    template::{
        deployment_manager::DeploymentManagerTemplateBuilder, package::ZipPackager,
        TemplateBuilder, TemplateRenderer,
    },
};
use anyhow::{Context, Result as AnyResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn read_config(path: &Path) -> AnyResult<ValidatedConfig> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config = Config::from_yaml_str(&raw).context("Invalid config")?;

    tracing::debug!(
        project_id = %config.provider.project_id,
        location = %config.provider.location,
        functions = config.functions.len(),
        "Config loaded."
    );

    Ok(config)
}

fn token_source(remote: &RemoteArgs) -> ChainTokenSource {
    let explicit = remote
        .access_token
        .clone()
        .map(Credential::AccessToken)
        .or_else(|| remote.api_key.clone().map(Credential::ApiKey));

    let sources: Vec<Box<dyn TokenSource>> = vec![
        Box::new(StaticTokenSource::new(explicit)),
        Box::new(EnvTokenSource),
    ];

    ChainTokenSource::new(sources)
}

fn create_manager(
    config: &ValidatedConfig,
    remote: &RemoteArgs,
    cancellation: CancellationToken,
) -> DeploymentManager {
    let provider = Arc::new(config.provider.clone());
    let registry: Arc<dyn FunctionRegistry> = Arc::new(ConfigRegistry::from(config));

    let root = config.package.root.clone().unwrap_or_else(|| PathBuf::from("."));
    let packager = ZipPackager::new(root).with_resources(config.package.resources.clone());

    let template_builder = TemplateBuilder::new(provider.clone(), registry, Arc::new(packager));

    DeploymentManager::new(
        template_builder,
        provider,
        Arc::new(StorageClient::new(remote.storage_api_url.clone())),
        Arc::new(FunctionsClient::new(remote.functions_api_url.clone())),
        Arc::new(token_source(remote)),
    )
    .with_options(ManagerOptions {
        cancellation,
        step_timeout: remote.step_timeout,
        poll_interval: remote.poll_interval,
    })
}

pub async fn deploy_function(
    config: ValidatedConfig,
    name: String,
    remote: RemoteArgs,
    cancellation: CancellationToken,
) -> AnyResult<()> {
    let mut manager = create_manager(&config, &remote, cancellation);

    manager.deploy(&name).await?;

    tracing::info!(%name, state = %manager.state(), "Done.");
    Ok(())
}

pub async fn update_function(
    config: ValidatedConfig,
    name: String,
    remote: RemoteArgs,
    cancellation: CancellationToken,
) -> AnyResult<()> {
    let mut manager = create_manager(&config, &remote, cancellation);

    manager.update(&name).await?;

    tracing::info!(%name, state = %manager.state(), "Done.");
    Ok(())
}

pub async fn remove_function(
    config: ValidatedConfig,
    name: String,
    remote: RemoteArgs,
    cancellation: CancellationToken,
) -> AnyResult<()> {
    let mut manager = create_manager(&config, &remote, cancellation);

    manager.remove(&name).await?;

    tracing::info!(%name, state = %manager.state(), "Done.");
    Ok(())
}

pub fn generate_template(
    config: &ValidatedConfig,
    name: &str,
    format: ExportFormat,
) -> AnyResult<String> {
    let provider = Arc::new(config.provider.clone());
    let registry: Arc<dyn FunctionRegistry> = Arc::new(ConfigRegistry::from(config));

    let renderer: Box<dyn TemplateRenderer> = match format {
        ExportFormat::Rest => {
            // Rendering never packages, the packager is only there to satisfy the builder.
            let packager = Arc::new(ZipPackager::default());
            Box::new(TemplateBuilder::new(provider, registry, packager))
        }
        ExportFormat::DeploymentManager => {
            Box::new(DeploymentManagerTemplateBuilder::new(provider, registry))
        }
    };

    renderer
        .raw_template(name)
        .with_context(|| format!("Failed to export function {name}"))
}

pub async fn export_function(
    config: ValidatedConfig,
    name: String,
    format: ExportFormat,
    file: Option<PathBuf>,
) -> AnyResult<()> {
    let template = generate_template(&config, &name, format)?;

    match file {
        Some(file) => {
            tokio::fs::write(&file, template)
                .await
                .context("Failed to write template to file")?;
            tracing::info!(%name, file = %file.display(), "Template written.");
        }
        None => println!("{template}"),
    }

    Ok(())
}

pub fn print_config_summary(config: &ValidatedConfig) {
    let registry = ConfigRegistry::from(config);

    println!(
        "Project {} in {}, archives stored in gs://{}",
        config.provider.project_id, config.provider.location, config.provider.function_storage
    );

    for entry in &config.functions {
        let status = if !entry.enabled {
            "disabled"
        } else {
            match registry.find_function(entry.name.as_str()) {
                Some(RegisteredFunction::Configured(_)) => "enabled",
                _ => "unsupported type",
            }
        };
        println!("  {} ({}): {}", entry.name, entry.kind, status);
    }
}

pub fn print_config_schema() -> AnyResult<()> {
    println!(
        "{}",
        Config::json_schema().context("Failed to generate schema")?
    );
    Ok(())
}

pub async fn write_config_schema_to_file(path: PathBuf) -> AnyResult<()> {
    let schema = Config::json_schema().context("Failed to generate schema")?;
    tokio::fs::write(path, schema)
        .await
        .context("Failed to write schema to file")?;
    Ok(())
}

/// Cancels the running action on Ctrl-C. Completed steps are then rolled back.
pub async fn cancel_on_ctrl_c(cancellation: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::warn!("Received Ctrl-C. Cancelling, completed steps will be rolled back.");
            cancellation.cancel();
        }
        Err(error) => tracing::error!(%error, "Failed to listen for Ctrl-C."),
    }
}
