use crate::{
    config::units::parse_positive_duration,
    consts::{
        CONFIG_DEFAULT_PATH, CONFIG_PATH_ENV_VAR, FUNCTIONS_API_DEFAULT_URL,
        FUNCTIONS_API_URL_ENV_VAR, STORAGE_API_DEFAULT_URL, STORAGE_API_URL_ENV_VAR,
    },
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The path to the functions configuration file
    #[clap(short, long, global = true, env = CONFIG_PATH_ENV_VAR, default_value = CONFIG_DEFAULT_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Packages, uploads and creates a function
    /// Completed steps are rolled back if a later step fails
    #[clap(visible_alias = "d")]
    Deploy {
        /// The name of the function as declared in the configuration
        name: String,
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Packages, uploads and replaces an existing function
    #[clap(visible_alias = "u")]
    Update {
        /// The name of the function as declared in the configuration
        name: String,
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Deletes a function and its archive
    /// Nothing is rolled back, already deleted resources are skipped
    #[clap(visible_alias = "rm")]
    Remove {
        /// The name of the deployed function
        name: String,
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Renders what would be deployed, without packaging or calling any API
    #[clap(visible_alias = "e")]
    Export {
        /// The name of the function as declared in the configuration
        name: String,
        /// The format of the exported template
        #[clap(short = 't', long, value_enum, default_value_t = ExportFormat::default())]
        format: ExportFormat,
        /// The path to the file to write the template to
        /// Prints to stdout if not set
        #[clap(short, long)]
        file: Option<PathBuf>,
    },
    /// Configuration commands
    #[clap(visible_alias = "c")]
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    /// Cloud Functions REST API request body
    #[default]
    Rest,
    /// Cloud Deployment Manager configuration
    DeploymentManager,
}

#[derive(Args, Debug, Clone)]
pub struct RemoteArgs {
    /// The URL of the Cloud Functions API
    #[clap(long, env = FUNCTIONS_API_URL_ENV_VAR, default_value = FUNCTIONS_API_DEFAULT_URL)]
    pub functions_api_url: Url,
    /// The URL of the Cloud Storage API
    #[clap(long, env = STORAGE_API_URL_ENV_VAR, default_value = STORAGE_API_DEFAULT_URL)]
    pub storage_api_url: Url,
    /// OAuth access token, takes precedence over the API key
    /// Falls back to GOOGLE_OAUTH_ACCESS_TOKEN
    #[clap(long)]
    pub access_token: Option<String>,
    /// API key
    /// Falls back to GOOGLE_CLOUD_PLATFORM_API_KEY
    #[clap(long)]
    pub api_key: Option<String>,
    /// Fails a step that takes longer than this, e.g. `5m`
    #[clap(long, value_parser = parse_positive_duration)]
    pub step_timeout: Option<Duration>,
    /// Time between two checks of a long-running operation
    #[clap(long, value_parser = parse_positive_duration, default_value = "2s")]
    pub poll_interval: Duration,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validates the configuration file and lists its functions
    #[clap(visible_alias = "v")]
    Validate {},
    /// JSON schema of the configuration file
    #[clap(visible_alias = "s")]
    Schema {
        #[command(subcommand)]
        command: SchemaCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum SchemaCommands {
    /// Prints the schema to stdout
    #[clap(visible_alias = "p")]
    Print {},
    /// Writes the schema to a file
    #[clap(visible_alias = "w")]
    Write {
        /// The path to the file to write the schema to
        #[clap(short, long)]
        file: PathBuf,
    },
}
