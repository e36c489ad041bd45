use anyhow::Result as AnyResult;
use clap::Parser;
use gcp_functions_deployer::{
    cli::{Cli, Commands, ConfigCommands, SchemaCommands},
    main_actions,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "gcp_functions_deployer=info,hyper=off,reqwest=off");
    }

    tracing_subscriber::fmt()
        .with_target(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_level(true)
        .with_ansi(true)
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    init_tracing();

    let cli = Cli::parse();

    let cancellation = CancellationToken::new();
    tokio::spawn(main_actions::cancel_on_ctrl_c(cancellation.clone()));

    match cli.command {
        Commands::Deploy { name, remote } => {
            let config = main_actions::read_config(&cli.config).await?;
            main_actions::deploy_function(config, name, remote, cancellation).await?;
        }
        Commands::Update { name, remote } => {
            let config = main_actions::read_config(&cli.config).await?;
            main_actions::update_function(config, name, remote, cancellation).await?;
        }
        Commands::Remove { name, remote } => {
            let config = main_actions::read_config(&cli.config).await?;
            main_actions::remove_function(config, name, remote, cancellation).await?;
        }
        Commands::Export { name, format, file } => {
            let config = main_actions::read_config(&cli.config).await?;
            main_actions::export_function(config, name, format, file).await?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Validate {} => {
                let config = main_actions::read_config(&cli.config).await?;
                main_actions::print_config_summary(&config);
            }
            ConfigCommands::Schema { command } => match command {
                SchemaCommands::Print {} => main_actions::print_config_schema()?,
                SchemaCommands::Write { file } => {
                    main_actions::write_config_schema_to_file(file).await?
                }
            },
        },
    }

    Ok(())
}
