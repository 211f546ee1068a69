//! auditsync - main entry point

use auditsync_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use auditsync_ingest::config::ConnectorConfig;
use auditsync_ingest::{commands, CheckpointCommand, Cli, Commands, Result};
use clap::Parser;
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Console output goes to stderr; stdout is reserved for events
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .output(LogOutput::Console)
        .log_file_prefix("auditsync")
        .build();

    // Environment variables take precedence
    let log_config = match log_config.merge_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: invalid logging configuration: {}", e);
            process::exit(2);
        },
    };

    let _guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {}", e);
            process::exit(2);
        },
    };

    if let Err(e) = execute_command(cli.command).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn execute_command(command: Commands) -> Result<()> {
    let config = ConnectorConfig::from_env()?;

    match command {
        Commands::Run { once } => commands::run::run(config, once).await,
        Commands::SaveToken { refresh_token } => {
            commands::save_token::run(config, &refresh_token).await
        },
        Commands::Validate => commands::validate::run(config).await,
        Commands::Checkpoint { command } => match command {
            CheckpointCommand::Show { source } => commands::checkpoint::show(config, &source).await,
        },
    }
}
