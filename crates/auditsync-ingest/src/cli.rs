//! Command-line definition

use clap::{Parser, Subcommand};

/// auditsync - incremental audit-log ingestion
#[derive(Parser, Debug)]
#[command(name = "auditsync")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll every configured source
    Run {
        /// Run a single tick per source and exit
        #[arg(long)]
        once: bool,
    },

    /// Exchange a refresh token and store the resulting credential pair
    SaveToken {
        /// Refresh token issued by the audit-log provider
        #[arg(long, env = "AUDITSYNC_REFRESH_TOKEN", hide_env_values = true)]
        refresh_token: String,
    },

    /// Check the sources file without contacting the API
    Validate,

    /// Inspect persisted progress
    Checkpoint {
        #[command(subcommand)]
        command: CheckpointCommand,
    },
}

/// Checkpoint subcommands
#[derive(Subcommand, Debug)]
pub enum CheckpointCommand {
    /// Show the checkpoint stored for a source
    Show {
        /// Source name
        source: String,
    },
}
