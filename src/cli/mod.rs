//! CLI module for Themis
//!
//! Provides commands:
//! - `serve`: start the HTTP server
//! - `stats`: print a user's usage summary
//! - `quota`: print a user's evaluated quota state

use clap::{Parser, Subcommand};

pub mod quota;
pub mod stats;

/// Themis usage accounting CLI
#[derive(Parser, Debug)]
#[command(name = "themis")]
#[command(about = "Usage accounting and subscription quota service")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve,
    /// Print a usage summary for a user
    Stats {
        /// User to summarize
        #[arg(long)]
        user: String,
        /// Inclusive window start (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,
        /// Inclusive window end (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
        /// JSON output for scripting
        #[arg(long)]
        json: bool,
    },
    /// Print evaluated quota state for a user
    Quota {
        /// User to evaluate
        #[arg(long)]
        user: String,
        /// JSON output for scripting
        #[arg(long)]
        json: bool,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Serve) => crate::server::run().await,
        Some(Commands::Stats {
            user,
            from,
            to,
            json,
        }) => stats::run(&user, from.as_deref(), to.as_deref(), json).await,
        Some(Commands::Quota { user, json }) => quota::run(&user, json).await,
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}
