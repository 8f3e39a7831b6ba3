//! preview-sync - reconcile original images with their WebP previews.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;

use commands::OutputFormat;
use exit_codes::ExitCode;

#[derive(Parser)]
#[command(name = "preview-sync")]
#[command(author, version, about = "Keep WebP previews in sync with original images", long_about = None)]
#[command(after_help = "Exit codes:\n  0   Success\n  1   General error\n  69  Backend unavailable\n  78  Configuration error")]
struct Cli {
    /// Log progress to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one full synchronization
    Run {
        /// Output format for the summary
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show what a run would do without changing anything
    Plan {
        /// Output format for the plan
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print the resolved configuration (API key redacted)
    Config {
        /// Output format for the configuration
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "preview_sync_core=info,info"
    } else {
        "preview_sync_core=warn,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Run { format } => commands::run::execute(format).await,
        Commands::Plan { format } => commands::plan::execute(format).await,
        Commands::Config { format } => commands::config::execute(format),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit = match dispatch(cli.command).await {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };

    if let Some(message) = &exit.message {
        eprintln!("{} {}", "error:".red().bold(), message);
    }
    std::process::exit(exit.code);
}
