pub mod config;
pub mod plan;
pub mod run;

use anyhow::{Context, Result};
use clap::ValueEnum;
use preview_sync_core::SyncConfig;

/// How command results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable, colored
    Text,
    /// One JSON document on stdout
    Json,
}

/// Load configuration from the environment.
pub fn load_config() -> Result<SyncConfig> {
    SyncConfig::from_env().context("Failed to load configuration")
}
