//! Plan command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use preview_sync_core::{SyncPlan, Synchronizer};

use super::{load_config, OutputFormat};

/// Execute the plan command. Lists and checks files, never writes.
pub async fn execute(format: OutputFormat) -> Result<()> {
    let config = load_config()?;
    let synchronizer =
        Synchronizer::from_config(config).context("Failed to create synchronizer")?;

    let plan = synchronizer.plan().await.context("Failed to compute plan")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        OutputFormat::Text => print_plan(&plan),
    }
    Ok(())
}

fn print_plan(plan: &SyncPlan) {
    println!();
    if plan.is_noop() {
        println!("{}", "Nothing to do".green().bold());
    } else {
        println!("{}", "Pending changes".yellow().bold());
    }
    println!();
    println!(
        "   {} {} source, {} preview records ({} up to date)",
        "Listed:".dimmed(),
        plan.total_source,
        plan.total_target,
        plan.already_processed
    );

    if !plan.to_process.is_empty() {
        println!();
        println!("   {}", "Generate:".dimmed());
        for source in &plan.to_process {
            println!("     {} {}", "+".green(), source.image_id);
        }
    }

    if !plan.to_clean.is_empty() {
        println!();
        println!("   {}", "Delete:".dimmed());
        for orphan in &plan.to_clean {
            println!(
                "     {} {} ({})",
                "-".red(),
                orphan.record.id,
                orphan.reason
            );
        }
    }
}
