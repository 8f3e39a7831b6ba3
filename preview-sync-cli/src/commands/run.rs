//! Run command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use preview_sync_core::{SummaryReport, Synchronizer};
use tracing::info;

use super::{load_config, OutputFormat};

/// Execute the run command.
pub async fn execute(format: OutputFormat) -> Result<()> {
    let config = load_config()?;
    let synchronizer =
        Synchronizer::from_config(config).context("Failed to create synchronizer")?;

    let report = synchronizer.run().await.context("Sync run failed")?;
    info!(converted = report.converted, cleaned = report.cleaned, "Run finished");

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report),
    }
    Ok(())
}

fn print_report(report: &SummaryReport) {
    println!();
    println!("{}", "Sync complete".green().bold());
    println!();
    println!(
        "   {} {} source, {} preview records",
        "Listed:".dimmed(),
        report.total_source,
        report.total_target
    );
    println!("   {} {}", "Converted:".dimmed(), report.converted.to_string().green());
    println!("   {} {}", "Already processed:".dimmed(), report.already_processed);
    println!("   {} {}", "Cleaned:".dimmed(), report.cleaned);

    let problems = [
        ("Skipped:", report.skipped),
        ("Clean failed:", report.clean_failed),
        ("Payload too large:", report.payload_too_large),
        ("Failed inserts:", report.failed_inserts),
    ];
    for (label, count) in problems {
        if count > 0 {
            println!("   {} {}", label.dimmed(), count.to_string().yellow());
        }
    }
}
