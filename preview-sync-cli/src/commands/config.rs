//! Config command implementation.

use anyhow::Result;
use colored::Colorize;
use preview_sync_core::SyncConfig;
use serde_json::json;

use super::{load_config, OutputFormat};

const REDACTED: &str = "[REDACTED]";

/// Execute the config command.
pub fn execute(format: OutputFormat) -> Result<()> {
    let config = load_config()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&to_json(&config))?),
        OutputFormat::Text => print_config(&config),
    }
    Ok(())
}

fn to_json(config: &SyncConfig) -> serde_json::Value {
    json!({
        "endpoint": config.endpoint,
        "projectId": config.project_id,
        "apiKey": REDACTED,
        "databaseId": config.database_id,
        "sourceBucketId": config.source.bucket_id,
        "sourceCollectionId": config.source.collection_id,
        "targetBucketId": config.target.bucket_id,
        "targetCollectionId": config.target.collection_id,
        "pageSize": config.page_size,
        "previewWidth": config.preview.width,
        "previewQuality": config.preview.quality,
        "maxPayloadBytes": config.max_payload_bytes,
        "timeoutSecs": config.timeout.as_secs(),
    })
}

fn print_config(config: &SyncConfig) {
    let source = match &config.source.collection_id {
        Some(collection) => format!("collection {collection}, bucket {}", config.source.bucket_id),
        None => format!("bucket {} (file names)", config.source.bucket_id),
    };

    println!("   {} {}", "Endpoint:".dimmed(), config.endpoint);
    println!("   {} {}", "Project:".dimmed(), config.project_id);
    println!("   {} {}", "API key:".dimmed(), REDACTED);
    println!("   {} {}", "Database:".dimmed(), config.database_id);
    println!("   {} {}", "Source:".dimmed(), source);
    println!(
        "   {} collection {}, bucket {}",
        "Target:".dimmed(),
        config.target.collection_id,
        config.target.bucket_id
    );
    println!(
        "   {} {}px wide, quality {}",
        "Preview:".dimmed(),
        config.preview.width,
        config.preview.quality
    );
    println!("   {} {}", "Page size:".dimmed(), config.page_size);
    println!("   {} {}s", "Timeout:".dimmed(), config.timeout.as_secs());
}
