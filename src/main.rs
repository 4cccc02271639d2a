use anyhow::{Context, Result};
use clap::Parser;
use class_inventory::cli::Cli;
use class_inventory::config::InventoryConfig;
use class_inventory::pipeline::TaskFailure;
use class_inventory::{build_inventory, report};
use serde::Serialize;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize)]
struct RunSummary {
    root: String,
    discovered: usize,
    extracted: usize,
    failed: usize,
    tool_warnings: usize,
    collisions: usize,
    skipped_entries: usize,
    transcript_lines: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    transcript_error: Option<String>,
    report_path: String,
    log_path: String,
    duration_ms: u64,
    failures: Vec<TaskFailure>,
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = InventoryConfig::from_cli(&cli)?;
    let start = Instant::now();

    let inventory = build_inventory(&config)
        .with_context(|| format!("Failed to inventory {}", config.root.display()))?;
    report::write_report(&config.output, &inventory.records)?;

    let duration_ms = start.elapsed().as_millis() as u64;
    tracing::info!(path = %config.output.display(), "class information saved");
    tracing::info!(path = %config.log.display(), "javap output logged");
    let seconds = duration_ms as f64 / 1000.0;
    tracing::info!(seconds, "time taken");

    let summary = RunSummary {
        root: inventory.root.to_string_lossy().to_string(),
        discovered: inventory.discovered,
        extracted: inventory.stats.extracted,
        failed: inventory.stats.failures.len(),
        tool_warnings: inventory.stats.tool_warnings,
        collisions: inventory.stats.collisions,
        skipped_entries: inventory.skipped_entries,
        transcript_lines: inventory.transcript_lines,
        transcript_error: inventory.transcript_error,
        report_path: config.output.to_string_lossy().to_string(),
        log_path: config.log.to_string_lossy().to_string(),
        duration_ms,
        failures: inventory.stats.failures,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
