//! # class-inventory
//!
//! Builds a structural inventory of compiled Java classes by running `javap`
//! on every class file under a directory and scanning its text output.
//!
//! ## Architecture
//!
//! - **scan**: class file discovery and path-to-identity mapping
//! - **javap**: disassembler process invocation with timeout
//! - **extract**: method, field and dependency matchers over output lines
//! - **store**: concurrent identity-to-record map
//! - **transcript**: single-writer log of raw disassembler output
//! - **pipeline**: bounded worker pool running one task per class file
//! - **report**: pretty JSON result document
//! - **config**: settings resolved from the command line and environment

pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod javap;
pub mod pipeline;
pub mod report;
pub mod scan;
pub mod store;
pub mod transcript;

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::InventoryConfig;
use crate::error::InventoryError;
use crate::extract::{ArtifactRecord, Extractor};
use crate::pipeline::{Pipeline, RunStats};
use crate::store::AggregateStore;
use crate::transcript::LogSink;

#[derive(Debug)]
pub struct Inventory {
    pub root: PathBuf,
    pub discovered: usize,
    pub skipped_entries: usize,
    pub transcript_lines: u64,
    /// Set when the transcript log could not be written. The records are
    /// still complete.
    pub transcript_error: Option<String>,
    pub stats: RunStats,
    pub records: BTreeMap<String, ArtifactRecord>,
}

/// Discovers, extracts and aggregates. Writes the transcript log but not the
/// report. A log that cannot be opened is fatal; a write failure after the
/// run has started is reported in [`Inventory::transcript_error`].
pub fn build_inventory(config: &InventoryConfig) -> Result<Inventory, InventoryError> {
    let discovery = scan::scan_artifacts(&config.root, &config.extension)?;
    tracing::info!(
        root = %config.root.display(),
        artifacts = discovery.artifacts.len(),
        "discovered class files"
    );

    let sink = LogSink::open(&config.log, config.append_log).map_err(|source| {
        InventoryError::Transcript {
            path: config.log.clone(),
            source,
        }
    })?;
    let extractor = Extractor::new()?;
    let store = AggregateStore::new();
    let javap = config.javap();

    let stats = {
        let handle = sink.handle();
        let stages = Pipeline {
            root: &config.root,
            javap: &javap,
            extractor: &extractor,
            store: &store,
            transcript: &handle,
        };
        pipeline::run_tasks(&stages, &discovery.artifacts, config.jobs)?
    };

    let transcript_lines = sink.submitted_lines();
    let transcript_error = match sink.shutdown_and_flush() {
        Ok(_) => None,
        Err(err) => {
            tracing::error!(
                path = %config.log.display(),
                error = %err,
                "failed to write transcript log"
            );
            Some(err.to_string())
        }
    };

    Ok(Inventory {
        root: config.root.clone(),
        discovered: discovery.artifacts.len(),
        skipped_entries: discovery.skipped_entries,
        transcript_lines,
        transcript_error,
        stats,
        records: store.into_snapshot(),
    })
}
