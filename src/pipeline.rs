//! Bounded-parallel fan-out of one extraction task per class file.
//!
//! Each task resolves the identity, runs the disassembler, scans its output
//! and stores the record. Task failures are reported and counted without
//! disturbing sibling tasks; [`run_tasks`] returns once every task is done.

use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{InventoryError, TaskError};
use crate::extract::{ArtifactRecord, Extractor};
use crate::javap::{Javap, ToolExit};
use crate::scan::artifact_identity;
use crate::store::AggregateStore;
use crate::transcript::{LogSinkHandle, TranscriptBlock};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TaskFailure {
    pub path: String,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub scheduled: usize,
    pub extracted: usize,
    pub tool_warnings: usize,
    pub collisions: usize,
    pub failures: Vec<TaskFailure>,
}

/// Borrowed collaborators shared by every task of one run.
pub struct Pipeline<'a> {
    pub root: &'a Path,
    pub javap: &'a Javap,
    pub extractor: &'a Extractor,
    pub store: &'a AggregateStore,
    pub transcript: &'a LogSinkHandle,
}

#[derive(Debug)]
pub struct TaskOutcome {
    pub identity: String,
    pub exit: ToolExit,
    pub replaced: Option<ArtifactRecord>,
}

#[derive(Default)]
struct Counters {
    extracted: AtomicUsize,
    tool_warnings: AtomicUsize,
    collisions: AtomicUsize,
    failures: Mutex<Vec<TaskFailure>>,
}

/// Runs every path on a pool of `jobs` threads (`0` picks rayon's default).
pub fn run_tasks(
    pipeline: &Pipeline<'_>,
    paths: &[PathBuf],
    jobs: usize,
) -> Result<RunStats, InventoryError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .thread_name(|i| format!("class-inventory-{i}"))
        .build()?;
    let counters = Counters::default();

    pool.install(|| {
        paths.par_iter().for_each(|path| {
            let worker = std::thread::current();
            tracing::debug!(
                thread = worker.name().unwrap_or("worker"),
                path = %path.display(),
                "processing"
            );

            match pipeline.process(path) {
                Ok(outcome) => {
                    counters.extracted.fetch_add(1, Ordering::Relaxed);
                    if !outcome.exit.success() {
                        counters.tool_warnings.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            path = %path.display(),
                            status = %outcome.exit.status,
                            stderr = outcome.exit.stderr.trim(),
                            "javap exited unsuccessfully, keeping partial output"
                        );
                    }
                    if outcome.replaced.is_some() {
                        counters.collisions.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            path = %path.display(),
                            identity = outcome.identity.as_str(),
                            "identity already recorded by another class file, overwriting"
                        );
                    }
                }
                Err(err) => {
                    tracing::error!(
                        path = %path.display(),
                        kind = err.kind(),
                        error = %err,
                        "failed to extract class file"
                    );
                    counters.failures.lock().push(TaskFailure {
                        path: path.to_string_lossy().into_owned(),
                        kind: err.kind(),
                        message: err.to_string(),
                    });
                }
            }
        });
    });

    let mut failures = counters.failures.into_inner();
    failures.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(RunStats {
        scheduled: paths.len(),
        extracted: counters.extracted.into_inner(),
        tool_warnings: counters.tool_warnings.into_inner(),
        collisions: counters.collisions.into_inner(),
        failures,
    })
}

impl Pipeline<'_> {
    /// One task. The transcript block is submitted even when the task fails
    /// part way through, so the log still shows what the tool printed.
    pub fn process(&self, path: &Path) -> Result<TaskOutcome, TaskError> {
        let identity = artifact_identity(self.root, path).ok_or_else(|| TaskError::Identity {
            path: path.to_path_buf(),
        })?;

        let mut block = TranscriptBlock::for_artifact(path);
        let result = self.disassemble(path, &mut block);
        self.transcript.append_block(block);

        let (record, exit) = result?;
        let replaced = self.store.put(identity.clone(), record);

        Ok(TaskOutcome {
            identity,
            exit,
            replaced,
        })
    }

    fn disassemble(
        &self,
        path: &Path,
        block: &mut TranscriptBlock,
    ) -> Result<(ArtifactRecord, ToolExit), TaskError> {
        let mut run = self.javap.spawn(path)?;
        let record = self.extractor.extract(run.by_ref(), block)?;
        let exit = run.finish()?;
        Ok((record, exit))
    }
}
