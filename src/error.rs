use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures that end the whole run.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("cannot read scan root {}: {source}", path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write transcript log {}: {source}", path.display())]
    Transcript {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write report {}: {source}", path.display())]
    Report {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("invalid extraction pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Failures isolated to a single artifact. The scheduler reports these and
/// moves on.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("failed to start {program}: {source}")]
    ToolInvocation {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to read disassembly output: {0}")]
    ExtractionIo(#[source] io::Error),

    #[error("disassembler did not finish within {0:?}")]
    Timeout(Duration),

    #[error("{} is not under the scan root", path.display())]
    Identity { path: PathBuf },
}

impl TaskError {
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::ToolInvocation { .. } => "ToolInvocationError",
            TaskError::ExtractionIo(_) => "ExtractionIOError",
            TaskError::Timeout(_) => "ToolTimeout",
            TaskError::Identity { .. } => "IdentityError",
        }
    }
}
