use ignore::WalkBuilder;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;

use crate::error::InventoryError;

pub const DEFAULT_EXTENSION: &str = "class";

#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub artifacts: Vec<PathBuf>,
    pub skipped_entries: usize,
}

/// Recursively collects regular files under `root` whose extension is
/// `extension`, including symlinks that resolve to one. The result is sorted so runs over the same tree schedule the
/// same list.
pub fn scan_artifacts(root: &Path, extension: &str) -> Result<Discovery, InventoryError> {
    std::fs::read_dir(root).map_err(|source| InventoryError::Discovery {
        path: root.to_path_buf(),
        source,
    })?;

    let (tx, rx) = mpsc::channel();
    let skipped = Arc::new(AtomicUsize::new(0));
    let extension = extension.to_string();

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .ignore(false)
        .parents(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .build_parallel();

    walker.run(|| {
        let tx = tx.clone();
        let skipped = Arc::clone(&skipped);
        let extension = extension.clone();
        Box::new(move |entry| {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    // Symlinked files are followed; symlinked directories are not.
                    let is_file = entry.file_type().is_some_and(|t| t.is_file())
                        || (entry.path_is_symlink() && path.is_file());
                    if is_file && path.extension().is_some_and(|e| e == extension.as_str()) {
                        let _ = tx.send(path.to_path_buf());
                    }
                }
                Err(err) => {
                    skipped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(error = %err, "skipping unreadable entry");
                }
            }
            ignore::WalkState::Continue
        })
    });

    drop(tx);
    let mut artifacts: Vec<PathBuf> = rx.iter().collect();
    artifacts.sort();

    Ok(Discovery {
        artifacts,
        skipped_entries: skipped.load(Ordering::Relaxed),
    })
}

/// Maps `root/com/example/Widget.class` to `com.example.Widget`.
///
/// Returns `None` when `path` is not below `root` or has no file name.
pub fn artifact_identity(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let stem = relative.file_stem()?.to_string_lossy();

    let mut segments: Vec<String> = Vec::new();
    if let Some(parent) = relative.parent() {
        for component in parent.components() {
            match component {
                Component::Normal(part) => segments.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => return None,
            }
        }
    }
    segments.push(stem.into_owned());

    Some(segments.join("."))
}
