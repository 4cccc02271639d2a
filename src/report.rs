use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::InventoryError;
use crate::extract::ArtifactRecord;

pub fn render_report(records: &BTreeMap<String, ArtifactRecord>) -> serde_json::Result<String> {
    serde_json::to_string_pretty(records)
}

/// Writes the pretty-printed report next to `path` and renames it into place.
pub fn write_report(
    path: &Path,
    records: &BTreeMap<String, ArtifactRecord>,
) -> Result<(), InventoryError> {
    let report_error = |source: io::Error| InventoryError::Report {
        path: path.to_path_buf(),
        source,
    };

    let mut content = render_report(records).map_err(|e| report_error(io::Error::other(e)))?;
    content.push('\n');

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(report_error)?;
    }

    let mut tmp_os = path.as_os_str().to_os_string();
    tmp_os.push(".tmp");
    let tmp = PathBuf::from(tmp_os);

    std::fs::write(&tmp, content).map_err(report_error)?;
    if let Err(err) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(report_error(err));
    }
    Ok(())
}
