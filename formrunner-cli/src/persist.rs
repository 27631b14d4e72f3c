use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use formrunner::{Document, DocumentStore, RunnerError};
use tracing::{info, warn};

/// Places to try after the original path is refused: a timestamped sibling,
/// then the same name in the system temp directory.
fn fallback_paths(path: &Path) -> Vec<PathBuf> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let ext = path
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "json".to_string());
    let name = format!("{stem}-{}.{ext}", Local::now().format("%Y%m%d%H%M%S"));

    let mut paths = Vec::with_capacity(2);
    if let Some(parent) = path.parent() {
        paths.push(parent.join(&name));
    }
    paths.push(std::env::temp_dir().join(name));
    paths
}

/// Save `document`, falling back to alternate locations when the target is
/// locked or not writable. Copies keep the other sheets of the original
/// workbook. Returns the path actually written.
pub fn save_with_fallback(
    store: &dyn DocumentStore,
    path: &Path,
    document: &Document,
) -> Result<PathBuf> {
    let first = match store.save(path, document) {
        Ok(()) => return Ok(path.to_path_buf()),
        Err(e) if e.is_persistence() => e,
        Err(e) => return Err(e).with_context(|| format!("saving {}", path.display())),
    };
    warn!(path = %path.display(), error = %first, "Save refused, trying alternate location");

    let mut last: RunnerError = first;
    for candidate in fallback_paths(path) {
        match store.save_as(path, &candidate, document) {
            Ok(()) => {
                info!(path = %candidate.display(), "Saved to alternate location");
                return Ok(candidate);
            }
            Err(e) => {
                warn!(path = %candidate.display(), error = %e, "Alternate save failed");
                last = e;
            }
        }
    }
    Err(last).with_context(|| format!("could not save {} or any fallback", path.display()))
}
