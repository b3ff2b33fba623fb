//! Whole-file replacement through a sibling temp file.

use std::io::Write;
use std::path::Path;

use crate::error::{Result, StoreError};

/// Write `bytes` to a temp file next to `path`, then rename over it.
/// Readers see either the old content or the new, never a partial file.
pub(crate) fn replace_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| StoreError::Persist {
        path: path.display().to_string(),
        reason: e.error.to_string(),
    })?;
    Ok(())
}
