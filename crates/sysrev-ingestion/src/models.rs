//! Shared ingestion data models.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One input PDF. `id` is the bare filename and is the key used for
/// output rows and resume checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub path: PathBuf,
}

impl Document {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { id, path }
    }

    pub fn in_folder(folder: &Path, filename: &str) -> Self {
        Self { id: filename.to_string(), path: folder.join(filename) }
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

/// Resolve the batch: names from `files_list` (one per line, blanks and
/// `#` comments ignored) when that file exists, else every `*.pdf` in
/// `folder`, sorted by name.
pub fn select_documents(folder: &Path, files_list: Option<&Path>) -> anyhow::Result<Vec<Document>> {
    use anyhow::Context;

    if let Some(list) = files_list.filter(|p| p.is_file()) {
        let content = std::fs::read_to_string(list)
            .with_context(|| format!("reading file list {}", list.display()))?;
        let docs = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(|name| Document::in_folder(folder, name))
            .collect();
        return Ok(docs);
    }

    let mut docs: Vec<Document> = std::fs::read_dir(folder)
        .with_context(|| format!("listing PDF folder {}", folder.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension().map(|e| e.eq_ignore_ascii_case("pdf")).unwrap_or(false)
        })
        .map(Document::from_path)
        .collect();
    docs.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(docs)
}
