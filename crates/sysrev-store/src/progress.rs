//! Screening checkpoint file.
//!
//! `{timestamp, processed_count, results}` as JSON. Saved every few
//! documents, reloaded at startup to skip finished work, removed once the
//! batch completes.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::atomic::replace_file;
use crate::error::Result;
use crate::screening::ScreeningRow;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub timestamp: DateTime<Utc>,
    pub processed_count: usize,
    pub results: Vec<ScreeningRow>,
}

#[derive(Debug, Clone)]
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Previously checkpointed rows. An unreadable file is logged and
    /// treated as no progress; it never stops a run.
    pub fn load(&self) -> Vec<ScreeningRow> {
        if !self.path.exists() {
            return Vec::new();
        }
        let parsed = std::fs::read_to_string(&self.path)
            .map_err(|e| e.to_string())
            .and_then(|s| serde_json::from_str::<Checkpoint>(&s).map_err(|e| e.to_string()));
        match parsed {
            Ok(cp) => {
                info!(path = %self.path.display(), processed = cp.results.len(), saved_at = %cp.timestamp,
                    "Resuming from checkpoint");
                cp.results
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not load progress file, starting fresh");
                Vec::new()
            }
        }
    }

    pub fn save(&self, results: &[ScreeningRow]) -> Result<()> {
        let cp = Checkpoint {
            timestamp: Utc::now(),
            processed_count: results.len(),
            results: results.to_vec(),
        };
        replace_file(&self.path, serde_json::to_string_pretty(&cp)?.as_bytes())
    }

    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
