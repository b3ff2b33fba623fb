//! Hybrid extraction pipeline.
//!
//! Per document:
//!   1. Run the table and the text adapters concurrently
//!   2. Normalise each candidate set against the schema
//!   3. Merge field by field and assemble one record
//!
//! Adapter failures are recorded in the record's notes and treated as "no
//! data from that source". A document always yields a record.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use sysrev_common::SysrevError;
use sysrev_merge::{assemble, merge, ExtractionMethod, ExtractionRecord, FieldSchema, Normaliser, RawCandidate};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::models::Document;
use crate::sources::SourceAdapter;

// ── Batch options ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Documents in flight at once.
    pub concurrency: usize,
    /// Minimum gap between two document starts.
    pub rate_limit_delay: Duration,
    /// Once set, no further documents are started.
    pub stop: Arc<AtomicBool>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 2,
            rate_limit_delay: Duration::from_secs(5),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

pub struct ExtractionPipeline {
    schema: Arc<FieldSchema>,
    normaliser: Normaliser,
    table: Arc<dyn SourceAdapter>,
    text: Arc<dyn SourceAdapter>,
}

impl ExtractionPipeline {
    pub fn new(
        schema: Arc<FieldSchema>,
        normaliser: Normaliser,
        table: Arc<dyn SourceAdapter>,
        text: Arc<dyn SourceAdapter>,
    ) -> Self {
        Self { schema, normaliser, table, text }
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    fn accept(
        &self,
        doc: &Document,
        result: Result<Vec<RawCandidate>, SysrevError>,
        notes: &mut Vec<String>,
    ) -> Option<Vec<RawCandidate>> {
        match result {
            Ok(raws) => Some(raws),
            Err(e) => {
                warn!(document = %doc.id, error = %e, "Extraction source produced no data");
                notes.push(e.to_string());
                None
            }
        }
    }

    /// Extract, merge and assemble one document.
    #[instrument(skip(self, doc), fields(document = %doc.id))]
    pub async fn process_document(&self, doc: &Document) -> ExtractionRecord {
        if !doc.exists() {
            warn!(path = %doc.path.display(), "PDF not found");
            return ExtractionRecord::failed(&self.schema, &doc.id, format!("file not found: {}", doc.path.display()));
        }

        let (table_res, text_res) = tokio::join!(self.table.extract(doc), self.text.extract(doc));

        let mut notes = Vec::new();
        let table_raw = self.accept(doc, table_res, &mut notes);
        let text_raw = self.accept(doc, text_res, &mut notes);
        let method = ExtractionMethod::from_availability(table_raw.is_some(), text_raw.is_some());
        if method == ExtractionMethod::Failed {
            return ExtractionRecord::failed(&self.schema, &doc.id, notes.join("; "));
        }

        let table = self.normaliser.normalise_all(&self.schema, table_raw.as_deref().unwrap_or_default());
        let text = self.normaliser.normalise_all(&self.schema, text_raw.as_deref().unwrap_or_default());
        let record = assemble(&doc.id, merge(&self.schema, &table, &text))
            .with_method(method)
            .with_notes(notes.join("; "));

        info!(
            method = %record.method,
            resolved = record.resolved_count(),
            fields = record.fields.len(),
            quality = record.quality,
            "Document extracted"
        );
        record
    }

    /// Process a batch with bounded concurrency. Records come back in input
    /// order; `on_done` sees each one as it finishes.
    #[instrument(skip_all, fields(documents = docs.len(), concurrency = opts.concurrency))]
    pub async fn run_batch<F>(&self, docs: &[Document], opts: &BatchOptions, mut on_done: F) -> Vec<ExtractionRecord>
    where
        F: FnMut(&ExtractionRecord),
    {
        let last_start: Mutex<Option<Instant>> = Mutex::new(None);
        let last_start = &last_start;

        let mut pending = stream::iter(docs.iter().enumerate())
            .map(|(index, doc)| async move {
                {
                    let mut last = last_start.lock().await;
                    if let Some(prev) = *last {
                        tokio::time::sleep_until(prev + opts.rate_limit_delay).await;
                    }
                    if opts.stop.load(Ordering::Relaxed) {
                        return None;
                    }
                    *last = Some(Instant::now());
                }
                Some((index, self.process_document(doc).await))
            })
            .buffer_unordered(opts.concurrency.max(1));

        let mut done = Vec::with_capacity(docs.len());
        while let Some(item) = pending.next().await {
            if let Some((index, record)) = item {
                on_done(&record);
                done.push((index, record));
            }
        }

        if done.len() < docs.len() {
            info!(processed = done.len(), skipped = docs.len() - done.len(), "Batch stopped early");
        }
        done.sort_by_key(|(index, _)| *index);
        done.into_iter().map(|(_, record)| record).collect()
    }
}
