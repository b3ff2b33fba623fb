//! Subcommand drivers: build the components from `Config` and run a batch.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use sysrev_ingestion::sources::table::TableLimits;
use sysrev_ingestion::{
    select_documents, BatchOptions, DoclingClient, Document, ExtractionPipeline, PromptBuilder, Screener,
    TableSource, TextSource,
};
use sysrev_llm::{build_backend, LlmRouter};
use sysrev_merge::{ExtractionRecord, FieldSchema, Normaliser};
use sysrev_store::{
    decision_summary, processed_filenames, processed_ids, read_records, write_records, write_screening, ProgressStore, ScreeningRow,
};
use tracing::{debug, info, warn};

use crate::config::Config;

fn progress_bar(len: usize) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template("{spinner} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map(|s| s.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

fn build_router(config: &Config) -> Result<Arc<LlmRouter>> {
    let backend = build_backend(&config.backend_config()?).context("building LLM backend")?;
    info!(provider = backend.provider(), model = backend.model_id(), "LLM backend ready");
    Ok(Arc::new(
        LlmRouter::new(backend)
            .with_retry(config.retry_policy())
            .with_generation(config.llm.max_tokens, config.llm.temperature),
    ))
}

/// Selected documents not in `done`. With `skip_missing`, files that are not
/// on disk are reported and dropped.
fn pending_documents(config: &Config, done: &HashSet<String>, skip_missing: bool) -> Result<Vec<Document>> {
    let docs = select_documents(&config.run.pdf_folder, config.run.files_list.as_deref())?;
    let total = docs.len();
    let pending: Vec<_> = docs
        .into_iter()
        .filter(|d| !done.contains(&d.id))
        .filter(|d| {
            if !skip_missing {
                return true;
            }
            let exists = d.exists();
            if !exists {
                warn!(document = %d.id, folder = %config.run.pdf_folder.display(), "PDF not found, skipping");
            }
            exists
        })
        .collect();
    info!(selected = total, already_done = done.len(), pending = pending.len(), "Documents selected");
    Ok(pending)
}

// ── extract ───────────────────────────────────────────────────────────────────

pub async fn extract(config: &Config, stop: Arc<AtomicBool>) -> Result<()> {
    let schema = Arc::new(config.schema()?);
    let router = build_router(config)?;
    let prompts = Arc::new(PromptBuilder::new()?);

    let docling = DoclingClient::new(
        Some(&config.docling.base_url),
        Duration::from_secs(config.docling.timeout_secs),
    )?;
    match docling.health_check().await {
        Ok(true) => info!(url = docling.base_url(), "Docling service healthy"),
        Ok(false) | Err(_) => warn!(
            url = docling.base_url(),
            "Docling service not reachable; documents will fall back to text-only extraction"
        ),
    }

    let table = TableSource::new(Arc::new(docling), router.clone(), prompts.clone(), schema.clone())
        .with_limits(TableLimits {
            paper_chars: config.docling.max_paper_chars,
            table_chars: config.docling.max_table_chars,
        });
    let text = TextSource::new(router, prompts, schema.clone()).with_max_chars(config.llm.max_input_chars);
    let pipeline = ExtractionPipeline::new(
        schema.clone(),
        Normaliser::with_extra_missing(&config.normaliser.extra_missing),
        Arc::new(table),
        Arc::new(text),
    );

    let output = &config.run.output_csv;
    let done = processed_ids(output)?;
    let docs = pending_documents(config, &done, true)?;
    if docs.is_empty() {
        info!(output = %output.display(), "Nothing to extract");
        return Ok(());
    }
    // Prior rows are rewritten with the new ones, so they must match the schema.
    let prior = read_records(output, &schema)
        .with_context(|| format!("reading previous results from {}", output.display()))?;

    let bar = progress_bar(docs.len());
    let opts = BatchOptions {
        concurrency: config.run.concurrency,
        rate_limit_delay: config.rate_limit_delay(),
        stop,
    };
    let new = pipeline
        .run_batch(&docs, &opts, |record| {
            bar.set_message(record.document_id.clone());
            bar.inc(1);
        })
        .await;
    bar.finish_and_clear();

    log_extraction_summary(&new);
    let mut all = prior;
    all.extend(new);
    write_records(output, &schema, &all)?;
    info!(rows = all.len(), output = %output.display(), "Extraction results saved");
    Ok(())
}

fn log_extraction_summary(records: &[ExtractionRecord]) {
    if records.is_empty() {
        return;
    }
    let mut by_method: BTreeMap<&str, usize> = BTreeMap::new();
    for r in records {
        *by_method.entry(r.method.as_str()).or_default() += 1;
    }
    let mean_quality = records.iter().map(|r| r.quality).sum::<f64>() / records.len() as f64;
    for (method, count) in by_method {
        info!(method, count, "Extraction method");
    }
    info!(documents = records.len(), mean_quality = format!("{mean_quality:.3}"), "Extraction batch complete");
}

// ── screen ────────────────────────────────────────────────────────────────────

pub async fn screen(config: &Config, stop: Arc<AtomicBool>) -> Result<()> {
    let router = build_router(config)?;
    let prompts = PromptBuilder::new()?
        .with_criteria(config.screening.inclusion.clone(), config.screening.exclusion.clone());
    let screener = Screener::new(router, &prompts)?.with_max_chars(config.llm.max_input_chars);

    let progress = ProgressStore::new(&config.run.progress_file);
    let mut results = progress.load();
    if !results.is_empty() {
        info!(resumed = results.len(), checkpoint = %progress.path().display(), "Resuming from checkpoint");
    }
    // Missing files still get a File Error row.
    let docs = pending_documents(config, &processed_filenames(&results), false)?;

    let bar = progress_bar(docs.len());
    let delay = config.rate_limit_delay();
    let mut interrupted = false;
    for (i, doc) in docs.iter().enumerate() {
        if stop.load(Ordering::Relaxed) {
            interrupted = true;
            break;
        }
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        bar.set_message(doc.id.clone());
        results.push(screener.screen_document(doc).await);
        bar.inc(1);

        if (i + 1) % config.run.checkpoint_every == 0 {
            progress.save(&results)?;
            debug!(processed = results.len(), "Checkpoint saved");
        }
    }
    bar.finish_and_clear();

    let output = config.screening_csv();
    write_screening(&output, &results)?;
    info!(rows = results.len(), output = %output.display(), "Screening results saved");

    if interrupted {
        progress.save(&results)?;
        info!(checkpoint = %progress.path().display(), "Stopped early, checkpoint kept");
    } else {
        progress.clear()?;
    }
    log_decision_summary(&results);
    Ok(())
}

fn log_decision_summary(rows: &[ScreeningRow]) {
    let total = rows.len().max(1) as f64;
    for (decision, count) in decision_summary(rows) {
        info!(
            decision = %decision,
            count,
            percent = format!("{:.1}", count as f64 * 100.0 / total),
            "Screening decisions"
        );
    }
}

// ── fields ────────────────────────────────────────────────────────────────────

pub fn fields(config: &Config) -> Result<()> {
    print!("{}", render_fields(&config.schema()?));
    Ok(())
}

fn render_fields(schema: &FieldSchema) -> String {
    let mut out = format!("{:<30} {:<20} {:<8} {:<14} {}\n", "NAME", "SECTION", "PREFER", "TYPE", "LABEL");
    for f in schema.fields() {
        out.push_str(&format!(
            "{:<30} {:<20} {:<8} {:<14} {}\n",
            f.name,
            f.section.heading(),
            format!("{:?}", f.preferred_source).to_uppercase(),
            f.value_type.as_str(),
            f.label,
        ));
    }
    out
}
