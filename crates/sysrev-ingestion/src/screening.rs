//! Full-text include/exclude screening.

use std::sync::Arc;

use sysrev_llm::{LlmRequest, LlmRouter};
use sysrev_store::{Decision, ScreeningRow};
use tracing::{info, instrument, warn};

use crate::metadata::{find_year_now, resolve_title};
use crate::models::Document;
use crate::pdf_parser::{load_pdf_text, PdfText};
use crate::prompts::PromptBuilder;
use crate::response::parse_screening_decision;
use crate::sources::truncate_chars;

/// Below this many characters the PDF is assumed to be scanned or broken.
pub const MIN_TEXT_CHARS: usize = 100;

const SCREENING_MAX_TOKENS: u32 = 400;

pub struct Screener {
    router: Arc<LlmRouter>,
    system_prompt: String,
    max_chars: usize,
}

impl Screener {
    pub fn new(router: Arc<LlmRouter>, prompts: &PromptBuilder) -> anyhow::Result<Self> {
        let max_chars = router.max_input_chars();
        Ok(Self {
            router,
            system_prompt: prompts.screening_system()?,
            max_chars,
        })
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars.min(self.router.max_input_chars());
        self
    }

    /// Screen one PDF. Every failure is reported in the row itself.
    #[instrument(skip(self, doc), fields(document = %doc.id))]
    pub async fn screen_document(&self, doc: &Document) -> ScreeningRow {
        if !doc.exists() {
            warn!(path = %doc.path.display(), "PDF not found");
            let folder = doc.path.parent().map(|p| p.display().to_string()).unwrap_or_default();
            return ScreeningRow::new(
                &doc.id,
                "File Not Found",
                "Error",
                Decision::FileError,
                format!("File {} not found in {}", doc.id, folder),
            );
        }

        match load_pdf_text(doc.path.clone()).await {
            Ok(pdf) => self.screen_text(&doc.id, &pdf).await,
            Err(e) => {
                warn!(error = %e, "PDF text extraction failed");
                ScreeningRow::new(
                    &doc.id,
                    "Extraction Error",
                    "Extraction Error",
                    Decision::ExtractionError,
                    format!("Error: Failed to process PDF - {e:#}"),
                )
            }
        }
    }

    /// Screen already extracted text.
    pub async fn screen_text(&self, document_id: &str, pdf: &PdfText) -> ScreeningRow {
        let title = resolve_title(pdf.info_title.as_deref(), pdf.first_page());
        let year = find_year_now(pdf.first_page());
        let text = pdf.full_text();

        if text.trim().chars().count() < MIN_TEXT_CHARS {
            return ScreeningRow::new(
                document_id,
                title,
                year,
                Decision::ExtractionError,
                "Warning: Very little text extracted. PDF may be image-based or corrupted.",
            );
        }

        let req = LlmRequest::user(truncate_chars(&text, self.max_chars))
            .with_system(self.system_prompt.clone())
            .with_max_tokens(SCREENING_MAX_TOKENS)
            .with_temperature(0.0);

        let provider = self.router.backend().provider();
        let (decision, justification) = match self.router.complete(Some(document_id), "screening", req).await {
            Ok(resp) => parse_screening_decision(&resp.content, provider),
            Err(e) => (Decision::ApiError, format!("{provider} API error: {e}")),
        };

        info!(decision = %decision, "Document screened");
        ScreeningRow::new(document_id, title, year, decision, justification)
    }
}
