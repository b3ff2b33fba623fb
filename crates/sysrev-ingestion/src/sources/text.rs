//! Full-text extraction from the locally parsed PDF.

use std::sync::Arc;

use async_trait::async_trait;
use sysrev_common::SysrevError;
use sysrev_llm::{LlmRequest, LlmRouter};
use sysrev_merge::{FieldSchema, RawCandidate, SourceTag};
use tracing::{debug, instrument};

use super::{truncate_chars, unavailable, SourceAdapter};
use crate::models::Document;
use crate::pdf_parser::load_pdf_text;
use crate::prompts::PromptBuilder;
use crate::response::parse_extraction_response;

pub const DEFAULT_TEXT_CHARS: usize = 1_500_000;

/// Room left for the instructions and field list.
const PROMPT_OVERHEAD: usize = 8_000;

pub struct TextSource {
    router: Arc<LlmRouter>,
    prompts: Arc<PromptBuilder>,
    schema: Arc<FieldSchema>,
    max_chars: usize,
}

impl TextSource {
    pub fn new(router: Arc<LlmRouter>, prompts: Arc<PromptBuilder>, schema: Arc<FieldSchema>) -> Self {
        Self { router, prompts, schema, max_chars: DEFAULT_TEXT_CHARS }
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    fn effective_limit(&self) -> usize {
        self.max_chars
            .min(self.router.max_input_chars().saturating_sub(PROMPT_OVERHEAD))
    }

    /// Prompt the model with already extracted text.
    pub async fn extract_from_text(&self, document_id: &str, text: &str) -> Result<Vec<RawCandidate>, SysrevError> {
        if text.trim().is_empty() {
            return Err(unavailable(SourceTag::Text, "no extractable text"));
        }
        let prompt = self
            .prompts
            .text_extraction(&self.schema, truncate_chars(text, self.effective_limit()))
            .map_err(|e| unavailable(SourceTag::Text, format!("rendering prompt: {e}")))?;

        let resp = self
            .router
            .complete(Some(document_id), "text_extraction", LlmRequest::user(prompt))
            .await
            .map_err(|e| unavailable(SourceTag::Text, e))?;

        let parsed = parse_extraction_response(&self.schema, SourceTag::Text, &resp.content)?;
        debug!(document = document_id, fields = parsed.recognised, "Text extraction parsed");
        Ok(parsed.candidates)
    }
}

#[async_trait]
impl SourceAdapter for TextSource {
    fn tag(&self) -> SourceTag {
        SourceTag::Text
    }

    #[instrument(skip(self, doc), fields(document = %doc.id))]
    async fn extract(&self, doc: &Document) -> Result<Vec<RawCandidate>, SysrevError> {
        let pdf = load_pdf_text(doc.path.clone())
            .await
            .map_err(|e| unavailable(SourceTag::Text, format!("{e:#}")))?;
        self.extract_from_text(&doc.id, &pdf.full_text()).await
    }
}
