//! Table-oriented extraction: Docling markdown plus table grids.

use std::sync::Arc;

use async_trait::async_trait;
use sysrev_common::SysrevError;
use sysrev_llm::{LlmRequest, LlmRouter};
use sysrev_merge::{FieldSchema, RawCandidate, SourceTag};
use tracing::{debug, instrument};

use super::{truncate_chars, unavailable, SourceAdapter};
use crate::docling::{ConvertedDocument, DocumentConverter};
use crate::models::Document;
use crate::prompts::PromptBuilder;
use crate::response::parse_extraction_response;

pub const DEFAULT_PAPER_CHARS: usize = 1_200_000;
pub const DEFAULT_TABLE_CHARS: usize = 300_000;

/// Characters kept for the template text around the paper and tables.
const PROMPT_OVERHEAD: usize = 8_000;

/// Input budgets for the table prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLimits {
    pub paper_chars: usize,
    pub table_chars: usize,
}

impl Default for TableLimits {
    fn default() -> Self {
        Self { paper_chars: DEFAULT_PAPER_CHARS, table_chars: DEFAULT_TABLE_CHARS }
    }
}

impl TableLimits {
    /// Shrink both limits proportionally so they fit a backend's budget.
    pub fn fit(&self, backend_chars: usize) -> TableLimits {
        let budget = backend_chars.saturating_sub(PROMPT_OVERHEAD);
        let wanted = self.paper_chars + self.table_chars;
        if wanted <= budget || wanted == 0 {
            return *self;
        }
        let share = budget as f64 / wanted as f64;
        TableLimits {
            paper_chars: (self.paper_chars as f64 * share) as usize,
            table_chars: (self.table_chars as f64 * share) as usize,
        }
    }
}

pub struct TableSource {
    converter: Arc<dyn DocumentConverter>,
    router: Arc<LlmRouter>,
    prompts: Arc<PromptBuilder>,
    schema: Arc<FieldSchema>,
    limits: TableLimits,
}

impl TableSource {
    pub fn new(
        converter: Arc<dyn DocumentConverter>,
        router: Arc<LlmRouter>,
        prompts: Arc<PromptBuilder>,
        schema: Arc<FieldSchema>,
    ) -> Self {
        Self { converter, router, prompts, schema, limits: TableLimits::default() }
    }

    pub fn with_limits(mut self, limits: TableLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Prompt the model with an already converted document.
    pub async fn extract_from_converted(
        &self,
        document_id: &str,
        converted: &ConvertedDocument,
    ) -> Result<Vec<RawCandidate>, SysrevError> {
        if converted.markdown.trim().is_empty() {
            return Err(unavailable(SourceTag::Table, "conversion produced no text"));
        }
        let tables = converted
            .tables_as_csv()
            .map_err(|e| unavailable(SourceTag::Table, format!("rendering tables: {e}")))?;
        let limits = self.limits.fit(self.router.max_input_chars());

        let prompt = self
            .prompts
            .table_extraction(
                &self.schema,
                truncate_chars(&converted.markdown, limits.paper_chars),
                truncate_chars(&tables, limits.table_chars),
            )
            .map_err(|e| unavailable(SourceTag::Table, format!("rendering prompt: {e}")))?;

        let resp = self
            .router
            .complete(Some(document_id), "table_extraction", LlmRequest::user(prompt))
            .await
            .map_err(|e| unavailable(SourceTag::Table, e))?;

        let parsed = parse_extraction_response(&self.schema, SourceTag::Table, &resp.content)?;
        let origin = format!("docling: {} tables", converted.non_empty_tables().count());
        debug!(document = document_id, fields = parsed.recognised, %origin, "Table extraction parsed");
        Ok(parsed
            .candidates
            .into_iter()
            .map(|c| c.with_origin(origin.clone()))
            .collect())
    }
}

#[async_trait]
impl SourceAdapter for TableSource {
    fn tag(&self) -> SourceTag {
        SourceTag::Table
    }

    #[instrument(skip(self, doc), fields(document = %doc.id))]
    async fn extract(&self, doc: &Document) -> Result<Vec<RawCandidate>, SysrevError> {
        let converted = self
            .converter
            .convert(&doc.path)
            .await
            .map_err(|e| unavailable(SourceTag::Table, format!("{e:#}")))?;
        self.extract_from_converted(&doc.id, &converted).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_kept_when_budget_allows() {
        let l = TableLimits::default();
        assert_eq!(l.fit(1_600_000), l);
    }

    #[test]
    fn test_limits_scaled_to_small_budget() {
        let l = TableLimits::default().fit(180_000);
        assert!(l.paper_chars + l.table_chars <= 180_000 - PROMPT_OVERHEAD);
        assert_eq!(l.paper_chars / l.table_chars, 4);
    }
}
