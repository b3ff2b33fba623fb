//! Audit logging for LLM calls.
//!
//! The output itself is never logged, only its SHA-256, so a run's audit
//! trail can be compared against stored responses without leaking them.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmAuditEntry {
    pub id: Uuid,
    pub document_id: Option<String>,
    /// What the call was for: "table_extraction", "text_extraction", "screening".
    pub purpose: String,
    pub model: String,
    pub backend: String,
    pub attempts: u32,
    pub prompt_chars: usize,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub output_hash: String,
    pub latency_ms: u64,
    pub called_at: chrono::DateTime<Utc>,
}

impl LlmAuditEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        document_id: Option<String>,
        purpose: impl Into<String>,
        model: String,
        backend: String,
        attempts: u32,
        prompt_chars: usize,
        prompt_tokens: u32,
        completion_tokens: u32,
        output: &str,
        latency_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            purpose: purpose.into(),
            model,
            backend,
            attempts,
            prompt_chars,
            prompt_tokens,
            completion_tokens,
            output_hash: sha256_hex(output),
            latency_ms,
            called_at: Utc::now(),
        }
    }

    /// Emit the entry as a structured event on the `sysrev::audit` target.
    pub fn emit(&self) {
        tracing::info!(
            target: "sysrev::audit",
            id = %self.id,
            document = self.document_id.as_deref().unwrap_or("-"),
            purpose = %self.purpose,
            model = %self.model,
            backend = %self.backend,
            attempts = self.attempts,
            prompt_chars = self.prompt_chars,
            prompt_tokens = self.prompt_tokens,
            completion_tokens = self.completion_tokens,
            output_hash = %self.output_hash,
            latency_ms = self.latency_ms,
            "LLM call"
        );
    }
}

fn sha256_hex(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}
