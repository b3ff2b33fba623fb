//! LLM router: one configured backend plus retry, backoff and auditing.
//!
//! Provider choice is made once, from configuration, in `build_backend`.
//! Everything downstream sees only `LlmRouter::complete`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use secrecy::SecretString;

use crate::audit::LlmAuditEntry;
use crate::backend::{
    AnthropicBackend, GeminiBackend, LlmBackend, LlmError, LlmRequest, LlmResponse, OpenAiBackend,
};

/// Provider variant selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Claude,
    Gpt,
    Gemini,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Claude => "claude",
            BackendKind::Gpt    => "gpt",
            BackendKind::Gemini => "gemini",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            BackendKind::Claude => "claude-sonnet-4-20250514",
            BackendKind::Gpt    => "gpt-4o",
            BackendKind::Gemini => "gemini-2.5-pro",
        }
    }

    /// Environment variables consulted for the API key, in order.
    pub fn api_key_vars(&self) -> &'static [&'static str] {
        match self {
            BackendKind::Claude => &["ANTHROPIC_API_KEY", "CLAUDE_API_KEY"],
            BackendKind::Gpt    => &["OPENAI_API_KEY"],
            BackendKind::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claude" | "anthropic"        => Ok(BackendKind::Claude),
            "gpt" | "openai" | "chatgpt"  => Ok(BackendKind::Gpt),
            "gemini" | "google"           => Ok(BackendKind::Gemini),
            other => Err(format!("unknown LLM provider '{other}' (expected claude, gpt or gemini)")),
        }
    }
}

/// Everything needed to construct one backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub model: Option<String>,
    pub api_key: SecretString,
    pub base_url: Option<String>,
    pub timeout: Duration,
}

pub fn build_backend(cfg: &BackendConfig) -> Result<Arc<dyn LlmBackend>, LlmError> {
    let client = reqwest::Client::builder().timeout(cfg.timeout).build()?;
    let model = cfg.model.clone().unwrap_or_else(|| cfg.kind.default_model().to_string());
    let key = cfg.api_key.clone();

    let backend: Arc<dyn LlmBackend> = match cfg.kind {
        BackendKind::Claude => {
            let mut b = AnthropicBackend::new(key, model).with_client(client);
            if let Some(url) = &cfg.base_url {
                b = b.with_base_url(url);
            }
            Arc::new(b)
        }
        BackendKind::Gpt => {
            let mut b = OpenAiBackend::new(key, model).with_client(client);
            if let Some(url) = &cfg.base_url {
                b = b.with_base_url(url);
            }
            Arc::new(b)
        }
        BackendKind::Gemini => {
            let mut b = GeminiBackend::new(key, model).with_client(client);
            if let Some(url) = &cfg.base_url {
                b = b.with_base_url(url);
            }
            Arc::new(b)
        }
    };
    Ok(backend)
}

/// Exponential backoff between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first; at least 1.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(750),
            max_delay: Duration::from_secs(5),
            factor: 1.75,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self { max_attempts: 1, ..Self::default() }
    }

    fn next_delay(&self, current: Duration) -> Duration {
        current.mul_f64(self.factor).min(self.max_delay)
    }
}

/// Sends requests to the configured backend.
pub struct LlmRouter {
    backend: Arc<dyn LlmBackend>,
    retry: RetryPolicy,
    max_tokens: u32,
    temperature: f32,
}

impl LlmRouter {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            backend,
            retry: RetryPolicy::default(),
            max_tokens: 4096,
            temperature: 0.0,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_generation(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn backend(&self) -> &Arc<dyn LlmBackend> {
        &self.backend
    }

    pub fn max_input_chars(&self) -> usize {
        self.backend.max_input_chars()
    }

    /// Execute with retries on transient failures. Each finished call
    /// (success only) emits one audit entry.
    pub async fn complete(
        &self,
        document_id: Option<&str>,
        purpose: &str,
        mut req: LlmRequest,
    ) -> Result<LlmResponse, LlmError> {
        req.max_tokens.get_or_insert(self.max_tokens);
        req.temperature.get_or_insert(self.temperature);
        let prompt_chars = req.prompt_chars();

        let started = Instant::now();
        let mut delay = self.retry.initial_delay;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            tracing::debug!(
                model = self.backend.model_id(),
                document = document_id.unwrap_or("-"),
                purpose,
                attempt,
                "Sending LLM request"
            );

            match self.backend.complete(req.clone()).await {
                Ok(resp) => {
                    LlmAuditEntry::new(
                        document_id.map(String::from),
                        purpose,
                        resp.model.clone(),
                        self.backend.provider().to_string(),
                        attempt,
                        prompt_chars,
                        resp.prompt_tokens,
                        resp.completion_tokens,
                        &resp.content,
                        started.elapsed().as_millis() as u64,
                    )
                    .emit();
                    return Ok(resp);
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts.max(1) => {
                    tracing::warn!(
                        model = self.backend.model_id(),
                        document = document_id.unwrap_or("-"),
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "LLM request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = self.retry.next_delay(delay);
                }
                Err(e) => {
                    tracing::warn!(
                        model = self.backend.model_id(),
                        document = document_id.unwrap_or("-"),
                        attempt,
                        error = %e,
                        "LLM request failed"
                    );
                    return Err(e);
                }
            }
        }
    }
}
