//! Text completion backends.
//!
//! Backends:
//!   AnthropicBackend — Anthropic Messages API (claude-*)
//!   OpenAiBackend    — OpenAI chat completions (gpt-4o, …)
//!   GeminiBackend    — Google Gemini generateContent (gemini-*)
//!
//! All three answer the same `LlmBackend::complete` call; which one runs is
//! a configuration choice made in `router::build_backend`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("Rate limit exceeded")]
    RateLimitExceeded,
    #[error("API error [{status}]: {message}")]
    ApiError { status: u16, message: String },
    #[error("Empty response from {0} (possibly a safety filter)")]
    EmptyResponse(String),
}

impl LlmError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Http(e)                 => e.is_timeout() || e.is_connect() || e.is_request(),
            LlmError::RateLimitExceeded       => true,
            LlmError::ApiError { status, .. } => *status == 429 || *status >= 500,
            _                                 => false,
        }
    }
}

// ── Request / Response ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,   // "system" | "user" | "assistant"
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub messages: Vec<Message>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl LlmRequest {
    /// A single user turn with no system prompt.
    pub fn user(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(prompt)],
            model: None,
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.messages.insert(0, Message::system(system));
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Total characters across all messages.
    pub fn prompt_chars(&self) -> usize {
        self.messages.iter().map(|m| m.content.chars().count()).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

// ── Trait ─────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError>;
    fn model_id(&self) -> &str;
    /// Short provider name for logs and audit ("anthropic", "openai", …).
    fn provider(&self) -> &str;
    /// Largest document text, in characters, worth sending in one prompt.
    fn max_input_chars(&self) -> usize;
    fn max_output_tokens(&self) -> usize;
}

// ── Helper: parse OpenAI-style response ──────────────────────────────────────

fn parse_openai_response(json: &serde_json::Value, fallback_model: &str) -> LlmResponse {
    LlmResponse {
        content: json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string(),
        model: json["model"]
            .as_str()
            .unwrap_or(fallback_model)
            .to_string(),
        prompt_tokens:     json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        completion_tokens: json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    }
}

async fn check_response_status(resp: reqwest::Response) -> Result<serde_json::Value, LlmError> {
    let status = resp.status().as_u16();
    if status == 429 {
        return Err(LlmError::RateLimitExceeded);
    }
    let text = resp.text().await?;
    let body: serde_json::Value = match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(_) if status >= 400 => {
            return Err(LlmError::ApiError { status, message: text.chars().take(300).collect() });
        }
        Err(e) => return Err(e.into()),
    };
    if status >= 400 {
        let msg = body["error"]["message"]
            .as_str()
            .or_else(|| body["message"].as_str())
            .unwrap_or("unknown API error")
            .to_string();
        return Err(LlmError::ApiError { status, message: msg });
    }
    Ok(body)
}

fn non_empty(resp: LlmResponse, provider: &str) -> Result<LlmResponse, LlmError> {
    if resp.content.trim().is_empty() {
        return Err(LlmError::EmptyResponse(provider.to_string()));
    }
    Ok(resp)
}

fn trim_base(base_url: &str) -> &str {
    base_url.trim_end_matches('/')
}

// ── 1. Anthropic (claude-*) ───────────────────────────────────────────────────

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

pub struct AnthropicBackend {
    pub model: String,
    pub base_url: String,
    api_key: SecretString,
    client: reqwest::Client,
}

impl AnthropicBackend {
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
            base_url: ANTHROPIC_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        // Messages API takes the system prompt as a top-level field
        let system = req.messages.iter()
            .find(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .unwrap_or("");

        let messages: Vec<serde_json::Value> = req.messages.iter()
            .filter(|m| m.role != "system")
            .map(|m| serde_json::json!({"role": m.role, "content": m.content}))
            .collect();

        let model = req.model.as_deref().unwrap_or(&self.model);

        let mut body = serde_json::json!({
            "model":       model,
            "messages":    messages,
            "max_tokens":  req.max_tokens.unwrap_or(4096),
            "temperature": req.temperature.unwrap_or(0.0),
        });
        if !system.is_empty() {
            body["system"] = serde_json::Value::String(system.to_string());
        }

        let resp = self.client
            .post(format!("{}/v1/messages", trim_base(&self.base_url)))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let json = check_response_status(resp).await?;

        let content = json["content"]
            .as_array()
            .map(|blocks| {
                blocks.iter()
                    .filter_map(|b| b["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        non_empty(
            LlmResponse {
                content,
                model: json["model"].as_str().unwrap_or(model).to_string(),
                prompt_tokens:     json["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32,
                completion_tokens: json["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
            },
            self.provider(),
        )
    }

    fn model_id(&self) -> &str { &self.model }
    fn provider(&self) -> &str { "anthropic" }
    fn max_input_chars(&self) -> usize { 180_000 }
    fn max_output_tokens(&self) -> usize { 8_192 }
}

// ── 2. OpenAI ─────────────────────────────────────────────────────────────────

pub const OPENAI_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAiBackend {
    pub model: String,
    pub base_url: String,
    api_key: SecretString,
    client: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            base_url: OPENAI_BASE_URL.to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = serde_json::json!({
            "model":       req.model.as_deref().unwrap_or(&self.model),
            "messages":    req.messages,
            "max_tokens":  req.max_tokens.unwrap_or(4096),
            "temperature": req.temperature.unwrap_or(0.0),
        });
        let resp = self.client
            .post(format!("{}/v1/chat/completions", trim_base(&self.base_url)))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;
        let json = check_response_status(resp).await?;
        non_empty(parse_openai_response(&json, &self.model), self.provider())
    }

    fn model_id(&self) -> &str { &self.model }
    fn provider(&self) -> &str { "openai" }
    fn max_input_chars(&self) -> usize { 120_000 }
    fn max_output_tokens(&self) -> usize { 16_384 }
}

// ── 3. Google Gemini ──────────────────────────────────────────────────────────

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiBackend {
    pub model: String,
    pub base_url: String,
    api_key: SecretString,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
            base_url: GEMINI_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let model = req.model.as_deref().unwrap_or(&self.model);
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            trim_base(&self.base_url), model
        );

        // System message → systemInstruction
        let system_text = req.messages.iter()
            .find(|m| m.role == "system")
            .map(|m| m.content.clone());

        let contents: Vec<serde_json::Value> = req.messages.iter()
            .filter(|m| m.role != "system")
            .map(|m| {
                let role = if m.role == "assistant" { "model" } else { "user" };
                serde_json::json!({
                    "role": role,
                    "parts": [{ "text": m.content }]
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": req.max_tokens.unwrap_or(4096),
                "temperature":     req.temperature.unwrap_or(0.0),
            }
        });
        if let Some(sys) = system_text {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{ "text": sys }]
            });
        }

        let resp = self.client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;
        let json = check_response_status(resp).await?;

        let content = json["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts.iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let prompt_tokens = json["usageMetadata"]["promptTokenCount"]
            .as_u64().unwrap_or(0) as u32;
        let completion_tokens = json["usageMetadata"]["candidatesTokenCount"]
            .as_u64().unwrap_or(0) as u32;

        non_empty(
            LlmResponse {
                content,
                model: model.to_string(),
                prompt_tokens,
                completion_tokens,
            },
            self.provider(),
        )
    }

    fn model_id(&self) -> &str { &self.model }
    fn provider(&self) -> &str { "gemini" }
    fn max_input_chars(&self) -> usize { 1_500_000 }
    fn max_output_tokens(&self) -> usize { 8_192 }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[test]
    fn test_anthropic_backend_identity() {
        let b = AnthropicBackend::new(key("sk-ant-test"), "claude-sonnet-4-20250514");
        assert_eq!(b.model_id(), "claude-sonnet-4-20250514");
        assert_eq!(b.provider(), "anthropic");
        assert_eq!(b.max_input_chars(), 180_000);
    }

    #[test]
    fn test_openai_backend_identity() {
        let b = OpenAiBackend::new(key("sk-test"), "gpt-4o").with_base_url("http://localhost:9999/");
        assert_eq!(b.model_id(), "gpt-4o");
        assert_eq!(trim_base(&b.base_url), "http://localhost:9999");
        assert_eq!(b.max_input_chars(), 120_000);
    }

    #[test]
    fn test_gemini_has_largest_budget() {
        let b = GeminiBackend::new(key("AIza-test"), "gemini-2.5-pro");
        assert_eq!(b.max_input_chars(), 1_500_000);
    }

    #[test]
    fn test_parse_openai_response() {
        let json = serde_json::json!({
            "model": "gpt-4o-2024-08-06",
            "choices": [{"message": {"role": "assistant", "content": "- Title: X"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        });
        let r = parse_openai_response(&json, "gpt-4o");
        assert_eq!(r.content, "- Title: X");
        assert_eq!(r.model, "gpt-4o-2024-08-06");
        assert_eq!(r.prompt_tokens, 12);
    }

    #[test]
    fn test_empty_content_is_error() {
        let r = LlmResponse { content: "  ".into(), model: "m".into(), prompt_tokens: 0, completion_tokens: 0 };
        assert!(matches!(non_empty(r, "gemini"), Err(LlmError::EmptyResponse(_))));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(LlmError::RateLimitExceeded.is_retryable());
        assert!(LlmError::ApiError { status: 503, message: "overloaded".into() }.is_retryable());
        assert!(!LlmError::ApiError { status: 400, message: "bad".into() }.is_retryable());
        assert!(!LlmError::EmptyResponse("openai".into()).is_retryable());
    }

    #[test]
    fn test_request_builder_puts_system_first() {
        let req = LlmRequest::user("paper").with_system("You are a reviewer").with_max_tokens(400);
        assert_eq!(req.messages[0].role, "system");
        assert_eq!(req.messages[1].content, "paper");
        assert_eq!(req.max_tokens, Some(400));
        assert_eq!(req.prompt_chars(), "paper".len() + "You are a reviewer".len());
    }
}
