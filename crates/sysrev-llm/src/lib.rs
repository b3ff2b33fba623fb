//! sysrev-llm — text completion provider abstraction.
//!
//! One `LlmBackend` trait with Claude, GPT and Gemini implementations,
//! and an `LlmRouter` that adds retry/backoff and per-call audit events.

pub mod backend;
pub mod router;
pub mod audit;

pub use backend::{LlmBackend, LlmError, LlmRequest, LlmResponse, Message};
pub use router::{build_backend, BackendConfig, BackendKind, LlmRouter, RetryPolicy};
