//! The generation port: one request in, one reply out
//!
//! Every call the reasoning core makes is either a structured extraction
//! (JSON checked against a schema by [`crate::structured`]) or a short piece
//! of prose such as a settling question. [`ReplyFormat`] tells a provider
//! which of the two it is serving so it can constrain decoding.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sampling temperature for JSON replies
pub const JSON_TEMPERATURE: f32 = 0.2;
/// Sampling temperature for prose replies
pub const TEXT_TEMPERATURE: f32 = 0.7;

const DEFAULT_REPLY_TOKENS: u32 = 2048;

/// Failure taxonomy of a generation call. Callers treat every variant as
/// recoverable: the affected turn or round is skipped.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("could not reach generator: {0}")]
    ConnectionFailed(String),
    #[error("generator rejected request: {0}")]
    RequestFailed(String),
    #[error("unreadable reply: {0}")]
    InvalidResponse(String),
    /// Reply did not validate against the output schema
    #[error("reply does not match schema: {0}")]
    Schema(String),
    #[error("no reply within {0} ms")]
    Timeout(u64),
    #[error("generator is rate limiting")]
    RateLimited,
    #[error("generator unavailable")]
    NotAvailable,
}

/// Shape the caller expects back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyFormat {
    /// A single JSON value
    Json,
    #[default]
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// Task instructions. Carries the `[task:…]` marker that routes mocks.
    pub instructions: String,
    pub prompt: String,
    pub format: ReplyFormat,
    /// Upper bound on reply length
    pub max_tokens: u32,
}

impl LlmRequest {
    /// Request a JSON reply; the schema is already spelled out in `prompt`
    pub fn json(instructions: &str, prompt: &str) -> Self {
        Self {
            instructions: instructions.to_string(),
            prompt: prompt.to_string(),
            format: ReplyFormat::Json,
            max_tokens: DEFAULT_REPLY_TOKENS,
        }
    }

    pub fn text(instructions: &str, prompt: &str) -> Self {
        Self {
            format: ReplyFormat::Text,
            ..Self::json(instructions, prompt)
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(&self) -> f32 {
        match self.format {
            ReplyFormat::Json => JSON_TEMPERATURE,
            ReplyFormat::Text => TEXT_TEMPERATURE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Raw reply text, possibly wrapped in prose or code fences
    pub content: String,
    pub model: String,
    pub completion_tokens: Option<u32>,
    pub latency_ms: u64,
}

#[async_trait]
pub trait LlmProvider: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Cheap reachability check, used before a run starts
    async fn is_available(&self) -> bool;

    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Prose reply to a bare prompt with no instructions
    async fn ask(&self, prompt: &str) -> Result<String, LlmError> {
        Ok(self.complete(LlmRequest::text("", prompt)).await?.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_sets_temperature() {
        let json = LlmRequest::json("[task:judge]", "rate it");
        assert_eq!(json.format, ReplyFormat::Json);
        assert_eq!(json.temperature(), JSON_TEMPERATURE);

        let text = LlmRequest::text("[task:settling-question]", "ask").max_tokens(128);
        assert_eq!(text.temperature(), TEXT_TEMPERATURE);
        assert_eq!(text.max_tokens, 128);
        assert_eq!(text.instructions, "[task:settling-question]");
    }
}
