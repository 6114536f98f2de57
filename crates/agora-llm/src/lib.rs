//! # Agora LLM
//!
//! The one non-deterministic capability the reasoning core consumes: a
//! text-generation service behind a narrow request/response port.
//!
//! | Call | Function | Failure |
//! |------|----------|---------|
//! | Structured | [`complete_structured`] | [`LlmError::Schema`] if the reply does not validate |
//! | Free text | [`complete_text`] | [`LlmError::InvalidResponse`] on an empty reply |
//!
//! ## Quick Start
//!
//! ```rust
//! use agora_llm::{complete_structured, MockProvider};
//! use serde::Deserialize;
//! use serde_json::json;
//!
//! #[derive(Deserialize)]
//! struct Judgment { strength: f64 }
//!
//! #[tokio::main]
//! async fn main() {
//!     let llm = MockProvider::constant(r#"{"strength": 0.35}"#);
//!     let schema = json!({"type": "object", "required": ["strength"]});
//!     let judgment: Judgment = complete_structured(&llm, "You are a judge.", "Rate it.", &schema)
//!         .await
//!         .unwrap();
//!     assert_eq!(judgment.strength, 0.35);
//! }
//! ```

pub mod config;
pub mod mock;
pub mod ollama;
pub mod provider;
pub mod structured;
pub mod timeout;

pub use config::{ConfigError, LlmConfig};
pub use mock::MockProvider;
pub use ollama::OllamaProvider;
pub use provider::{LlmError, LlmProvider, LlmRequest, LlmResponse, ReplyFormat};
pub use structured::{complete_structured, complete_text, extract_json, parse_structured};
pub use timeout::TimeoutProvider;
