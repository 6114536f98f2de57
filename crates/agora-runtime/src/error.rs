//! Runtime error types

use agora_llm::{ConfigError, LlmError};
use agora_persist::StorageError;

/// Failures that stop a run before it starts or while persisting.
/// Generator failures during a run are absorbed by skipping the turn or round.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
