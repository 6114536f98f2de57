//! Mock provider for tests and offline runs

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::provider::{LlmError, LlmProvider, LlmRequest, LlmResponse};

#[derive(Debug)]
enum Script {
    /// Cycle through responses in order
    Sequence(Vec<String>),
    /// First entry whose key occurs in the prompt wins
    Routed(Vec<(String, String)>, String),
    /// Every call fails
    Failing,
}

/// A provider returning canned responses, recording every prompt it sees
#[derive(Debug)]
pub struct MockProvider {
    /// Name of this mock
    pub name: String,
    script: Script,
    index: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockProvider {
    fn with_script(name: &str, script: Script) -> Self {
        Self {
            name: name.to_string(),
            script,
            index: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Cycle through the given responses
    pub fn new(responses: Vec<String>) -> Self {
        Self::with_script("mock", Script::Sequence(responses))
    }

    /// Always return the same response
    pub fn constant(response: &str) -> Self {
        Self::new(vec![response.to_string()])
    }

    /// Route on prompt content: the first `(key, response)` whose key is a
    /// substring of the system or user prompt answers; otherwise `fallback`
    pub fn routed(routes: Vec<(&str, &str)>, fallback: &str) -> Self {
        let routes = routes
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self::with_script("routed-mock", Script::Routed(routes, fallback.to_string()))
    }

    /// Every request fails with [`LlmError::RequestFailed`]
    pub fn failing() -> Self {
        Self::with_script("failing-mock", Script::Failing)
    }

    /// Number of requests served (including failures)
    pub fn calls(&self) -> usize {
        self.index.load(Ordering::Relaxed)
    }

    /// Prompts received so far, in order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        !matches!(self.script, Script::Failing)
    }

    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = Instant::now();
        let idx = self.index.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt.clone());
        }

        let content = match &self.script {
            Script::Failing => {
                return Err(LlmError::RequestFailed("mock failure".to_string()));
            }
            Script::Sequence(responses) if responses.is_empty() => {
                return Err(LlmError::InvalidResponse("no canned responses".to_string()));
            }
            Script::Sequence(responses) => responses[idx % responses.len()].clone(),
            Script::Routed(routes, fallback) => routes
                .iter()
                .find(|(key, _)| request.prompt.contains(key) || request.instructions.contains(key))
                .map(|(_, response)| response.clone())
                .unwrap_or_else(|| fallback.clone()),
        };

        Ok(LlmResponse {
            content,
            model: self.name.clone(),
            completion_tokens: Some((request.prompt.len() / 4) as u32),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_constant_mock() {
        let mock = MockProvider::constant("Hello, world!");
        let response = mock.ask("test").await.unwrap();
        assert_eq!(response, "Hello, world!");
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_sequence_cycles() {
        let mock = MockProvider::new(vec!["one".to_string(), "two".to_string()]);
        assert_eq!(mock.ask("a").await.unwrap(), "one");
        assert_eq!(mock.ask("b").await.unwrap(), "two");
        assert_eq!(mock.ask("c").await.unwrap(), "one");
        assert_eq!(mock.prompts(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_routed_mock() {
        let mock = MockProvider::routed(vec![("judge", "0.4"), ("extract", "{}")], "fallback");
        assert_eq!(mock.ask("please judge this").await.unwrap(), "0.4");
        assert_eq!(mock.ask("anything else").await.unwrap(), "fallback");
    }

    #[tokio::test]
    async fn test_failing_mock() {
        let mock = MockProvider::failing();
        assert!(!mock.is_available().await);
        assert!(matches!(mock.ask("x").await, Err(LlmError::RequestFailed(_))));
    }
}
