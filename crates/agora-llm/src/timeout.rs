//! Per-call deadline for any provider

use async_trait::async_trait;
use std::time::Duration;

use crate::provider::{LlmError, LlmProvider, LlmRequest, LlmResponse};

/// Wraps a provider so that every completion fails with
/// [`LlmError::Timeout`] once `timeout` elapses
#[derive(Debug)]
pub struct TimeoutProvider<P: LlmProvider> {
    inner: P,
    timeout: Duration,
}

impl<P: LlmProvider> TimeoutProvider<P> {
    pub fn new(inner: P, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: LlmProvider> LlmProvider for TimeoutProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn is_available(&self) -> bool {
        tokio::time::timeout(self.timeout, self.inner.is_available())
            .await
            .unwrap_or(false)
    }

    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        match tokio::time::timeout(self.timeout, self.inner.complete(request)).await {
            Ok(result) => result,
            Err(_) => {
                let millis = self.timeout.as_millis() as u64;
                tracing::warn!(provider = self.inner.name(), timeout_ms = millis, "completion timed out");
                metrics::counter!("agora_llm_timeouts_total").increment(1);
                Err(LlmError::Timeout(millis))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct SlowProvider;

    #[async_trait]
    impl LlmProvider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse, LlmError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(LlmError::NotAvailable)
        }
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let provider = TimeoutProvider::new(SlowProvider, Duration::from_millis(20));
        let result = provider.ask("hello").await;
        assert!(matches!(result, Err(LlmError::Timeout(20))));
    }

    #[tokio::test]
    async fn test_fast_call_passes_through() {
        let provider = TimeoutProvider::new(
            crate::mock::MockProvider::constant("ok"),
            Duration::from_secs(1),
        );
        assert_eq!(provider.ask("hello").await.unwrap(), "ok");
    }
}
