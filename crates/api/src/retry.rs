use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use extract::{CompletionRequest, LanguageModel};

use crate::config::RetryConfig;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: usize,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: usize, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, config.initial_backoff_ms, config.max_backoff_ms)
    }

    /// Retry a future with exponential backoff
    pub async fn retry<F, Fut, T, E>(&self, operation_name: &str, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        let mut backoff = self.initial_backoff;

        loop {
            match f().await {
                Ok(result) => {
                    if attempt > 0 {
                        info!(
                            operation = operation_name,
                            attempts = attempt + 1,
                            "Operation succeeded after retries"
                        );
                    }
                    return Ok(result);
                }
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        warn!(
                            operation = operation_name,
                            attempts = attempt,
                            error = %e,
                            "Operation failed after max retries"
                        );
                        return Err(e);
                    }

                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis(),
                        error = %e,
                        "Operation failed, retrying"
                    );

                    sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, self.max_backoff);
                }
            }
        }
    }
}

/// Language model whose empty completions are retried under a [`RetryPolicy`].
pub struct RetryingLlm {
    inner: Arc<dyn LanguageModel>,
    policy: RetryPolicy,
}

impl RetryingLlm {
    pub fn new(inner: Arc<dyn LanguageModel>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl LanguageModel for RetryingLlm {
    async fn complete(&self, request: &CompletionRequest) -> Option<String> {
        self.policy
            .retry("llm completion", move || async move {
                self.inner
                    .complete(request)
                    .await
                    .ok_or_else(|| anyhow!("no completion"))
            })
            .await
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LanguageModel for Flaky {
        async fn complete(&self, _request: &CompletionRequest) -> Option<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            (call >= self.failures).then(|| "{}".to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(3, 100, 250);
        let start = tokio::time::Instant::now();
        let mut calls = 0;

        let result: Result<(), String> = policy
            .retry("always fails", || {
                calls += 1;
                async { Err("boom".to_string()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls, 4);
        // 100 + 200 + 250
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(550) && elapsed < Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_llm_retried_until_answer() {
        let inner = Arc::new(Flaky {
            failures: 2,
            calls: AtomicUsize::new(0),
        });
        let llm = RetryingLlm::new(inner.clone(), RetryPolicy::new(3, 10, 100));

        let reply = llm.complete(&CompletionRequest::new("sys", "user")).await;
        assert_eq!(reply.as_deref(), Some("{}"));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_llm_gives_up() {
        let inner = Arc::new(Flaky {
            failures: usize::MAX,
            calls: AtomicUsize::new(0),
        });
        let llm = RetryingLlm::new(inner.clone(), RetryPolicy::new(1, 10, 100));

        assert!(llm.complete(&CompletionRequest::new("sys", "user")).await.is_none());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }
}
