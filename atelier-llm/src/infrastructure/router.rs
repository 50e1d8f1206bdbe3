//! Task-based model router
//!
//! Picks the best available provider for a task type under a health policy:
//! static task priority first, then rolling success rate, then average
//! latency. A provider accumulating consecutive failures past the threshold
//! is skipped until a re-probe interval elapses or an external reset.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use atelier_core::config::RouterConfig;

use crate::domain::{CompletionRequest, CompletionResponse, LlmError, LlmProvider};

/// Task types driving provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Planning and analysis
    Reasoning,
    /// Source code generation
    Code,
    /// UI copy and prose
    UiText,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Reasoning => "reasoning",
            TaskType::Code => "code",
            TaskType::UiText => "ui_text",
        }
    }
}

/// Per-provider health statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub consecutive_failures: u32,
    /// Rolling average latency over successful calls, milliseconds
    pub avg_latency_ms: f64,
    #[serde(skip)]
    last_failure: Option<Instant>,
}

impl ProviderStats {
    fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            // Assume success for untried providers
            1.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }
}

/// Snapshot of router statistics for status surfaces
#[derive(Debug, Clone, Default, Serialize)]
pub struct RouterStats {
    pub providers: HashMap<String, ProviderStats>,
    pub total_attempts: u64,
    pub total_successes: u64,
}

/// Static priority of a provider for a task (lower is better).
///
/// Reasoning prefers the reasoning specialist, Code the fastest code model,
/// UI/Text the text-quality model; OpenRouter backs everything up and the
/// local Ollama server is last.
fn task_priority(provider_id: &str, task: TaskType) -> u8 {
    match (provider_id, task) {
        ("cerebras", TaskType::Reasoning) => 1,
        ("groq", TaskType::Code) => 1,
        ("gemini", TaskType::UiText) => 1,
        ("gemini", _) | ("groq", _) | ("cerebras", _) => 2,
        ("openrouter", _) => 3,
        ("ollama", _) => 4,
        _ => 5,
    }
}

/// Health-aware, task-based provider selector
pub struct ModelRouter {
    providers: Vec<Arc<dyn LlmProvider>>,
    stats: Mutex<HashMap<String, ProviderStats>>,
    config: RouterConfig,
}

impl ModelRouter {
    pub fn new(providers: Vec<Arc<dyn LlmProvider>>, config: RouterConfig) -> Self {
        let stats = providers
            .iter()
            .map(|p| (p.info().id.to_string(), ProviderStats::default()))
            .collect();

        Self {
            providers,
            stats: Mutex::new(stats),
            config,
        }
    }

    /// Number of configured providers
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Select the best provider for a task.
    ///
    /// Returns [`LlmError::NoProvider`] when nothing qualifies, including
    /// the case where image input is required and no vision-capable adapter
    /// is configured (the image is never silently dropped).
    pub async fn select(
        &self,
        task: TaskType,
        needs_vision: bool,
    ) -> Result<Arc<dyn LlmProvider>, LlmError> {
        self.select_excluding(task, needs_vision, &[]).await
    }

    /// Select, skipping the given provider ids (used for the single
    /// different-provider retry after a transient failure).
    pub async fn select_excluding(
        &self,
        task: TaskType,
        needs_vision: bool,
        exclude: &[&str],
    ) -> Result<Arc<dyn LlmProvider>, LlmError> {
        let stats = self.stats.lock().await;

        let mut candidates: Vec<(&Arc<dyn LlmProvider>, f64, f64)> = Vec::new();

        for provider in &self.providers {
            let provider_info = provider.info();
            let id = provider_info.id;

            if exclude.contains(&id) || !provider.is_available() {
                continue;
            }
            if needs_vision && !provider_info.capabilities.vision {
                continue;
            }

            let provider_stats = stats.get(id).cloned().unwrap_or_default();
            if self.is_circuit_broken(&provider_stats) {
                warn!(provider = id, "Provider circuit broken, skipping");
                continue;
            }

            let score = task_priority(id, task) as f64
                + (1.0 - provider_stats.success_rate()) * 2.0;
            candidates.push((provider, score, provider_stats.avg_latency_ms));
        }

        candidates.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
        });

        match candidates.first() {
            Some((provider, score, _)) => {
                debug!(
                    provider = provider.info().id,
                    task = task.as_str(),
                    score,
                    "Selected provider"
                );
                Ok(Arc::clone(provider))
            }
            None if needs_vision => Err(LlmError::NoProvider(format!(
                "No vision-capable provider available for {} task",
                task.as_str()
            ))),
            None => Err(LlmError::NoProvider(format!(
                "No provider available for {} task",
                task.as_str()
            ))),
        }
    }

    fn is_circuit_broken(&self, stats: &ProviderStats) -> bool {
        if stats.consecutive_failures < self.config.circuit_breaker_threshold {
            return false;
        }
        // Allow one probe once the re-probe interval elapses
        match stats.last_failure {
            Some(last) => {
                last.elapsed() < Duration::from_secs(self.config.reprobe_interval_seconds)
            }
            None => false,
        }
    }

    /// Record a successful call
    pub async fn record_success(&self, provider_id: &str, latency: Duration) {
        let mut stats = self.stats.lock().await;
        let entry = stats.entry(provider_id.to_string()).or_default();

        entry.attempts += 1;
        entry.successes += 1;
        entry.consecutive_failures = 0;
        entry.last_failure = None;

        let latency_ms = latency.as_secs_f64() * 1000.0;
        let total = entry.successes as f64;
        entry.avg_latency_ms = (entry.avg_latency_ms * (total - 1.0) + latency_ms) / total;

        info!(
            provider = provider_id,
            successes = entry.successes,
            attempts = entry.attempts,
            avg_latency_ms = entry.avg_latency_ms,
            "Provider call succeeded"
        );
    }

    /// Record a failed call
    pub async fn record_failure(&self, provider_id: &str, error: &LlmError) {
        let mut stats = self.stats.lock().await;
        let entry = stats.entry(provider_id.to_string()).or_default();

        entry.attempts += 1;
        entry.failures += 1;
        entry.consecutive_failures += 1;
        entry.last_failure = Some(Instant::now());

        warn!(
            provider = provider_id,
            failures = entry.failures,
            consecutive = entry.consecutive_failures,
            %error,
            "Provider call failed"
        );
    }

    /// External health reset: clears the circuit for a provider
    pub async fn reset(&self, provider_id: &str) {
        let mut stats = self.stats.lock().await;
        if let Some(entry) = stats.get_mut(provider_id) {
            entry.consecutive_failures = 0;
            entry.last_failure = None;
            info!(provider = provider_id, "Provider circuit reset");
        }
    }

    /// Snapshot current statistics
    pub async fn stats(&self) -> RouterStats {
        let stats = self.stats.lock().await;
        RouterStats {
            total_attempts: stats.values().map(|s| s.attempts).sum(),
            total_successes: stats.values().map(|s| s.successes).sum(),
            providers: stats.clone(),
        }
    }

    /// Select, call, and record in one step.
    ///
    /// On a retryable failure the call is retried exactly once on a
    /// different provider; all other failures propagate to the caller's own
    /// fallback path.
    pub async fn execute(
        &self,
        task: TaskType,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        let needs_vision = request.has_image();
        let provider = self.select(task, needs_vision).await?;
        let provider_id = provider.info().id;

        let started = Instant::now();
        match provider.complete(request.clone()).await {
            Ok(response) => {
                self.record_success(provider_id, started.elapsed()).await;
                Ok(response)
            }
            Err(error) => {
                self.record_failure(provider_id, &error).await;

                if !error.is_retryable() {
                    return Err(error);
                }

                let fallback = match self
                    .select_excluding(task, needs_vision, &[provider_id])
                    .await
                {
                    Ok(p) => p,
                    // Nothing else qualifies: surface the original failure
                    Err(_) => return Err(error),
                };

                let fallback_id = fallback.info().id;
                info!(
                    failed = provider_id,
                    fallback = fallback_id,
                    "Retrying on fallback provider"
                );

                let started = Instant::now();
                match fallback.complete(request).await {
                    Ok(response) => {
                        self.record_success(fallback_id, started.elapsed()).await;
                        Ok(response)
                    }
                    Err(fallback_error) => {
                        self.record_failure(fallback_id, &fallback_error).await;
                        Err(fallback_error)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProviderCapabilities, ProviderInfo, Usage};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockProvider {
        id: &'static str,
        vision: bool,
        available: bool,
        fail: bool,
        calls: AtomicUsize,
    }

    impl MockProvider {
        fn ok(id: &'static str) -> Self {
            Self {
                id,
                vision: false,
                available: true,
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(id: &'static str) -> Self {
            Self {
                fail: true,
                ..Self::ok(id)
            }
        }
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        fn info(&self) -> ProviderInfo {
            ProviderInfo {
                id: self.id,
                name: self.id,
                capabilities: ProviderCapabilities {
                    streaming: false,
                    vision: self.vision,
                    max_context_tokens: 8192,
                    max_output_tokens: 4096,
                },
            }
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn default_model(&self) -> &str {
            "mock-model"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(LlmError::ServiceUnavailable("mock outage".to_string()))
            } else {
                Ok(CompletionResponse {
                    model: "mock-model".to_string(),
                    text: format!("reply from {}", self.id),
                    usage: Usage::default(),
                })
            }
        }
    }

    fn router(providers: Vec<MockProvider>) -> ModelRouter {
        let providers: Vec<Arc<dyn LlmProvider>> = providers
            .into_iter()
            .map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
            .collect();
        ModelRouter::new(providers, RouterConfig::default())
    }

    #[tokio::test]
    async fn test_liveness_with_one_healthy_provider() {
        let r = router(vec![MockProvider::ok("alpha")]);
        let provider = r.select(TaskType::Code, false).await.unwrap();
        assert_eq!(provider.info().id, "alpha");
    }

    #[tokio::test]
    async fn test_no_provider_for_empty_router() {
        let r = router(vec![]);
        let err = r.select(TaskType::Reasoning, false).await.unwrap_err();
        assert!(matches!(err, LlmError::NoProvider(_)));
    }

    #[tokio::test]
    async fn test_vision_requirement_filters() {
        let r = router(vec![MockProvider::ok("alpha")]);
        let err = r.select(TaskType::UiText, true).await.unwrap_err();
        assert!(matches!(err, LlmError::NoProvider(_)));
    }

    #[tokio::test]
    async fn test_circuit_breaker_skips_after_threshold() {
        let r = router(vec![MockProvider::ok("alpha"), MockProvider::ok("beta")]);

        let outage = LlmError::ServiceUnavailable("down".to_string());
        for _ in 0..3 {
            r.record_failure("alpha", &outage).await;
        }

        // Untried beta wins once alpha's circuit opens
        let provider = r.select(TaskType::Code, false).await.unwrap();
        assert_eq!(provider.info().id, "beta");
    }

    #[tokio::test]
    async fn test_reset_closes_circuit() {
        let r = router(vec![MockProvider::ok("alpha")]);
        let outage = LlmError::ServiceUnavailable("down".to_string());
        for _ in 0..3 {
            r.record_failure("alpha", &outage).await;
        }
        assert!(r.select(TaskType::Code, false).await.is_err());

        r.reset("alpha").await;
        assert!(r.select(TaskType::Code, false).await.is_ok());
    }

    #[tokio::test]
    async fn test_success_rate_orders_equal_priority() {
        let r = router(vec![MockProvider::ok("alpha"), MockProvider::ok("beta")]);

        let outage = LlmError::ServiceUnavailable("down".to_string());
        r.record_failure("alpha", &outage).await;
        r.record_success("beta", Duration::from_millis(100)).await;

        let provider = r.select(TaskType::Code, false).await.unwrap();
        assert_eq!(provider.info().id, "beta");
    }

    #[tokio::test]
    async fn test_execute_falls_back_once_on_transient_failure() {
        let r = router(vec![MockProvider::failing("alpha"), MockProvider::ok("beta")]);

        // Make alpha the preferred candidate
        r.record_success("alpha", Duration::from_millis(1)).await;

        let response = r
            .execute(TaskType::Code, CompletionRequest::new().with_user("hi"))
            .await
            .unwrap();

        assert_eq!(response.text, "reply from beta");
        let stats = r.stats().await;
        assert_eq!(stats.providers["beta"].successes, 1);
        assert_eq!(stats.providers["alpha"].consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_execute_surfaces_error_when_no_fallback() {
        let r = router(vec![MockProvider::failing("alpha")]);
        let err = r
            .execute(TaskType::Code, CompletionRequest::new().with_user("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ServiceUnavailable(_)));
    }

    #[test]
    fn test_task_priorities() {
        assert_eq!(task_priority("cerebras", TaskType::Reasoning), 1);
        assert_eq!(task_priority("groq", TaskType::Code), 1);
        assert_eq!(task_priority("gemini", TaskType::UiText), 1);
        assert!(task_priority("ollama", TaskType::Code) > task_priority("openrouter", TaskType::Code));
    }
}
