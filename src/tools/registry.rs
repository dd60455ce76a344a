//! ToolRegistry - name-addressed dispatch to tool providers
//!
//! The registry is the only path from the planning agent to external data
//! sources. Provider failures, timeouts and panics are turned into error
//! responses here; nothing a provider does escapes as an `Err` or a panic.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::RequestId;

use super::error::{ProtocolError, ProviderReason};
use super::metrics::{ToolMetrics, ToolStats};
use super::protocol::{ToolFailure, ToolOutcome, ToolRequest, ToolResponse};
use super::traits::ToolProvider;

/// Default per-call deadline
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(15);

/// A dispatched call, or a response decided without dispatching
enum Pending {
    Spawned {
        request_id: RequestId,
        tool: String,
        started: Instant,
        handle: JoinHandle<ToolResponse>,
    },
    Ready(ToolResponse),
}

/// Registry of tool providers, safe to share across planning runs
pub struct ToolRegistry {
    providers: RwLock<HashMap<String, Arc<dyn ToolProvider>>>,
    metrics: Arc<ToolMetrics>,
    call_timeout: Duration,
}

impl ToolRegistry {
    /// Create an empty registry with the given per-call deadline
    pub fn new(call_timeout: Duration) -> Self {
        debug!(?call_timeout, "ToolRegistry::new: called");
        Self {
            providers: RwLock::new(HashMap::new()),
            metrics: Arc::new(ToolMetrics::new()),
            call_timeout,
        }
    }

    /// Bind a provider to a name
    pub fn register(&self, name: impl Into<String>, provider: Arc<dyn ToolProvider>) -> Result<(), ProtocolError> {
        let name = name.into();
        debug!(%name, provider = provider.name(), "ToolRegistry::register: called");
        let mut providers = self.providers.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if providers.contains_key(&name) {
            debug!(%name, "register: duplicate name");
            return Err(ProtocolError::DuplicateTool { name });
        }
        providers.insert(name, provider);
        Ok(())
    }

    /// Check if a tool exists
    pub fn has_tool(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Registered tool names, sorted
    pub fn names(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut names: Vec<String> = providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Descriptions of every registered tool, sorted by name
    pub fn describe(&self) -> Vec<(String, &'static str)> {
        let providers = self.providers.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut described: Vec<_> = providers
            .iter()
            .map(|(name, provider)| (name.clone(), provider.description()))
            .collect();
        described.sort_by(|a, b| a.0.cmp(&b.0));
        described
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Per-tool latency and error counters
    pub fn metrics_snapshot(&self) -> Vec<ToolStats> {
        self.metrics.snapshot()
    }

    fn lookup(&self, name: &str) -> Option<Arc<dyn ToolProvider>> {
        let providers = self.providers.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        providers.get(name).cloned()
    }

    /// Invoke one tool
    ///
    /// Fails only when the tool name is unbound. Provider errors, timeouts
    /// and panics come back as `Ok` responses with an error outcome.
    pub async fn invoke(&self, request: ToolRequest) -> Result<ToolResponse, ProtocolError> {
        debug!(tool = %request.tool, request_id = %request.id, "ToolRegistry::invoke: called");
        let provider = self.lookup(&request.tool).ok_or_else(|| ProtocolError::UnknownTool {
            name: request.tool.clone(),
        })?;
        Ok(self.settle(self.dispatch(provider, request)).await)
    }

    /// Invoke many tools concurrently
    ///
    /// Responses come back in input order. Each request runs in its own task,
    /// so one slow or failing provider never cancels the others. An unbound
    /// name yields an `unknown_tool` error response in its slot.
    pub async fn invoke_batch(&self, requests: Vec<ToolRequest>) -> Vec<ToolResponse> {
        debug!(count = requests.len(), "ToolRegistry::invoke_batch: called");
        let pending: Vec<Pending> = requests
            .into_iter()
            .map(|request| match self.lookup(&request.tool) {
                Some(provider) => self.dispatch(provider, request),
                None => {
                    debug!(tool = %request.tool, "invoke_batch: unknown tool in batch");
                    let failure = ToolFailure::new(
                        ProviderReason::UnknownTool,
                        format!("Tool not found: {}", request.tool),
                    );
                    self.metrics
                        .record(&request.tool, Duration::ZERO, Some(ProviderReason::UnknownTool));
                    Pending::Ready(ToolResponse::error(&request, failure, Duration::ZERO))
                }
            })
            .collect();

        join_all(pending.into_iter().map(|p| self.settle(p))).await
    }

    /// Spawn the provider call under the per-call deadline
    fn dispatch(&self, provider: Arc<dyn ToolProvider>, request: ToolRequest) -> Pending {
        let request_id = request.id.clone();
        let tool = request.tool.clone();
        let metrics = self.metrics.clone();
        let call_timeout = self.call_timeout;
        let started = Instant::now();

        let handle = tokio::spawn(async move {
            let result = tokio::time::timeout(call_timeout, provider.call(request.args.clone())).await;
            let latency = started.elapsed();

            let response = match result {
                Ok(Ok(payload)) => ToolResponse::ok(&request, payload, latency),
                Ok(Err(err)) => {
                    debug!(tool = %request.tool, error = %err, "dispatch: provider error");
                    ToolResponse::error(&request, err.into(), latency)
                }
                Err(_) => {
                    debug!(tool = %request.tool, "dispatch: provider timed out");
                    let failure = ToolFailure::new(
                        ProviderReason::Timeout,
                        format!("No response within {}ms", call_timeout.as_millis()),
                    );
                    ToolResponse::error(&request, failure, latency)
                }
            };

            let failure = match &response.outcome {
                ToolOutcome::Ok(_) => None,
                ToolOutcome::Error(f) => Some(f.reason),
            };
            metrics.record(&request.tool, latency, failure);
            response
        });

        Pending::Spawned {
            request_id,
            tool,
            started,
            handle,
        }
    }

    /// Wait for a dispatched call, converting a crashed task into a response
    async fn settle(&self, pending: Pending) -> ToolResponse {
        match pending {
            Pending::Ready(response) => response,
            Pending::Spawned {
                request_id,
                tool,
                started,
                handle,
            } => match handle.await {
                Ok(response) => response,
                Err(join_err) => {
                    let latency = started.elapsed();
                    warn!(%tool, error = %join_err, "settle: provider task crashed");
                    self.metrics.record(&tool, latency, Some(ProviderReason::Internal));
                    ToolResponse {
                        request_id,
                        tool,
                        outcome: ToolOutcome::Error(ToolFailure::new(
                            ProviderReason::Internal,
                            format!("Provider task failed: {}", join_err),
                        )),
                        latency,
                    }
                }
            },
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CALL_TIMEOUT)
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::error::ProviderError;
    use crate::tools::payload::{EventListing, ToolPayload, WeatherReport};
    use crate::tools::protocol::{ToolArgs, ToolStatus};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SunnyProvider;

    #[async_trait]
    impl ToolProvider for SunnyProvider {
        fn name(&self) -> &'static str {
            "weather"
        }

        fn description(&self) -> &'static str {
            "Always sunny"
        }

        async fn call(&self, _args: ToolArgs) -> Result<ToolPayload, ProviderError> {
            Ok(ToolPayload::Weather(WeatherReport {
                location: "Goa".to_string(),
                temperature_c: 30.0,
                conditions: "clear sky".to_string(),
                humidity_pct: Some(60),
                recommendations: vec![],
            }))
        }
    }

    struct BrokenProvider;

    #[async_trait]
    impl ToolProvider for BrokenProvider {
        fn name(&self) -> &'static str {
            "lodging"
        }

        fn description(&self) -> &'static str {
            "Always down"
        }

        async fn call(&self, _args: ToolArgs) -> Result<ToolPayload, ProviderError> {
            Err(ProviderError::new(ProviderReason::Unavailable, "503 from upstream"))
        }
    }

    struct SlowProvider {
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ToolProvider for SlowProvider {
        fn name(&self) -> &'static str {
            "events"
        }

        fn description(&self) -> &'static str {
            "Sleeps before answering"
        }

        async fn call(&self, _args: ToolArgs) -> Result<ToolPayload, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(ToolPayload::Events(EventListing::default()))
        }
    }

    struct PanickingProvider;

    #[async_trait]
    impl ToolProvider for PanickingProvider {
        fn name(&self) -> &'static str {
            "routing"
        }

        fn description(&self) -> &'static str {
            "Panics"
        }

        async fn call(&self, _args: ToolArgs) -> Result<ToolPayload, ProviderError> {
            panic!("adapter bug");
        }
    }

    fn registry() -> ToolRegistry {
        let registry = ToolRegistry::new(Duration::from_millis(200));
        registry.register("weather", Arc::new(SunnyProvider)).unwrap();
        registry.register("lodging", Arc::new(BrokenProvider)).unwrap();
        registry
    }

    #[test]
    fn test_register_duplicate_fails() {
        let registry = registry();
        let err = registry.register("weather", Arc::new(SunnyProvider)).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::DuplicateTool {
                name: "weather".to_string()
            }
        );
        assert_eq!(registry.names(), vec!["lodging", "weather"]);
    }

    #[tokio::test]
    async fn test_invoke_unknown_tool() {
        let registry = registry();
        let err = registry
            .invoke(ToolRequest::new("flights", ToolArgs::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownTool { name } if name == "flights"));
    }

    #[tokio::test]
    async fn test_invoke_converts_provider_error() {
        let registry = registry();
        let request = ToolRequest::new("lodging", ToolArgs::new());
        let request_id = request.id.clone();

        let response = registry.invoke(request).await.unwrap();
        assert_eq!(response.request_id, request_id);
        assert_eq!(response.status(), ToolStatus::Error);
        match response.outcome {
            ToolOutcome::Error(failure) => assert_eq!(failure.reason, ProviderReason::Unavailable),
            other => panic!("Expected error outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invoke_times_out() {
        let registry = ToolRegistry::new(Duration::from_millis(20));
        registry
            .register(
                "events",
                Arc::new(SlowProvider {
                    delay: Duration::from_secs(5),
                    calls: AtomicUsize::new(0),
                }),
            )
            .unwrap();

        let response = registry
            .invoke(ToolRequest::new("events", ToolArgs::new()))
            .await
            .unwrap();
        match response.outcome {
            ToolOutcome::Error(failure) => assert_eq!(failure.reason, ProviderReason::Timeout),
            other => panic!("Expected timeout, got {:?}", other),
        }
        assert_eq!(registry.metrics_snapshot()[0].timeouts, 1);
    }

    #[tokio::test]
    async fn test_invoke_survives_panicking_provider() {
        let registry = ToolRegistry::default();
        registry.register("routing", Arc::new(PanickingProvider)).unwrap();

        let response = registry
            .invoke(ToolRequest::new("routing", ToolArgs::new()))
            .await
            .unwrap();
        match response.outcome {
            ToolOutcome::Error(failure) => assert_eq!(failure.reason, ProviderReason::Internal),
            other => panic!("Expected internal error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_batch_preserves_order_and_isolates_failures() {
        let registry = registry();
        let requests = vec![
            ToolRequest::new("lodging", ToolArgs::new()),
            ToolRequest::new("flights", ToolArgs::new()),
            ToolRequest::new("weather", ToolArgs::new()),
        ];
        let ids: Vec<_> = requests.iter().map(|r| r.id.clone()).collect();

        let responses = registry.invoke_batch(requests).await;
        assert_eq!(responses.len(), 3);
        for (response, id) in responses.iter().zip(&ids) {
            assert_eq!(&response.request_id, id);
        }
        assert_eq!(responses[0].status(), ToolStatus::Error);
        match &responses[1].outcome {
            ToolOutcome::Error(failure) => assert_eq!(failure.reason, ProviderReason::UnknownTool),
            other => panic!("Expected unknown tool, got {:?}", other),
        }
        assert_eq!(responses[2].status(), ToolStatus::Ok);
    }

    #[tokio::test]
    async fn test_batch_runs_concurrently() {
        let registry = ToolRegistry::new(Duration::from_secs(2));
        let slow = Arc::new(SlowProvider {
            delay: Duration::from_millis(150),
            calls: AtomicUsize::new(0),
        });
        registry.register("events", slow.clone()).unwrap();

        let started = Instant::now();
        let responses = registry
            .invoke_batch((0..4).map(|_| ToolRequest::new("events", ToolArgs::new())).collect())
            .await;

        assert_eq!(responses.len(), 4);
        assert!(responses.iter().all(|r| r.is_ok()));
        assert_eq!(slow.calls.load(Ordering::SeqCst), 4);
        // Four sequential calls would take 600ms
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_metrics_recorded_per_tool() {
        let registry = registry();
        registry
            .invoke_batch(vec![
                ToolRequest::new("weather", ToolArgs::new()),
                ToolRequest::new("lodging", ToolArgs::new()),
                ToolRequest::new("lodging", ToolArgs::new()),
            ])
            .await;

        let stats = registry.metrics_snapshot();
        let lodging = stats.iter().find(|s| s.tool == "lodging").unwrap();
        let weather = stats.iter().find(|s| s.tool == "weather").unwrap();
        assert_eq!(lodging.calls, 2);
        assert_eq!(lodging.errors, 2);
        assert_eq!(weather.errors, 0);
    }
}
