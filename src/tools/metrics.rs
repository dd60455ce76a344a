//! Per-tool call metrics
//!
//! Tracks, for every tool name seen by the registry:
//! - Call counts and error counts
//! - Timeouts
//! - Latency totals and maxima

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::ProviderReason;

/// Snapshot of one tool's counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolStats {
    /// Registered tool name
    pub tool: String,
    /// Calls dispatched (successful or not)
    pub calls: u64,
    /// Calls that ended in an error response
    pub errors: u64,
    /// Subset of errors caused by the per-call deadline
    pub timeouts: u64,
    /// Sum of observed latencies
    pub total_latency_ms: u64,
    /// Slowest observed call
    pub max_latency_ms: u64,
}

impl ToolStats {
    fn new(tool: &str) -> Self {
        Self {
            tool: tool.to_string(),
            ..Default::default()
        }
    }

    /// Mean latency across all calls
    pub fn avg_latency_ms(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.calls as f64
        }
    }

    /// Fraction of calls that failed
    pub fn error_rate(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.errors as f64 / self.calls as f64
        }
    }
}

/// Thread-safe metrics shared by every registry call
#[derive(Debug, Default)]
pub struct ToolMetrics {
    tools: RwLock<HashMap<String, ToolStats>>,
    total_calls: AtomicU64,
    total_errors: AtomicU64,
}

impl ToolMetrics {
    pub fn new() -> Self {
        debug!("ToolMetrics::new: called");
        Self::default()
    }

    /// Record one finished call; `failure` is the reason when it errored
    pub fn record(&self, tool: &str, latency: Duration, failure: Option<ProviderReason>) {
        let latency_ms = latency.as_millis() as u64;
        debug!(%tool, latency_ms, ?failure, "ToolMetrics::record: called");

        if let Ok(mut tools) = self.tools.write() {
            let stats = tools.entry(tool.to_string()).or_insert_with(|| ToolStats::new(tool));
            stats.calls += 1;
            stats.total_latency_ms += latency_ms;
            stats.max_latency_ms = stats.max_latency_ms.max(latency_ms);
            if let Some(reason) = failure {
                stats.errors += 1;
                if reason == ProviderReason::Timeout {
                    stats.timeouts += 1;
                }
            }
        } else {
            debug!(%tool, "record: failed to acquire tools write lock");
        }

        self.total_calls.fetch_add(1, Ordering::Relaxed);
        if failure.is_some() {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Stats for a single tool
    pub fn get(&self, tool: &str) -> Option<ToolStats> {
        self.tools.read().ok()?.get(tool).cloned()
    }

    /// Stats for every tool, sorted by name
    pub fn snapshot(&self) -> Vec<ToolStats> {
        let mut all: Vec<ToolStats> = self
            .tools
            .read()
            .map(|tools| tools.values().cloned().collect())
            .unwrap_or_default();
        all.sort_by(|a, b| a.tool.cmp(&b.tool));
        all
    }

    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }
}
