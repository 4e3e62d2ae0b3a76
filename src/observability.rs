use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Default, Serialize, Clone)]
pub struct MetricsSnapshot {
    pub stages: BTreeMap<String, StageMetrics>,
    pub total_duration_ms: f64,
    pub tool_invocations: u64,
    pub images_converted: u64,
    pub images_skipped: u64,
}

#[derive(Debug, Default, Serialize, Clone)]
pub struct StageMetrics {
    pub calls: u64,
    pub total_duration_ms: f64,
    pub max_duration_ms: f64,
    /// External tools started while this stage was running.
    pub tool_invocations: u64,
}

impl StageMetrics {
    fn observe(&mut self, elapsed_ms: f64) {
        self.calls += 1;
        self.total_duration_ms += elapsed_ms;
        self.max_duration_ms = self.max_duration_ms.max(elapsed_ms);
    }
}

#[derive(Debug, Default, Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsSnapshot>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_stage(&self, stage: &'static str) -> StageTimer {
        StageTimer {
            stage,
            started_at: Instant::now(),
            collector: self.clone(),
        }
    }

    fn update_stage(&self, stage: &str, update: impl FnOnce(&mut StageMetrics)) {
        if let Ok(mut guard) = self.inner.lock() {
            update(guard.stages.entry(stage.to_string()).or_default());
        }
    }

    pub fn record_total_duration(&self, duration: Duration) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.total_duration_ms = duration.as_secs_f64() * 1_000.0;
        }
    }

    pub fn record_tool_invocation(&self, stage: &str) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.tool_invocations += 1;
        }
        self.update_stage(stage, |metrics| metrics.tool_invocations += 1);
    }

    pub fn record_converted(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.images_converted += 1;
        }
    }

    pub fn record_skipped(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.images_skipped += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn reset(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = MetricsSnapshot::default();
        }
    }
}

/// Guard for one stage run. The elapsed time is folded into the stage's
/// metrics on drop, so a stage that returns an error is still counted.
pub struct StageTimer {
    stage: &'static str,
    started_at: Instant,
    collector: MetricsCollector,
}

impl Drop for StageTimer {
    fn drop(&mut self) {
        let elapsed_ms = self.started_at.elapsed().as_secs_f64() * 1_000.0;
        self.collector
            .update_stage(self.stage, |metrics| metrics.observe(elapsed_ms));
        debug!(stage = self.stage, elapsed_ms, "Stage finished");
    }
}

pub fn log_snapshot(snapshot: &MetricsSnapshot) {
    info!(
        total_duration_ms = snapshot.total_duration_ms,
        tool_invocations = snapshot.tool_invocations,
        images_converted = snapshot.images_converted,
        images_skipped = snapshot.images_skipped,
        "Run totals"
    );
    for (stage, metrics) in &snapshot.stages {
        info!(
            stage = stage.as_str(),
            runs = metrics.calls,
            tools = metrics.tool_invocations,
            total_ms = metrics.total_duration_ms,
            slowest_ms = metrics.max_duration_ms,
            "Stage totals"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_records_on_drop() {
        let metrics = MetricsCollector::new();
        {
            let _timer = metrics.start_stage("extract");
        }
        {
            let _timer = metrics.start_stage("extract");
        }
        metrics.record_tool_invocation("extract");
        metrics.record_tool_invocation("bilevel");
        metrics.record_tool_invocation("bilevel");
        metrics.record_converted();
        metrics.record_skipped();
        metrics.record_skipped();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.stages["extract"].calls, 2);
        assert_eq!(snapshot.stages["extract"].tool_invocations, 1);
        assert_eq!(snapshot.stages["bilevel"].tool_invocations, 2);
        assert_eq!(snapshot.stages["bilevel"].calls, 0);
        assert_eq!(snapshot.tool_invocations, 3);
        assert_eq!(snapshot.images_converted, 1);
        assert_eq!(snapshot.images_skipped, 2);

        metrics.reset();
        assert!(metrics.snapshot().stages.is_empty());
    }
}
