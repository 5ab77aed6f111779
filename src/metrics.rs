// Prometheus metrics for tool invocations
//
// Exposed on the /metrics endpoint of the HTTP layer:
// - Tool invocations by outcome (counter)
// - Tool run durations (histogram)
// - Background cracking jobs still running (gauge)
//
// The registry is owned by a ToolMetrics value that is built at startup and
// passed to the executor and the server.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::fmt;
use std::time::Duration;

/// Metric handles plus the registry they are registered in
#[derive(Clone)]
pub struct ToolMetrics {
    registry: Registry,
    invocations_total: IntCounterVec,
    duration_seconds: HistogramVec,
    jobs_running: IntGauge,
}

impl fmt::Debug for ToolMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolMetrics")
            .field("jobs_running", &self.jobs_running.get())
            .finish()
    }
}

impl ToolMetrics {
    /// Create and register all metrics in a fresh registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let invocations_total = IntCounterVec::new(
            Opts::new("tool_invocations_total", "Total number of external tool invocations"),
            &["tool", "outcome"],
        )?;
        let duration_seconds = HistogramVec::new(
            HistogramOpts::new("tool_duration_seconds", "Time spent waiting on external tools")
                .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0]),
            &["tool"],
        )?;
        let jobs_running = IntGauge::new(
            "cracking_jobs_running",
            "Background cracking jobs that have not exited yet",
        )?;

        registry.register(Box::new(invocations_total.clone()))?;
        registry.register(Box::new(duration_seconds.clone()))?;
        registry.register(Box::new(jobs_running.clone()))?;

        Ok(Self {
            registry,
            invocations_total,
            duration_seconds,
            jobs_running,
        })
    }

    /// Record one finished (or detached) invocation
    pub fn observe(&self, tool: &str, outcome: &str, elapsed: Duration) {
        self.invocations_total
            .with_label_values(&[tool, outcome])
            .inc();
        self.duration_seconds
            .with_label_values(&[tool])
            .observe(elapsed.as_secs_f64());
    }

    pub fn job_started(&self) {
        self.jobs_running.inc();
    }

    pub fn job_finished(&self) {
        self.jobs_running.dec();
    }

    pub fn jobs_running(&self) -> i64 {
        self.jobs_running.get()
    }

    /// Current count for a tool/outcome pair
    pub fn invocations(&self, tool: &str, outcome: &str) -> u64 {
        self.invocations_total
            .with_label_values(&[tool, outcome])
            .get()
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
        String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_counts_by_outcome() {
        let metrics = ToolMetrics::new().unwrap();
        metrics.observe("nmap", "completed", Duration::from_millis(250));
        metrics.observe("nmap", "completed", Duration::from_millis(300));
        metrics.observe("nmap", "execution", Duration::from_millis(10));

        assert_eq!(metrics.invocations("nmap", "completed"), 2);
        assert_eq!(metrics.invocations("nmap", "execution"), 1);
        assert_eq!(metrics.invocations("john", "completed"), 0);
    }

    #[test]
    fn test_job_gauge() {
        let metrics = ToolMetrics::new().unwrap();
        metrics.job_started();
        metrics.job_started();
        metrics.job_finished();
        assert_eq!(metrics.jobs_running(), 1);
    }

    #[test]
    fn test_gather_text_format() {
        let metrics = ToolMetrics::new().unwrap();
        metrics.observe("msfconsole", "timed_out_partial", Duration::from_secs(15));

        let text = metrics.gather().unwrap();
        assert!(text.contains("tool_invocations_total"));
        assert!(text.contains("msfconsole"));
        assert!(text.contains("cracking_jobs_running"));
    }

    #[test]
    fn test_independent_registries() {
        // Each instance owns its registry, so building two must not collide
        assert!(ToolMetrics::new().is_ok());
        assert!(ToolMetrics::new().is_ok());
    }
}
