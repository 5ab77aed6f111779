//! Orchestration Facade
//!
//! One service per tool family. Each capability sanitizes its inputs, builds
//! the argument vector or resource script, runs it under the tool's lifecycle
//! policy, parses the output and updates the registry where needed. Callers
//! never see a command line.
//!
//! Services are constructed once and shared; they hold no per-request state.

pub mod cracking;
pub mod metasploit;
pub mod network;
pub mod scanner;

pub use cracking::CrackingService;
pub use metasploit::MetasploitService;
pub use network::NetworkService;
pub use scanner::{ScanType, ScannerService};

use crate::config::Config;
use crate::error::ToolError;
use crate::metrics::ToolMetrics;
use crate::registry::JobRegistry;
use crate::tools::{ProcessRunner, ToolExecutor, ToolInvocation};
use std::sync::Arc;

/// Every capability, wired to one runner and one registry
#[derive(Clone)]
pub struct Toolkit {
    pub network: NetworkService,
    pub scanner: ScannerService,
    pub metasploit: MetasploitService,
    pub cracking: CrackingService,
    pub registry: JobRegistry,
}

impl Toolkit {
    pub fn new(config: &Config, runner: Arc<dyn ProcessRunner>, registry: JobRegistry) -> Self {
        Self {
            network: NetworkService::new(runner.clone(), config),
            scanner: ScannerService::new(runner.clone(), config),
            metasploit: MetasploitService::new(runner.clone(), config, registry.clone()),
            cracking: CrackingService::new(runner, config, registry.clone()),
            registry,
        }
    }

    /// Toolkit backed by real processes
    pub fn from_config(config: &Config, metrics: Option<Arc<ToolMetrics>>) -> Self {
        let mut executor = ToolExecutor::with_config(config.timeouts.executor_config());
        if let Some(ref metrics) = metrics {
            executor = executor.with_metrics(metrics.clone());
        }

        let toolkit = Self::new(config, Arc::new(executor), JobRegistry::new());
        match metrics {
            Some(metrics) => toolkit.with_metrics(metrics),
            None => toolkit,
        }
    }

    /// Track background jobs in `metrics`
    pub fn with_metrics(mut self, metrics: Arc<ToolMetrics>) -> Self {
        self.cracking = self.cracking.with_metrics(metrics);
        self
    }
}

/// Run a synchronous invocation and return its stdout
async fn run_for_stdout(
    runner: &dyn ProcessRunner,
    invocation: ToolInvocation,
) -> Result<String, ToolError> {
    Ok(runner.run(invocation).await?.into_output().stdout)
}

/// Treat blank optional inputs as absent
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
