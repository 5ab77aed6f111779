//! Process Executor
//!
//! Spawns external tools as argument vectors (never through a shell),
//! supervises them according to their [`LifecyclePolicy`] and captures
//! stdout/stderr incrementally so that a killed process still yields whatever
//! it printed before the cutoff.

use super::timeout::{within, LifecyclePolicy};
use crate::error::ToolError;
use crate::metrics::ToolMetrics;
use async_trait::async_trait;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Maximum captured size per stream in bytes (4MB)
const MAX_OUTPUT_SIZE: usize = 4 * 1024 * 1024;

/// How long to keep reading pipes after the child is gone
const DEFAULT_DRAIN_SECS: u64 = 2;

/// One external tool run: what to execute and how to wait on it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Logical tool name (errors, logs, metrics)
    pub tool: String,

    /// Binary name or path to execute
    pub program: String,

    /// Argument vector, passed verbatim
    pub args: Vec<String>,

    /// Wait policy, fixed before spawn
    pub policy: LifecyclePolicy,
}

impl ToolInvocation {
    pub fn new(tool: impl Into<String>, program: impl Into<String>, policy: LifecyclePolicy) -> Self {
        Self {
            tool: tool.into(),
            program: program.into(),
            args: Vec::new(),
            policy,
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Human-readable command line for logs
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            if arg.contains(' ') {
                line.push_str(&format!("{:?}", arg));
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

/// Output captured from a supervised process
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapturedOutput {
    pub pid: Option<u32>,

    /// Exit code (None if the process was killed or ended by a signal)
    pub exit_code: Option<i32>,

    pub stdout: String,

    pub stderr: String,

    pub duration_ms: f64,
}

impl CapturedOutput {
    /// True when neither stream produced anything
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }
}

/// Handle to a fire-and-forget child
///
/// The child itself is owned by a background reaper; only its pid and a
/// completion signal are handed back.
#[derive(Debug)]
pub struct DetachedProcess {
    pub pid: u32,
    completion: oneshot::Receiver<Option<i32>>,
}

impl DetachedProcess {
    pub fn new(pid: u32, completion: oneshot::Receiver<Option<i32>>) -> Self {
        Self { pid, completion }
    }

    /// Wait for the background process to end and return its exit code
    pub async fn wait(self) -> Option<i32> {
        self.completion.await.ok().flatten()
    }
}

/// Result of running a tool under its lifecycle policy
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// Process exited on its own
    Completed(CapturedOutput),

    /// Process was killed at the deadline; partial output is attached
    TimedOutWithOutput(CapturedOutput),

    /// Process was killed at the deadline without printing anything
    TimedOutEmpty { pid: Option<u32> },

    /// Process was left running in the background
    Detached(DetachedProcess),
}

impl ExecutionOutcome {
    /// Captured output, if any was collected
    pub fn output(&self) -> Option<&CapturedOutput> {
        match self {
            Self::Completed(out) | Self::TimedOutWithOutput(out) => Some(out),
            Self::TimedOutEmpty { .. } | Self::Detached(_) => None,
        }
    }

    /// Captured output, consuming the outcome
    pub fn into_output(self) -> CapturedOutput {
        match self {
            Self::Completed(out) | Self::TimedOutWithOutput(out) => out,
            Self::TimedOutEmpty { pid } => CapturedOutput {
                pid,
                ..Default::default()
            },
            Self::Detached(detached) => CapturedOutput {
                pid: Some(detached.pid),
                ..Default::default()
            },
        }
    }

    pub fn timed_out(&self) -> bool {
        matches!(self, Self::TimedOutWithOutput(_) | Self::TimedOutEmpty { .. })
    }

    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::TimedOutWithOutput(_) => "timed_out_partial",
            Self::TimedOutEmpty { .. } => "timed_out_empty",
            Self::Detached(_) => "detached",
        }
    }
}

/// Seam between the services and the operating system
///
/// Synchronous invocations that exit non-zero or exceed their ceiling are
/// reported as errors; bounded invocations never fail on timeout.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, invocation: ToolInvocation) -> Result<ExecutionOutcome, ToolError>;
}

/// Configuration for tool execution
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum captured bytes per stream (default: 4MB)
    pub max_output_size: usize,

    /// Time allowed for pipes to drain after the child ended (default: 2s)
    pub drain_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_output_size: MAX_OUTPUT_SIZE,
            drain_timeout: Duration::from_secs(DEFAULT_DRAIN_SECS),
        }
    }
}

impl ExecutorConfig {
    /// Create a new executor config with custom output limit
    pub fn with_max_output_size(size: usize) -> Self {
        Self {
            max_output_size: size,
            ..Default::default()
        }
    }

    /// Set the pipe drain timeout
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }
}

/// Tool executor backed by `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct ToolExecutor {
    config: ExecutorConfig,
    metrics: Option<Arc<ToolMetrics>>,
}

impl ToolExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ExecutorConfig) -> Self {
        Self {
            config,
            metrics: None,
        }
    }

    /// Record invocation counts and durations into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<ToolMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    async fn execute(&self, invocation: &ToolInvocation) -> Result<ExecutionOutcome, ToolError> {
        let start = Instant::now();
        info!(
            tool = %invocation.tool,
            policy = invocation.policy.label(),
            deadline = ?invocation.policy.deadline(),
            "Executing {} ({} args)",
            invocation.program,
            invocation.args.len()
        );
        debug!("Command line: {}", invocation.command_line());

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args).stdin(Stdio::null());

        if invocation.policy == LifecyclePolicy::FireAndForget {
            // Nobody reads these pipes; a full pipe would stall the tool
            command.stdout(Stdio::null()).stderr(Stdio::null());
        } else {
            // A dropped caller must not leave a supervised child running
            command
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);
        }

        let child = command
            .spawn()
            .map_err(|err| spawn_error(&invocation.program, err))?;

        match invocation.policy {
            LifecyclePolicy::FireAndForget => detach(child, &invocation.tool),
            LifecyclePolicy::SyncWait { ceiling } => {
                let (status, output) = self.supervise(child, &[ceiling], start).await?;
                match status {
                    Some(status) if status.success() => Ok(ExecutionOutcome::Completed(output)),
                    Some(_) => {
                        warn!(
                            "{} failed (exit code: {:?})",
                            invocation.tool, output.exit_code
                        );
                        let stderr = if output.stderr.trim().is_empty() {
                            "Unknown error".to_string()
                        } else {
                            output.stderr.trim().to_string()
                        };
                        Err(ToolError::Execution {
                            tool: invocation.tool.clone(),
                            exit_code: output.exit_code,
                            stderr,
                        })
                    }
                    None => {
                        warn!("{} timed out after {:?}", invocation.tool, ceiling);
                        Err(ToolError::TimedOut {
                            tool: invocation.tool.clone(),
                            after: ceiling,
                        })
                    }
                }
            }
            LifecyclePolicy::BoundedWait { grace, collect } => {
                let (status, output) = self.supervise(child, &[grace, collect], start).await?;
                match status {
                    Some(_) => Ok(ExecutionOutcome::Completed(output)),
                    None if output.is_empty() => {
                        info!("{} killed at deadline without output", invocation.tool);
                        Ok(ExecutionOutcome::TimedOutEmpty { pid: output.pid })
                    }
                    None => {
                        info!(
                            "{} killed at deadline with {} bytes of partial output",
                            invocation.tool,
                            output.stdout.len() + output.stderr.len()
                        );
                        Ok(ExecutionOutcome::TimedOutWithOutput(output))
                    }
                }
            }
        }
    }

    /// Wait through each window in turn; kill the child when all have elapsed
    ///
    /// Returns `None` as status when the child had to be killed.
    async fn supervise(
        &self,
        mut child: Child,
        windows: &[Duration],
        start: Instant,
    ) -> Result<(Option<ExitStatus>, CapturedOutput), ToolError> {
        let pid = child.id();
        let stdout = CaptureBuffer::new(self.config.max_output_size);
        let stderr = CaptureBuffer::new(self.config.max_output_size);
        let stdout_reader = child.stdout.take().map(|pipe| stdout.spawn_reader(pipe));
        let stderr_reader = child.stderr.take().map(|pipe| stderr.spawn_reader(pipe));

        let mut status = None;
        for (phase, window) in windows.iter().enumerate() {
            if let Some(result) = within(*window, child.wait()).await {
                status = Some(result?);
                break;
            }
            debug!(?pid, phase, "Still running after {:?}", window);
        }

        if status.is_none() {
            if let Err(err) = child.kill().await {
                warn!(?pid, "Failed to kill timed-out process: {}", err);
            }
        }

        for reader in [stdout_reader, stderr_reader].into_iter().flatten() {
            self.drain(reader).await;
        }

        let output = CapturedOutput {
            pid,
            exit_code: status.and_then(|s| s.code()),
            stdout: stdout.contents(),
            stderr: stderr.contents(),
            duration_ms: start.elapsed().as_millis() as f64,
        };
        Ok((status, output))
    }

    /// Give a pipe reader a bounded chance to reach EOF
    ///
    /// A grandchild may hold the pipe open after the child is gone; in that
    /// case the reader is aborted and the bytes read so far are kept.
    async fn drain(&self, mut reader: JoinHandle<()>) {
        if within(self.config.drain_timeout, &mut reader).await.is_none() {
            debug!("Pipe still open after {:?}; abandoning reader", self.config.drain_timeout);
            reader.abort();
        }
    }
}

#[async_trait]
impl ProcessRunner for ToolExecutor {
    async fn run(&self, invocation: ToolInvocation) -> Result<ExecutionOutcome, ToolError> {
        let start = Instant::now();
        let result = self.execute(&invocation).await;
        if let Some(ref metrics) = self.metrics {
            let label = match &result {
                Ok(outcome) => outcome.label(),
                Err(err) => err.kind(),
            };
            metrics.observe(&invocation.tool, label, start.elapsed());
        }
        result
    }
}

/// Map a spawn failure; a missing binary gets its own error kind
fn spawn_error(program: &str, err: io::Error) -> ToolError {
    if err.kind() == io::ErrorKind::NotFound {
        warn!("{} is not installed", program);
        ToolError::NotInstalled {
            binary: program.to_string(),
        }
    } else {
        ToolError::Io(err)
    }
}

/// Hand the child to a background reaper and return immediately
fn detach(mut child: Child, tool: &str) -> Result<ExecutionOutcome, ToolError> {
    let pid = child
        .id()
        .ok_or_else(|| io::Error::other("spawned process has no pid"))?;
    let (tx, rx) = oneshot::channel();
    let tool = tool.to_string();

    tokio::spawn(async move {
        let code = match child.wait().await {
            Ok(status) => status.code(),
            Err(err) => {
                warn!(pid, "Failed to wait on background {}: {}", tool, err);
                None
            }
        };
        info!(pid, "Background {} exited (exit code: {:?})", tool, code);
        let _ = tx.send(code);
    });

    info!(pid, "Detached background process");
    Ok(ExecutionOutcome::Detached(DetachedProcess::new(pid, rx)))
}

/// Shared, size-limited sink for one output stream
#[derive(Debug, Clone)]
struct CaptureBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
    limit: usize,
}

impl CaptureBuffer {
    fn new(limit: usize) -> Self {
        Self {
            bytes: Arc::new(Mutex::new(Vec::new())),
            limit,
        }
    }

    fn spawn_reader<R>(&self, pipe: R) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let sink = self.clone();
        tokio::spawn(async move { sink.fill(pipe).await })
    }

    async fn fill<R: AsyncRead + Unpin>(&self, mut pipe: R) {
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => self.push(&chunk[..n]),
                Err(err) => {
                    debug!("Pipe read failed: {}", err);
                    break;
                }
            }
        }
    }

    fn push(&self, data: &[u8]) {
        let mut bytes = self.bytes.lock().unwrap_or_else(|e| e.into_inner());
        // Keep one byte past the limit so truncation is detectable
        let room = (self.limit + 1).saturating_sub(bytes.len());
        bytes.extend_from_slice(&data[..data.len().min(room)]);
    }

    fn contents(&self) -> String {
        let bytes = self.bytes.lock().unwrap_or_else(|e| e.into_inner());
        truncate_string(String::from_utf8_lossy(&bytes).into_owned(), self.limit)
    }
}

/// Truncate a string to a maximum length, adding ellipsis if truncated
fn truncate_string(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        let mut cut = max_len.saturating_sub(3);
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push_str("...");
    }
    s
}
