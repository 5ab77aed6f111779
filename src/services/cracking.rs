//! Offline hash cracking (`john`)
//!
//! Cracking runs detached: the call returns once john is spawned and the job
//! is registered under its hash-file path. A watcher task records the exit in
//! the registry. Progress is read back with `john --show`, which is
//! idempotent and can be polled at any time.

use super::{non_blank, run_for_stdout};
use crate::config::Config;
use crate::error::ToolError;
use crate::metrics::ToolMetrics;
use crate::models::{CrackStarted, CrackStatus};
use crate::parsers::parse_cracked;
use crate::registry::JobRegistry;
use crate::tools::{ExecutionOutcome, LifecyclePolicy, ProcessRunner, SafePath, ToolInvocation};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

const TOOL: &str = "john";

#[derive(Clone)]
pub struct CrackingService {
    runner: Arc<dyn ProcessRunner>,
    john: String,
    hash_format: String,
    default_wordlist: Option<PathBuf>,
    status_policy: LifecyclePolicy,
    registry: JobRegistry,
    metrics: Option<Arc<ToolMetrics>>,
}

impl CrackingService {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: &Config, registry: JobRegistry) -> Self {
        Self {
            runner,
            john: config.tools.john.clone(),
            hash_format: config.cracking.hash_format.clone(),
            default_wordlist: config.cracking.default_wordlist.clone(),
            status_policy: config.timeouts.sync_policy(),
            registry,
            metrics: None,
        }
    }

    /// Count running jobs in `metrics`
    pub fn with_metrics(mut self, metrics: Arc<ToolMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn format_arg(&self) -> String {
        format!("--format={}", self.hash_format)
    }

    /// Wordlist argument, if one was requested (or configured) and exists
    fn wordlist_arg(&self, requested: Option<&str>) -> Result<Option<String>, ToolError> {
        let configured = self
            .default_wordlist
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());

        let Some(candidate) = non_blank(requested).or(configured.as_deref()) else {
            return Ok(None);
        };
        let wordlist = SafePath::parse(candidate, "wordlist")?;

        if wordlist.as_path().is_file() {
            Ok(Some(format!("--wordlist={}", wordlist)))
        } else {
            warn!(wordlist = %wordlist, "Wordlist not found; using john's default mode");
            Ok(None)
        }
    }

    /// Start cracking `hash_file` in the background
    pub async fn start_cracking(
        &self,
        hash_file: &str,
        wordlist: Option<&str>,
    ) -> Result<CrackStarted, ToolError> {
        let hash_file = SafePath::existing(hash_file, "hash_file")?;
        let wordlist = self.wordlist_arg(wordlist)?;

        let mut invocation =
            ToolInvocation::new(TOOL, &self.john, LifecyclePolicy::FireAndForget).arg(self.format_arg());
        if let Some(wordlist) = wordlist {
            invocation = invocation.arg(wordlist);
        }
        invocation = invocation.arg(hash_file.as_str());

        let process = match self.runner.run(invocation).await? {
            ExecutionOutcome::Detached(process) => process,
            other => {
                return Err(ToolError::Execution {
                    tool: TOOL.to_string(),
                    exit_code: other.output().and_then(|o| o.exit_code),
                    stderr: format!("expected a detached process, got {}", other.label()),
                })
            }
        };

        let pid = process.pid;
        let job_key = hash_file.to_string();
        self.registry.register_job(&job_key, pid).await;
        if let Some(ref metrics) = self.metrics {
            metrics.job_started();
        }

        let registry = self.registry.clone();
        let metrics = self.metrics.clone();
        let key = job_key.clone();
        tokio::spawn(async move {
            let code = process.wait().await;
            if let Some(metrics) = metrics {
                metrics.job_finished();
            }
            registry.mark_exited(&key, pid, code).await;
        });

        info!(job_key = %job_key, pid, "Cracking started");
        Ok(CrackStarted {
            started: true,
            message: "John the Ripper started".to_string(),
            job_key,
            pid,
        })
    }

    /// Passwords cracked so far for `hash_file`
    pub async fn get_cracking_status(&self, hash_file: &str) -> Result<CrackStatus, ToolError> {
        let hash_file = SafePath::parse_positional(hash_file, "hash_file")?;

        let invocation = ToolInvocation::new(TOOL, &self.john, self.status_policy)
            .arg("--show")
            .arg(self.format_arg())
            .arg(hash_file.as_str());
        let output = run_for_stdout(self.runner.as_ref(), invocation).await?;

        let cracked = parse_cracked(&output);
        let job = self.registry.job(hash_file.as_str()).await;
        info!(job_key = %hash_file, cracked = cracked.len(), "Cracking status");

        Ok(CrackStatus {
            success: true,
            cracked_count: cracked.len(),
            cracked_passwords: cracked,
            output,
            job,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationFailure;
    use crate::registry::JobState;
    use crate::tools::testing::RecordingRunner;
    use std::time::Duration;
    use tempfile::{NamedTempFile, TempDir};

    fn service_with(runner: RecordingRunner, config: Config) -> (CrackingService, Arc<RecordingRunner>, JobRegistry) {
        let runner = Arc::new(runner);
        let registry = JobRegistry::new();
        (
            CrackingService::new(runner.clone(), &config, registry.clone()),
            runner,
            registry,
        )
    }

    fn service(runner: RecordingRunner) -> (CrackingService, Arc<RecordingRunner>, JobRegistry) {
        service_with(runner, Config::default())
    }

    fn hash_file() -> NamedTempFile {
        let file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        std::fs::write(file.path(), "root:$6$abc$hashvalue\n").unwrap();
        file
    }

    fn path_str(file: &NamedTempFile) -> String {
        file.path().to_string_lossy().into_owned()
    }

    async fn wait_for_exit(registry: &JobRegistry, key: &str) -> JobState {
        for _ in 0..50 {
            if let Some(job) = registry.job(key).await {
                if !job.is_running() {
                    return job.state;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {key} never exited");
    }

    #[tokio::test]
    async fn test_start_registers_and_tracks_exit() {
        let hashes = hash_file();
        let key = path_str(&hashes);
        let metrics = Arc::new(ToolMetrics::new().unwrap());
        let (svc, runner, registry) = service(RecordingRunner::new().detached(31337, Some(0)));
        let svc = svc.with_metrics(metrics.clone());

        let started = svc.start_cracking(&key, None).await.unwrap();
        assert!(started.started);
        assert_eq!(started.pid, 31337);
        assert_eq!(started.job_key, key);

        let call = &runner.invocations()[0];
        assert_eq!(call.policy, LifecyclePolicy::FireAndForget);
        assert_eq!(call.args, vec!["--format=sha512crypt".to_string(), key.clone()]);

        assert_eq!(wait_for_exit(&registry, &key).await, JobState::Exited { code: Some(0) });
        assert_eq!(metrics.jobs_running(), 0);
    }

    #[tokio::test]
    async fn test_missing_hash_file_spawns_nothing() {
        let (svc, runner, registry) = service(RecordingRunner::new());
        let err = svc
            .start_cracking("/nonexistent/hashes.txt", None)
            .await
            .unwrap_err();
        match err {
            ToolError::Validation(v) => {
                assert_eq!(v.field, "hash_file");
                assert_eq!(v.reason, ValidationFailure::NotFound);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(runner.invocations().is_empty());
        assert!(registry.jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_existing_wordlist_is_passed() {
        let hashes = hash_file();
        let words = NamedTempFile::new().unwrap();
        let (svc, runner, _) = service(RecordingRunner::new().detached(1, None));

        svc.start_cracking(&path_str(&hashes), Some(&path_str(&words)))
            .await
            .unwrap();

        let args = &runner.invocations()[0].args;
        assert_eq!(args[1], format!("--wordlist={}", path_str(&words)));
        assert_eq!(args[2], path_str(&hashes));
    }

    #[tokio::test]
    async fn test_missing_wordlist_is_skipped() {
        let hashes = hash_file();
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("rockyou.txt");
        let (svc, runner, _) = service(RecordingRunner::new().detached(1, None));

        svc.start_cracking(&path_str(&hashes), Some(missing.to_str().unwrap()))
            .await
            .unwrap();

        let args = &runner.invocations()[0].args;
        assert_eq!(args.len(), 2);
        assert!(!args.iter().any(|a| a.starts_with("--wordlist")));
    }

    #[tokio::test]
    async fn test_configured_default_wordlist() {
        let hashes = hash_file();
        let words = NamedTempFile::new().unwrap();
        let mut config = Config::default();
        config.cracking.default_wordlist = Some(words.path().to_path_buf());
        config.cracking.hash_format = "md5crypt".to_string();
        let (svc, runner, _) = service_with(RecordingRunner::new().detached(1, None), config);

        svc.start_cracking(&path_str(&hashes), None).await.unwrap();

        let args = &runner.invocations()[0].args;
        assert_eq!(args[0], "--format=md5crypt");
        assert!(args[1].starts_with("--wordlist="));
    }

    #[tokio::test]
    async fn test_status_parses_show_report() {
        let (svc, runner, registry) = service(
            RecordingRunner::new().completed("root:toor:19000:0:99999:7:::\n\n1 password hash cracked, 0 left\n"),
        );
        registry.register_job("/tmp/hashes.txt", 77).await;

        let status = svc.get_cracking_status("/tmp/hashes.txt").await.unwrap();
        assert!(status.success);
        assert_eq!(status.cracked_count, 1);
        assert_eq!(status.cracked_passwords[0].password, "toor");
        assert_eq!(status.job.unwrap().pid, 77);

        assert_eq!(
            runner.invocations()[0].args,
            vec!["--show", "--format=sha512crypt", "/tmp/hashes.txt"]
        );
    }

    #[tokio::test]
    async fn test_status_is_repeatable() {
        let report = "root:toor:19000:0:99999:7:::\n";
        let (svc, _, _) = service(RecordingRunner::new().completed(report).completed(report));

        let first = svc.get_cracking_status("hashes.txt").await.unwrap();
        let second = svc.get_cracking_status("hashes.txt").await.unwrap();
        assert_eq!(first.cracked_passwords, second.cracked_passwords);
        assert!(first.job.is_none());
    }
}
