//! Job/Session Registry
//!
//! In-memory bookkeeping that correlates a background cracking job (keyed by
//! its hash-file path) or an exploit session (keyed by the console's session
//! id) with the process that produced it. Entries live as long as the hosting
//! process; nothing is evicted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Lifecycle of a background job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Running,
    /// `code` is `None` when the process was killed by a signal
    Exited { code: Option<i32> },
}

/// Bookkeeping for one background job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_key: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub state: JobState,
    /// How many times a job was started under this key
    pub runs: u32,
}

impl JobRecord {
    pub fn is_running(&self) -> bool {
        self.state == JobState::Running
    }
}

/// An exploit session observed in console output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: u32,
    pub module: String,
    pub target: String,
    pub opened_at: DateTime<Utc>,
}

/// Point-in-time copy of the registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub jobs: Vec<JobRecord>,
    pub sessions: Vec<SessionRecord>,
}

/// Shared registry; clones refer to the same maps
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<String, JobRecord>>>,
    sessions: Arc<RwLock<HashMap<u32, SessionRecord>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly started job
    ///
    /// Starting again under an existing key replaces the pid and start time
    /// and bumps `runs`.
    pub async fn register_job(&self, job_key: &str, pid: u32) -> JobRecord {
        let mut jobs = self.jobs.write().await;
        let runs = jobs.get(job_key).map_or(0, |r| r.runs) + 1;

        let record = JobRecord {
            job_key: job_key.to_string(),
            pid,
            started_at: Utc::now(),
            finished_at: None,
            state: JobState::Running,
            runs,
        };
        jobs.insert(job_key.to_string(), record.clone());

        debug!(job_key, pid, runs, "Registered job");
        record
    }

    /// Mark the job as exited if `pid` is still the one on record
    ///
    /// Returns `false` when the key is unknown or a newer run has replaced
    /// the record.
    pub async fn mark_exited(&self, job_key: &str, pid: u32, code: Option<i32>) -> bool {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(job_key) {
            Some(record) if record.pid == pid => {
                record.state = JobState::Exited { code };
                record.finished_at = Some(Utc::now());
                debug!(job_key, pid, ?code, "Job exited");
                true
            }
            Some(record) => {
                debug!(job_key, pid, current = record.pid, "Ignoring exit of superseded run");
                false
            }
            None => {
                warn!(job_key, pid, "Exit reported for unknown job");
                false
            }
        }
    }

    pub async fn job(&self, job_key: &str) -> Option<JobRecord> {
        self.jobs.read().await.get(job_key).cloned()
    }

    /// All jobs, oldest first
    pub async fn jobs(&self) -> Vec<JobRecord> {
        let mut jobs: Vec<_> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.job_key.cmp(&b.job_key)));
        jobs
    }

    pub async fn record_session(&self, session_id: u32, module: &str, target: &str) -> SessionRecord {
        let record = SessionRecord {
            session_id,
            module: module.to_string(),
            target: target.to_string(),
            opened_at: Utc::now(),
        };
        self.sessions
            .write()
            .await
            .insert(session_id, record.clone());
        debug!(session_id, module, target, "Recorded session");
        record
    }

    pub async fn session(&self, session_id: u32) -> Option<SessionRecord> {
        self.sessions.read().await.get(&session_id).cloned()
    }

    /// All sessions ordered by id
    pub async fn sessions(&self) -> Vec<SessionRecord> {
        let mut sessions: Vec<_> = self.sessions.read().await.values().cloned().collect();
        sessions.sort_by_key(|s| s.session_id);
        sessions
    }

    pub async fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            jobs: self.jobs().await,
            sessions: self.sessions().await,
        }
    }
}
