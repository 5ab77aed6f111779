//! Lifecycle Policies
//!
//! How long the executor waits on a spawned tool and what happens when the
//! wait expires. The policy is fixed on the [`ToolInvocation`](super::ToolInvocation)
//! before spawn and never adjusted afterwards.

use std::future::Future;
use std::time::Duration;
use tokio::time;

/// Default ceiling for synchronous tools (10 minutes)
pub const DEFAULT_SYNC_CEILING_SECS: u64 = 600;

/// Wait policy for a tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePolicy {
    /// Block until exit. Exceeding `ceiling` kills the child and is an error.
    SyncWait { ceiling: Duration },

    /// Wait `grace`, then up to `collect` more; after that kill the child and
    /// keep whatever output was captured. Never an error.
    BoundedWait { grace: Duration, collect: Duration },

    /// Return as soon as the child is spawned
    FireAndForget,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self::sync_wait(Duration::from_secs(DEFAULT_SYNC_CEILING_SECS))
    }
}

impl LifecyclePolicy {
    pub fn sync_wait(ceiling: Duration) -> Self {
        Self::SyncWait { ceiling }
    }

    pub fn bounded_wait(grace: Duration, collect: Duration) -> Self {
        Self::BoundedWait { grace, collect }
    }

    /// Total time the executor may spend waiting, if bounded
    pub fn deadline(&self) -> Option<Duration> {
        match *self {
            Self::SyncWait { ceiling } => Some(ceiling),
            Self::BoundedWait { grace, collect } => Some(grace + collect),
            Self::FireAndForget => None,
        }
    }

    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::SyncWait { .. } => "sync",
            Self::BoundedWait { .. } => "bounded",
            Self::FireAndForget => "detached",
        }
    }
}

/// Run `future` for at most `limit`; `None` means the limit expired
pub async fn within<F, T>(limit: Duration, future: F) -> Option<T>
where
    F: Future<Output = T>,
{
    time::timeout(limit, future).await.ok()
}
