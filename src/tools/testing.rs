//! Recording process runner for service tests

use super::executor::{CapturedOutput, DetachedProcess, ExecutionOutcome, ProcessRunner, ToolInvocation};
use crate::error::ToolError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::oneshot;

type Response = Box<dyn FnOnce() -> Result<ExecutionOutcome, ToolError> + Send>;

/// Returns queued outcomes in order and records every invocation
#[derive(Default)]
pub(crate) struct RecordingRunner {
    invocations: Mutex<Vec<ToolInvocation>>,
    scripts: Mutex<Vec<String>>,
    responses: Mutex<VecDeque<Response>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(
        self,
        response: impl FnOnce() -> Result<ExecutionOutcome, ToolError> + Send + 'static,
    ) -> Self {
        self.responses.lock().unwrap().push_back(Box::new(response));
        self
    }

    pub fn completed(self, stdout: &str) -> Self {
        let stdout = stdout.to_string();
        self.respond(move || Ok(ExecutionOutcome::Completed(output(stdout))))
    }

    pub fn timed_out(self, stdout: &str) -> Self {
        let stdout = stdout.to_string();
        self.respond(move || {
            if stdout.is_empty() {
                Ok(ExecutionOutcome::TimedOutEmpty { pid: Some(4242) })
            } else {
                Ok(ExecutionOutcome::TimedOutWithOutput(CapturedOutput {
                    exit_code: None,
                    ..output(stdout)
                }))
            }
        })
    }

    pub fn detached(self, pid: u32, exit_code: Option<i32>) -> Self {
        self.respond(move || {
            let (tx, rx) = oneshot::channel();
            let _ = tx.send(exit_code);
            Ok(ExecutionOutcome::Detached(DetachedProcess::new(pid, rx)))
        })
    }

    pub fn failing(self, error: impl FnOnce() -> ToolError + Send + 'static) -> Self {
        self.respond(move || Err(error()))
    }

    pub fn invocations(&self) -> Vec<ToolInvocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Resource-script bodies seen at run time
    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }
}

fn output(stdout: String) -> CapturedOutput {
    CapturedOutput {
        pid: Some(4242),
        exit_code: Some(0),
        stdout,
        stderr: String::new(),
        duration_ms: 1.0,
    }
}

#[async_trait]
impl ProcessRunner for RecordingRunner {
    async fn run(&self, invocation: ToolInvocation) -> Result<ExecutionOutcome, ToolError> {
        if let Some(pos) = invocation.args.iter().position(|a| a == "-r") {
            if let Some(path) = invocation.args.get(pos + 1) {
                let body = std::fs::read_to_string(path).unwrap_or_default();
                self.scripts.lock().unwrap().push(body);
            }
        }
        self.invocations.lock().unwrap().push(invocation);

        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(response) => response(),
            None => Ok(ExecutionOutcome::Completed(output(String::new()))),
        }
    }
}
