//! Interface listing (`ifconfig`) and ARP host discovery (`netdiscover`)

use super::{non_blank, run_for_stdout};
use crate::config::Config;
use crate::error::ToolError;
use crate::models::{DiscoveryResult, NetworkInterface};
use crate::parsers::{parse_discovery, parse_interfaces};
use crate::tools::{LifecyclePolicy, ProcessRunner, SafeIdentifier, ToolInvocation};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct NetworkService {
    runner: Arc<dyn ProcessRunner>,
    ifconfig: String,
    netdiscover: String,
    default_range: String,
    policy: LifecyclePolicy,
}

impl NetworkService {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: &Config) -> Self {
        Self {
            runner,
            ifconfig: config.tools.ifconfig.clone(),
            netdiscover: config.tools.netdiscover.clone(),
            default_range: config.defaults.discovery_range.clone(),
            policy: config.timeouts.sync_policy(),
        }
    }

    /// Local interfaces with address, netmask, MAC and link state
    pub async fn list_interfaces(&self) -> Result<Vec<NetworkInterface>, ToolError> {
        let invocation = ToolInvocation::new("ifconfig", &self.ifconfig, self.policy);
        let stdout = run_for_stdout(self.runner.as_ref(), invocation).await?;

        let interfaces = parse_interfaces(&stdout);
        info!(count = interfaces.len(), "Listed network interfaces");
        Ok(interfaces)
    }

    /// Sweep `range` (or the configured default) for live hosts
    pub async fn discover_hosts(
        &self,
        interface: Option<&str>,
        range: Option<&str>,
    ) -> Result<DiscoveryResult, ToolError> {
        let range = SafeIdentifier::parse(
            non_blank(range).unwrap_or(&self.default_range),
            "range",
        )?;
        let interface = non_blank(interface)
            .map(|i| SafeIdentifier::parse(i, "interface"))
            .transpose()?;

        let mut invocation = ToolInvocation::new("netdiscover", &self.netdiscover, self.policy)
            .args(["-r", range.as_str(), "-P"]);
        if let Some(ref iface) = interface {
            invocation = invocation.args(["-i", iface.as_str()]);
        }

        let stdout = run_for_stdout(self.runner.as_ref(), invocation).await?;
        let hosts = parse_discovery(&stdout);
        info!(range = %range, count = hosts.len(), "Host discovery finished");

        Ok(DiscoveryResult {
            success: true,
            count: hosts.len(),
            hosts,
            range: range.to_string(),
        })
    }
}
