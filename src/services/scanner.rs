//! Port scanning (`nmap -oX -`)

use super::{non_blank, run_for_stdout};
use crate::config::Config;
use crate::error::{ToolError, ValidationError, ValidationFailure};
use crate::models::ScanResult;
use crate::parsers::parse_nmap_xml;
use crate::tools::{LifecyclePolicy, PortSpec, ProcessRunner, SafeIdentifier, ToolInvocation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Port flagged as the vsftpd backdoor candidate when open
const VSFTPD_PORT: u16 = 21;

/// nmap scan technique
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    /// Half-open SYN scan (needs raw sockets)
    #[default]
    Syn,
    /// Full connect scan
    Tcp,
    Udp,
}

impl ScanType {
    pub fn flag(&self) -> &'static str {
        match self {
            ScanType::Syn => "-sS",
            ScanType::Tcp => "-sT",
            ScanType::Udp => "-sU",
        }
    }
}

impl FromStr for ScanType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "syn" => Ok(ScanType::Syn),
            "tcp" => Ok(ScanType::Tcp),
            "udp" => Ok(ScanType::Udp),
            _ => Err(ValidationError::new("scan_type", ValidationFailure::NotAllowed)),
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanType::Syn => write!(f, "syn"),
            ScanType::Tcp => write!(f, "tcp"),
            ScanType::Udp => write!(f, "udp"),
        }
    }
}

#[derive(Clone)]
pub struct ScannerService {
    runner: Arc<dyn ProcessRunner>,
    nmap: String,
    default_ports: String,
    policy: LifecyclePolicy,
}

impl ScannerService {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: &Config) -> Self {
        Self {
            runner,
            nmap: config.tools.nmap.clone(),
            default_ports: config.defaults.ports.clone(),
            policy: config.timeouts.sync_policy(),
        }
    }

    /// Scan `ports` (or the default set) on `target`
    pub async fn scan_ports(
        &self,
        target: &str,
        ports: Option<&str>,
        scan_type: ScanType,
    ) -> Result<ScanResult, ToolError> {
        let target = SafeIdentifier::parse_positional(target, "target")?;
        let ports = PortSpec::parse(non_blank(ports).unwrap_or(&self.default_ports), "ports")?;

        let invocation = ToolInvocation::new("nmap", &self.nmap, self.policy).args([
            scan_type.flag(),
            "-p",
            ports.as_str(),
            "-oX",
            "-",
            target.as_str(),
        ]);

        let xml = run_for_stdout(self.runner.as_ref(), invocation).await?;
        let report = parse_nmap_xml(&xml)?;

        let open_ports_count = report.open_count();
        let vsftpd_detected = report.is_open(VSFTPD_PORT);
        info!(
            target = %target,
            %scan_type,
            open = open_ports_count,
            "Port scan finished ({} ports reported)",
            report.ports.len()
        );

        Ok(ScanResult {
            success: true,
            target: target.to_string(),
            ports: report.ports,
            host_state: report.host_state,
            open_ports_count,
            vsftpd_detected,
        })
    }
}
