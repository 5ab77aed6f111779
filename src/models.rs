//! Normalized Records
//!
//! Plain values produced by the parsers and returned by the services. None of
//! them holds a handle to the process they were derived from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// Placeholder for MAC/vendor fields the tool did not report
pub const UNKNOWN: &str = "unknown";

/// Link state derived from interface output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceStatus {
    Up,
    Down,
}

/// One interface block from `ifconfig`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    pub ip: Option<Ipv4Addr>,
    pub netmask: Option<String>,
    pub mac: Option<String>,
    pub status: InterfaceStatus,
}

/// A host answering ARP during discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkHost {
    pub ip: Ipv4Addr,
    /// Colon/dash separated hex, or `unknown`
    pub mac: String,
    /// Free text, or `unknown`
    pub vendor: String,
}

/// Transport protocol of a scanned port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// One row of the target's port table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortResult {
    pub number: u16,
    pub protocol: Protocol,
    /// `open`, `closed`, `filtered`, ...
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl PortResult {
    pub fn is_open(&self) -> bool {
        self.state == "open"
    }
}

/// Parsed port-scan report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortReport {
    pub host_state: String,
    pub ports: Vec<PortResult>,
}

impl PortReport {
    pub fn open_count(&self) -> usize {
        self.ports.iter().filter(|p| p.is_open()).count()
    }

    /// Whether `number` appears as an open port
    pub fn is_open(&self, number: u16) -> bool {
        self.ports.iter().any(|p| p.number == number && p.is_open())
    }
}

/// A live session as listed by the exploitation console
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExploitSession {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub info: String,
}

/// A module returned by an exploit search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExploitModule {
    pub name: String,
    pub rank: String,
    pub description: String,
}

/// A crypt-format hash pulled from a remote shadow file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialHash {
    pub username: String,
    pub hash: String,
}

/// A password recovered by the cracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrackedCredential {
    pub username: String,
    pub password: String,
}

// ---------------------------------------------------------------------------
// Capability results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub success: bool,
    pub hosts: Vec<NetworkHost>,
    pub count: usize,
    pub range: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub success: bool,
    pub target: String,
    pub ports: Vec<PortResult>,
    pub host_state: String,
    pub open_ports_count: usize,
    /// Port 21 open: candidate for the vsftpd backdoor class
    pub vsftpd_detected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExploitResult {
    pub success: bool,
    pub session_id: Option<u32>,
    pub output: String,
    pub error: String,
    /// Console was killed at the deadline
    pub timed_out: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub output: String,
    pub timed_out: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashExtraction {
    pub success: bool,
    pub hashes: Vec<CredentialHash>,
    pub count: usize,
    /// Where the `username:hash` artifact was written
    pub file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrackStarted {
    pub started: bool,
    pub message: String,
    pub job_key: String,
    pub pid: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrackStatus {
    pub success: bool,
    pub cracked_count: usize,
    pub cracked_passwords: Vec<CrackedCredential>,
    pub output: String,
    /// Bookkeeping for a job started through this process, if any
    pub job: Option<crate::registry::JobRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn port(number: u16, state: &str) -> PortResult {
        PortResult {
            number,
            protocol: Protocol::Tcp,
            state: state.to_string(),
            service: None,
            product: None,
            version: None,
        }
    }

    #[test]
    fn test_port_report_counts() {
        let report = PortReport {
            host_state: "up".to_string(),
            ports: vec![port(21, "open"), port(22, "filtered"), port(80, "open")],
        };
        assert_eq!(report.open_count(), 2);
        assert!(report.is_open(21));
        assert!(!report.is_open(22));
        assert!(!report.is_open(443));
    }

    #[test]
    fn test_port_without_service_omits_fields() {
        let value = serde_json::to_value(port(80, "closed")).unwrap();
        assert_eq!(value, json!({"number": 80, "protocol": "tcp", "state": "closed"}));
    }

    #[test]
    fn test_session_serializes_type_field() {
        let session = ExploitSession {
            id: 1,
            kind: "shell".to_string(),
            info: "cmd/unix".to_string(),
        };
        let value = serde_json::to_value(session).unwrap();
        assert_eq!(value["type"], "shell");
    }

    #[test]
    fn test_interface_status_lowercase() {
        let value = serde_json::to_value(InterfaceStatus::Up).unwrap();
        assert_eq!(value, json!("up"));
    }

    #[test]
    fn test_host_ip_serializes_as_string() {
        let host = NetworkHost {
            ip: Ipv4Addr::new(192, 168, 1, 1),
            mac: UNKNOWN.to_string(),
            vendor: UNKNOWN.to_string(),
        };
        let value = serde_json::to_value(host).unwrap();
        assert_eq!(value["ip"], "192.168.1.1");
    }
}
