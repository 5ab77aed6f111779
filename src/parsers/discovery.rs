//! `netdiscover -P` output
//!
//! ```text
//!  _____________________________________________________________________________
//!    IP            At MAC Address     Count     Len  MAC Vendor / Hostname
//!  -----------------------------------------------------------------------------
//!  192.168.1.1     08:00:27:aa:bb:cc      1      60  PCS Systemtechnik GmbH
//!
//! -- Active scan completed, 1 Hosts found.
//! ```

use crate::models::{NetworkHost, UNKNOWN};
use lazy_static::lazy_static;
use regex::Regex;
use std::net::Ipv4Addr;

lazy_static! {
    static ref IPV4: Regex =
        Regex::new(r"\b(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})\b").expect("static regex");
    static ref MAC: Regex =
        Regex::new(r"\b[0-9A-Fa-f]{2}(?:[:-][0-9A-Fa-f]{2}){5}\b").expect("static regex");
}

/// Columns before the vendor text: IP, MAC, count, length
const VENDOR_COLUMN: usize = 4;

/// Parse discovered hosts, one per line carrying an IPv4 address
pub fn parse_discovery(output: &str) -> Vec<NetworkHost> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty() && !is_header(line))
        .filter_map(parse_host_line)
        .collect()
}

fn is_header(line: &str) -> bool {
    line.contains("IP") && line.contains("MAC")
}

fn parse_host_line(line: &str) -> Option<NetworkHost> {
    let ip = IPV4
        .captures_iter(line)
        .find_map(|c| c[1].parse::<Ipv4Addr>().ok())?;

    let mac = MAC
        .find(line)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string());

    let tokens: Vec<&str> = line.split_whitespace().collect();
    let vendor = if tokens.len() > VENDOR_COLUMN {
        tokens[VENDOR_COLUMN..].join(" ")
    } else {
        UNKNOWN.to_string()
    };

    Some(NetworkHost { ip, mac, vendor })
}
