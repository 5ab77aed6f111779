//! `ifconfig` output
//!
//! A block starts at every non-indented, non-blank line; the indented lines
//! that follow belong to it. Both the modern net-tools layout
//! (`inet 10.0.0.2  netmask 255.255.255.0`, `ether aa:bb:..`) and the legacy
//! one (`inet addr:10.0.0.2  Mask:255.255.255.0`, `HWaddr aa:bb:..`) are read.

use crate::models::{InterfaceStatus, NetworkInterface};
use lazy_static::lazy_static;
use regex::Regex;
use std::net::Ipv4Addr;

lazy_static! {
    static ref INET: Regex = Regex::new(r"\binet (?:addr:)?(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})")
        .expect("static regex");
    static ref NETMASK: Regex =
        Regex::new(r"(?:\bnetmask |\bMask:)(0x[0-9a-fA-F]+|\d{1,3}(?:\.\d{1,3}){3})")
            .expect("static regex");
    static ref MAC: Regex = Regex::new(r"(?:\bether|\bHWaddr) ([0-9a-fA-F]{2}(?::[0-9a-fA-F]{2}){5})")
        .expect("static regex");
}

/// Parse interface blocks from `ifconfig` output
pub fn parse_interfaces(output: &str) -> Vec<NetworkInterface> {
    let mut interfaces = Vec::new();
    let mut current: Option<NetworkInterface> = None;

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if !line.starts_with(char::is_whitespace) {
            if let Some(done) = current.take() {
                interfaces.push(done);
            }
            current = Some(NetworkInterface {
                name: block_name(line),
                ip: None,
                netmask: None,
                mac: None,
                status: InterfaceStatus::Down,
            });
        }

        let Some(iface) = current.as_mut() else {
            continue;
        };

        if let Some(ip) = INET
            .captures(line)
            .and_then(|c| c[1].parse::<Ipv4Addr>().ok())
        {
            iface.ip = Some(ip);
            iface.status = InterfaceStatus::Up;
        }
        if let Some(c) = NETMASK.captures(line) {
            iface.netmask = Some(c[1].to_string());
        }
        if let Some(c) = MAC.captures(line) {
            iface.mac = Some(c[1].to_string());
        }
    }

    interfaces.extend(current);
    interfaces
}

/// `eth0: flags=...` or `eth0      Link encap:...`
fn block_name(header: &str) -> String {
    let first = header.split_whitespace().next().unwrap_or_default();
    first.trim_end_matches(':').to_string()
}
