//! Shadow-file lines (`user:$id$salt$hash:...`)

use crate::models::CredentialHash;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SHADOW_ENTRY: Regex =
        Regex::new(r"^([^:]+):(\$[0-9a-zA-Z$./]+):").expect("static regex");
}

/// Crypt-format hashes, one per fully matching line
///
/// Locked (`!`, `*`) and empty password fields never match and are skipped.
pub fn parse_credentials(output: &str) -> Vec<CredentialHash> {
    output
        .lines()
        .filter_map(|line| SHADOW_ENTRY.captures(line))
        .map(|c| CredentialHash {
            username: c[1].to_string(),
            hash: c[2].to_string(),
        })
        .collect()
}

/// `username:hash` lines as written to the loot artifact
pub fn render_hash_file(hashes: &[CredentialHash]) -> String {
    hashes
        .iter()
        .map(|h| format!("{}:{}\n", h.username, h.hash))
        .collect()
}
