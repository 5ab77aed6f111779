//! `john --show` report

use crate::models::CrackedCredential;

/// Cracked `username:password` pairs
///
/// Re-running against the same report yields the same records, so status can
/// be polled at any time.
pub fn parse_cracked(output: &str) -> Vec<CrackedCredential> {
    output
        .lines()
        .filter(|line| line.contains(':') && !line.starts_with('#'))
        .filter_map(|line| {
            let mut fields = line.split(':');
            let username = fields.next()?;
            let password = fields.next()?;
            Some(CrackedCredential {
                username: username.to_string(),
                password: password.to_string(),
            })
        })
        .collect()
}
