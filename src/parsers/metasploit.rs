//! msfconsole transcripts: exploit runs, `sessions -l` and `search`

use crate::models::{ExploitModule, ExploitSession};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SHELL_OPENED: Regex =
        Regex::new(r"Command shell session (\d+) opened").expect("static regex");
    static ref SESSION_CREATED: Regex = Regex::new(r"Session (\d+) created").expect("static regex");
    static ref SESSION_ROW: Regex = Regex::new(r"^\s*\d+\s+").expect("static regex");
    static ref DISCLOSURE_DATE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static regex");
}

const DEFAULT_RANK: &str = "normal";

/// Session id announced in an exploit transcript, if any
///
/// The shell-session phrase wins over the generic one when both appear.
pub fn parse_exploit_session(output: &str) -> Option<u32> {
    [&*SHELL_OPENED, &*SESSION_CREATED]
        .iter()
        .find_map(|re| re.captures(output).and_then(|c| c[1].parse().ok()))
}

/// Rows of the `sessions -l` table
pub fn parse_sessions(output: &str) -> Vec<ExploitSession> {
    output
        .lines()
        .filter(|line| SESSION_ROW.is_match(line))
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 3 {
                return None;
            }
            Some(ExploitSession {
                id: tokens[0].parse().ok()?,
                kind: tokens[1].to_string(),
                info: tokens[2..].join(" "),
            })
        })
        .collect()
}

/// Modules listed by `search`
///
/// Newer consoles prefix each row with an index column and put the disclosure
/// date between name and rank; both are skipped.
/// Rows whose name column is not a module path (no `/`) are skipped rather
/// than reported with a bogus name.
pub fn parse_search(output: &str) -> Vec<ExploitModule> {
    output
        .lines()
        .filter(|line| line.contains("exploit/") || line.contains("auxiliary/"))
        .filter_map(parse_search_row)
        .collect()
}

fn parse_search_row(line: &str) -> Option<ExploitModule> {
    let mut tokens = line.split_whitespace().peekable();

    if tokens
        .peek()
        .is_some_and(|t| t.chars().all(|c| c.is_ascii_digit()))
    {
        tokens.next();
    }

    let name = tokens.next().filter(|t| t.contains('/'))?;

    if tokens.peek().is_some_and(|t| DISCLOSURE_DATE.is_match(t)) {
        tokens.next();
    }

    let rank = tokens.next().unwrap_or(DEFAULT_RANK);
    let description = tokens.collect::<Vec<_>>().join(" ");

    Some(ExploitModule {
        name: name.to_string(),
        rank: rank.to_string(),
        description,
    })
}
