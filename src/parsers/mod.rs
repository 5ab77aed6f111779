//! Output Parsers
//!
//! One pure function per tool family turning raw stdout (or XML) into the
//! records in [`crate::models`]. Free-text parsers skip lines they cannot
//! read; the XML parser fails as a whole.

pub mod credentials;
pub mod discovery;
pub mod interfaces;
pub mod john;
pub mod metasploit;
pub mod nmap;

pub use credentials::{parse_credentials, render_hash_file};
pub use discovery::parse_discovery;
pub use interfaces::parse_interfaces;
pub use john::parse_cracked;
pub use metasploit::{parse_exploit_session, parse_search, parse_sessions};
pub use nmap::parse_nmap_xml;
