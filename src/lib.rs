//! Recon Orchestrator Library
//!
//! Runs a fixed set of network reconnaissance tools (`ifconfig`,
//! `netdiscover`, `nmap`, `msfconsole`, `john`) on behalf of a caller and
//! turns their text or XML output into typed records.
//!
//! Every caller-supplied value passes the sanitizer in [`tools`] before it can
//! reach an argument vector or resource script, and every invocation runs
//! under an explicit lifecycle policy. [`services::Toolkit`] is the entry
//! point; [`server`] exposes it over HTTP.

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod parsers;
pub mod registry;
pub mod server;
pub mod services;
pub mod tools;

pub use config::Config;
pub use error::{ToolError, ValidationError, ValidationFailure};
pub use services::Toolkit;
