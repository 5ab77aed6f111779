//! Tool Execution Subsystem
//!
//! Secure subprocess execution for the external security tools.
//!
//! # Security Features
//!
//! - **Sanitized Inputs**: caller strings become typed values only through
//!   [`validate`]
//! - **List Invocation**: commands are executed as argument vectors, never
//!   through a shell
//! - **Lifecycle Policies**: every invocation carries its wait/kill policy
//!   from the moment it is built
//! - **Private Scripts**: generated resource scripts live in temporary files
//!   removed on every exit path
//!
//! # Architecture
//!
//! - `validator.rs`: argument sanitizer and validated value types
//! - `timeout.rs`: lifecycle policies
//! - `executor.rs`: subprocess execution and output capture
//! - `script.rs`: resource-script assembly

mod executor;
mod script;
mod timeout;
mod validator;

#[cfg(test)]
pub(crate) mod testing;

pub use executor::{
    CapturedOutput, DetachedProcess, ExecutionOutcome, ExecutorConfig, ProcessRunner,
    ToolExecutor, ToolInvocation,
};
pub use script::{ResourceScript, ScratchScript};
pub use timeout::{LifecyclePolicy, DEFAULT_SYNC_CEILING_SECS};
pub use validator::{
    validate, validate_port, ModuleName, PortSpec, SafeIdentifier, SafePath, SearchTerm,
    SessionId, SingleLineCommand, ValueKind,
};
