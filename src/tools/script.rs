//! Resource Scripts
//!
//! `msfconsole -r <file>` executes one console directive per line. Scripts are
//! assembled only from validated values and written to a private temporary
//! file that is deleted when the [`ScratchScript`] is dropped, whichever way
//! the invocation ends.

use super::validator::{ModuleName, SafeIdentifier, SessionId, SingleLineCommand};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::trace;

/// An ordered list of console directives
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceScript {
    lines: Vec<String>,
}

impl ResourceScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script that configures and launches an exploit module
    pub fn exploit(
        module: &ModuleName,
        rhosts: &SafeIdentifier,
        rport: u16,
        payload: &ModuleName,
    ) -> Self {
        Self::new()
            .directive(format!("use {}", module))
            .directive(format!("set RHOSTS {}", rhosts))
            .directive(format!("set RPORT {}", rport))
            .directive(format!("set PAYLOAD {}", payload))
            .directive("exploit")
    }

    /// Script that attaches to a session and runs one command in it
    pub fn session_command(session: &SessionId, command: &SingleLineCommand) -> Self {
        Self::new()
            .directive(format!("sessions -i {}", session))
            .directive(command.as_str())
    }

    // Inputs are pre-validated single-line values, so a directive never
    // spans lines.
    fn directive(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Script body, newline-terminated
    pub fn render(&self) -> String {
        let mut body = self.lines.join("\n");
        body.push('\n');
        body
    }

    /// Write the script to a private `.rc` file
    pub fn write_scratch(&self) -> std::io::Result<ScratchScript> {
        let mut file = tempfile::Builder::new()
            .prefix("recon-")
            .suffix(".rc")
            .tempfile()?;
        file.write_all(self.render().as_bytes())?;
        file.flush()?;
        trace!(path = %file.path().display(), "Resource script:\n{}", self.render());
        Ok(ScratchScript { file })
    }
}

/// A resource script on disk; removed on drop
#[derive(Debug)]
pub struct ScratchScript {
    file: NamedTempFile,
}

impl ScratchScript {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Path as an argv element
    pub fn arg(&self) -> String {
        self.file.path().to_string_lossy().into_owned()
    }
}
