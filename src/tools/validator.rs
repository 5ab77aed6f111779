//! Argument Sanitizer
//!
//! Every caller-supplied string that ends up on a tool's command line or in a
//! generated resource script passes through [`validate`]. The typed wrappers
//! below can only be obtained through it, so code that builds commands takes
//! these types instead of `&str`.
//!
//! Commands are never run through a shell, but `msfconsole` resource scripts
//! and `-x` console strings are line/`;` oriented, so embedded newlines or
//! separators would let a caller append arbitrary directives.

use crate::error::{ValidationError, ValidationFailure};
use std::fmt;
use std::path::Path;

/// Punctuation allowed in identifiers, module names, hosts and paths
const IDENTIFIER_PUNCTUATION: &[char] = &['_', '.', ':', '/', '-'];

/// Characters allowed in an nmap `-p` specification besides digits
const PORT_SPEC_PUNCTUATION: &[char] = &[',', '-', ':', 'T', 'U'];

/// Constraint class applied by [`validate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Host strings, interface names, ranges
    Identifier,
    /// Exploit/payload module names
    Module,
    /// Local or remote file paths
    Path,
    /// All-digit identifiers such as session ids
    NumericId,
    /// Open-ended single-line command text
    FreeCommand,
    /// Module search query: identifier characters plus interior spaces
    SearchTerm,
    /// nmap port list (`21,22,80-90`, `T:80,U:53`)
    PortSpec,
}

/// Validate a caller-supplied value against the constraint for `kind`
///
/// Returns the trimmed value on success (numeric ids are never trimmed).
///
/// # Example
///
/// ```
/// use recon_orchestrator::tools::{validate, ValueKind};
///
/// assert_eq!(validate(" exploit/unix/ftp/x ", "exploit_name", ValueKind::Module).unwrap(),
///            "exploit/unix/ftp/x");
/// assert!(validate("evil;rm -rf", "exploit_name", ValueKind::Module).is_err());
/// ```
pub fn validate(value: &str, field: &str, kind: ValueKind) -> Result<String, ValidationError> {
    let fail = |reason| Err(ValidationError::new(field, reason));

    if value.contains('\n') || value.contains('\r') {
        return fail(ValidationFailure::MultiLine);
    }

    if kind == ValueKind::NumericId {
        if value.is_empty() {
            return fail(ValidationFailure::Empty);
        }
        if !value.chars().all(|c| c.is_ascii_digit()) {
            return fail(ValidationFailure::NotNumeric);
        }
        return Ok(value.to_string());
    }

    let trimmed = value.trim();
    if trimmed.is_empty() {
        return fail(ValidationFailure::Empty);
    }

    let allowed = match kind {
        ValueKind::Identifier | ValueKind::Module | ValueKind::Path => {
            trimmed.chars().all(is_identifier_char)
        }
        ValueKind::SearchTerm => trimmed.chars().all(|c| c == ' ' || is_identifier_char(c)),
        ValueKind::PortSpec => trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || PORT_SPEC_PUNCTUATION.contains(&c)),
        ValueKind::FreeCommand => true,
        ValueKind::NumericId => unreachable!("handled above"),
    };

    if !allowed {
        return fail(ValidationFailure::InvalidCharacters);
    }

    Ok(trimmed.to_string())
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || IDENTIFIER_PUNCTUATION.contains(&c)
}

/// Validate a TCP/UDP port number (1-65535)
pub fn validate_port(port: u32, field: &str) -> Result<u16, ValidationError> {
    match u16::try_from(port) {
        Ok(p) if p != 0 => Ok(p),
        _ => Err(ValidationError::new(field, ValidationFailure::OutOfRange)),
    }
}

macro_rules! validated_value {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(String);

        impl $name {
            /// Sanitize `value`, naming `field` in the error on failure
            pub fn parse(value: &str, field: &str) -> Result<Self, ValidationError> {
                validate(value, field, $kind).map(Self)
            }

            /// Sanitize a value that lands in a positional argv slot, where a
            /// leading `-` would be read as an option
            pub fn parse_positional(value: &str, field: &str) -> Result<Self, ValidationError> {
                let parsed = Self::parse(value, field)?;
                if parsed.0.starts_with('-') {
                    return Err(ValidationError::new(field, ValidationFailure::InvalidCharacters));
                }
                Ok(parsed)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

validated_value!(
    /// Host, interface or network range
    SafeIdentifier,
    ValueKind::Identifier
);

validated_value!(
    /// Exploit or payload module name
    ModuleName,
    ValueKind::Module
);

validated_value!(
    /// File path safe for argv and resource-script use
    SafePath,
    ValueKind::Path
);

validated_value!(
    /// All-digit session identifier
    SessionId,
    ValueKind::NumericId
);

validated_value!(
    /// Single-line command to run inside a session
    SingleLineCommand,
    ValueKind::FreeCommand
);

validated_value!(
    /// Module search query
    SearchTerm,
    ValueKind::SearchTerm
);

validated_value!(
    /// nmap port specification
    PortSpec,
    ValueKind::PortSpec
);

impl SafePath {
    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// Sanitize and additionally require the file to exist locally
    pub fn existing(value: &str, field: &str) -> Result<Self, ValidationError> {
        let path = Self::parse_positional(value, field)?;
        if !path.as_path().is_file() {
            return Err(ValidationError::new(field, ValidationFailure::NotFound));
        }
        Ok(path)
    }
}
