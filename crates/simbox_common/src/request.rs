//! Simulation requests as consumed by the core, independent of transport.
//!
//! A request carries either a single source blob or an ordered list of named
//! source units, plus the name of the top-level module. [`SimulationRequest::resolve`]
//! validates the request and produces the units that will be staged.

use serde::{Deserialize, Serialize};

/// Top-level module name used when a request does not name one.
pub const DEFAULT_TOP: &str = "tb_top";

/// File name given to a single-blob request's source.
pub const DEFAULT_FILE_NAME: &str = "design.sv";

/// Errors for requests that are rejected before any sandbox is created.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// Neither a source blob nor any source files were supplied.
    #[error("No code provided")]
    NoSource,

    /// A source file name is not a plain file name.
    #[error("invalid source file name '{0}'")]
    InvalidFileName(String),

    /// Two source units share a name.
    #[error("duplicate source file name '{0}'")]
    DuplicateFileName(String),

    /// A source file name collides with a file the service writes itself.
    #[error("source file name '{0}' is reserved")]
    ReservedFileName(String),

    /// The top module name is not a plain identifier.
    #[error("invalid top module name '{0}'")]
    InvalidTopModule(String),
}

/// One named source file submitted for simulation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUnit {
    /// File name the unit is staged under.
    pub name: String,
    /// Source text, staged verbatim.
    #[serde(alias = "code")]
    pub content: String,
}

impl SourceUnit {
    /// Creates a source unit.
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// A simulation request in the wire shape accepted by the service.
///
/// `files` takes precedence over `code` when both are present.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationRequest {
    /// Single source blob, staged under the default file name.
    #[serde(default, alias = "content", skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Ordered list of named source units.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<SourceUnit>,
    /// Top-level module name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<String>,
}

/// Defaults and constraints applied by [`SimulationRequest::resolve`].
#[derive(Clone, Copy, Debug)]
pub struct ResolveOptions<'a> {
    /// Top module used when the request names none.
    pub default_top: &'a str,
    /// File name for a single-blob request.
    pub default_file_name: &'a str,
    /// File names reserved for service-generated files.
    pub reserved_names: &'a [&'a str],
}

impl Default for ResolveOptions<'_> {
    fn default() -> Self {
        Self {
            default_top: DEFAULT_TOP,
            default_file_name: DEFAULT_FILE_NAME,
            reserved_names: &[],
        }
    }
}

/// A validated request: at least one uniquely named unit and a legal top module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedRequest {
    /// Units in request order.
    pub units: Vec<SourceUnit>,
    /// Top-level module name.
    pub top: String,
}

impl SimulationRequest {
    /// Creates a single-blob request.
    pub fn from_code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::default()
        }
    }

    /// Creates a multi-file request.
    pub fn from_files(files: Vec<SourceUnit>) -> Self {
        Self {
            files,
            ..Self::default()
        }
    }

    /// Sets the top-level module name.
    pub fn with_top(mut self, top: impl Into<String>) -> Self {
        self.top = Some(top.into());
        self
    }

    /// Validates the request and returns the units to stage.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] when no source is present, a file name is
    /// not a plain unique file name, or the top module is not an identifier.
    pub fn resolve(&self, options: &ResolveOptions<'_>) -> Result<ResolvedRequest, RequestError> {
        let units = if !self.files.is_empty() {
            self.files.clone()
        } else {
            match self.code.as_deref() {
                Some(code) if !code.is_empty() => {
                    vec![SourceUnit::new(options.default_file_name, code)]
                }
                _ => return Err(RequestError::NoSource),
            }
        };

        let mut seen = std::collections::HashSet::new();
        for unit in &units {
            validate_file_name(&unit.name)?;
            if options.reserved_names.contains(&unit.name.as_str()) {
                return Err(RequestError::ReservedFileName(unit.name.clone()));
            }
            if !seen.insert(unit.name.as_str()) {
                return Err(RequestError::DuplicateFileName(unit.name.clone()));
            }
        }

        let top = match self.top.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => options.default_top,
        };
        if !is_identifier(top) {
            return Err(RequestError::InvalidTopModule(top.to_string()));
        }

        Ok(ResolvedRequest {
            units,
            top: top.to_string(),
        })
    }
}

/// Checks that `name` is a single, normal path component.
///
/// # Errors
///
/// Returns [`RequestError::InvalidFileName`] for empty names, `.`/`..`,
/// names containing path separators or NUL, and names starting with `-`
/// (which the compiler would read as a flag).
pub fn validate_file_name(name: &str) -> Result<(), RequestError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.starts_with('-')
        || name.contains(['/', '\\', '\0']);
    if bad {
        Err(RequestError::InvalidFileName(name.to_string()))
    } else {
        Ok(())
    }
}

/// Returns true if `s` matches `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
