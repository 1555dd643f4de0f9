//! Error definitions for the compiler pipeline.

use thiserror::Error;

use crate::node::Location;

#[derive(Debug, Clone, Error)]
/// Top-level error type returned by public APIs.
///
/// Variants above the line are the recoverable kinds: they are collected
/// into a [`CompileError::Aggregate`] during a walk instead of aborting it.
/// Variants below the line are fatal and propagate immediately via `?`.
pub enum CompileError {
    /// Node shape did not match what the accessor expected.
    #[error("schema mismatch at {location}: {message}")]
    SchemaMismatch { location: Location, message: String },
    /// No registered field matched a YAML key.
    #[error("unknown field '{key}' at {location}")]
    UnknownField { key: String, location: Location },
    /// More than one registered field matched a YAML key.
    #[error("ambiguous field '{key}' at {location}: matched {count} registrations")]
    AmbiguousField {
        key: String,
        location: Location,
        count: usize,
    },
    /// Enum scalar value is not one of the descriptor's value names.
    #[error("enum value '{value}' at {location} is not one of: {allowed}")]
    EnumOutOfRange {
        value: String,
        allowed: String,
        location: Location,
    },
    /// Integer literal does not fit the target field width.
    #[error("numeric overflow at {location}: {message}")]
    NumericOverflow { location: Location, message: String },
    /// Environment-variable expansion exceeded the rewrite bound.
    #[error("expansion cycle at {location}: exceeded {bound} rewrites")]
    ExpansionCycle { location: Location, bound: usize },
    /// Boolean/predicate DSL failed to parse or evaluate.
    #[error("eval error at {location}: {message}")]
    EvalError { location: Location, message: String },

    /// Descriptor names a `bytes` or `group` field, which this parser refuses.
    #[error("unsupported field kind '{kind}' for field '{field}'")]
    UnsupportedKind { field: String, kind: String },
    /// Script failed to compile, or an imported module failed to load.
    #[error("load failed: {0}")]
    LoadFailed(String),
    /// `main` or a named hook is absent from script globals.
    #[error("not found: {0}")]
    NotFound(String),
    /// Script's `main` returned something other than a list or mapping.
    #[error("main returned unexpected result: {0}")]
    MainUnexpectedResult(String),
    /// Script raised a runtime error during execution.
    #[error("exec failed: {message}")]
    ExecFailed { message: String, backtrace: String },
    /// A script value crossing the bridge was not JSON-compatible.
    #[error("bridge type error: {0}")]
    BridgeTypeError(String),
    /// Caller cancelled the in-flight compilation.
    #[error("cancelled")]
    Cancelled,
    /// A module import graph contains a cycle.
    #[error("load cycle: {0}")]
    LoadCycle(String),

    /// Aggregate of recoverable errors collected during a single walk.
    #[error("{} recoverable error(s) during walk", .0.len())]
    Aggregate(Vec<CompileError>),
    /// Filesystem or network I/O failure (not part of the 14-row taxonomy,
    /// carried for the CLI/VFS boundary).
    #[error("io error: {0}")]
    Io(String),
    /// JSON serialization failure at an output boundary.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for CompileError {
    fn from(value: std::io::Error) -> Self {
        CompileError::Io(value.to_string())
    }
}

impl CompileError {
    /// True for the seven collected-during-a-walk kinds; false for everything
    /// that must abort the current operation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CompileError::SchemaMismatch { .. }
                | CompileError::UnknownField { .. }
                | CompileError::AmbiguousField { .. }
                | CompileError::EnumOutOfRange { .. }
                | CompileError::NumericOverflow { .. }
                | CompileError::ExpansionCycle { .. }
                | CompileError::EvalError { .. }
        )
    }
}

/// Accumulates recoverable errors during a single Parseable Core walk.
///
/// Grounded on the teacher's single-`Result`-per-call style, generalized to
/// spec.md §4.E's "per-walk diagnostic buffer accumulates errors; the walk
/// continues past recoverable errors and returns them aggregated at the end."
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<CompileError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: CompileError) {
        debug_assert!(error.is_recoverable(), "fatal error pushed into diagnostics");
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[CompileError] {
        &self.errors
    }

    /// Consumes the buffer; `Ok(())` if empty, otherwise an `Aggregate`.
    pub fn into_result(self) -> std::result::Result<(), CompileError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(CompileError::Aggregate(self.errors))
        }
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
