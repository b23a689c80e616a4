//! Error handling types for the analyzer core.
//!
//! This module provides the error type propagated out of every public
//! entry point in the crate.

use std::path::PathBuf;
use thiserror::Error;

/// Comprehensive error type for static analysis operations.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// Source file missing or unreadable.
    #[error("No source for code: {0}")]
    NoSource(PathBuf),

    /// The host-language parser rejected the source outright (tree-sitter
    /// produced no usable tree, or the declared encoding could not decode
    /// the bytes).
    #[error("Couldn't parse '{path}' as source: {message} at line {line}")]
    CouldNotParse {
        path: PathBuf,
        line: u32,
        message: String,
    },

    /// A byte offset/line was not covered by any chunk, or a chunk had no
    /// exits and was not terminated by a return/raise. Indicates a bug in
    /// the structural parser or an unsupported construct.
    #[error("internal consistency error in {path}: {message}")]
    InternalConsistency { path: PathBuf, message: String },

    /// An exclusion regex matched a line whose statement cannot be cleanly
    /// excluded. Reported as a warning; the excluded-line set is still
    /// produced.
    #[error("ambiguous exclusion at {path}:{line}: {message}")]
    AmbiguousExclusion {
        path: PathBuf,
        line: u32,
        message: String,
    },

    /// Underlying I/O failure reading source text.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The exclusion regex failed to compile.
    #[error("invalid exclusion pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for analyzer operations.
pub type AnalyzerResult<T> = Result<T, AnalyzerError>;

impl AnalyzerError {
    pub fn no_source(path: impl Into<PathBuf>) -> Self {
        AnalyzerError::NoSource(path.into())
    }

    pub fn could_not_parse(
        path: impl Into<PathBuf>,
        line: u32,
        message: impl Into<String>,
    ) -> Self {
        AnalyzerError::CouldNotParse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    pub fn internal_consistency(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        AnalyzerError::InternalConsistency {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn ambiguous_exclusion(
        path: impl Into<PathBuf>,
        line: u32,
        message: impl Into<String>,
    ) -> Self {
        AnalyzerError::AmbiguousExclusion {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        AnalyzerError::Config(message.into())
    }
}

/// Emits a warning for a construct the structural parser doesn't model,
/// downgrading it to a no-op transition (non-fatal, logged for the caller)
/// rather than failing the whole analysis.
pub fn log_unsupported_construct(path: &std::path::Path, line: u32, kind: &str) {
    log::warn!(
        target: "arcmap::structural",
        "unsupported construct `{kind}` at {}:{line}, treated as fall-through",
        path.display()
    );
}
