//! Error kinds shared by every stage of the pipeline.
//!
//! Parsing produces `Syntax` errors, inference produces `Type` errors and
//! execution produces `Runtime` errors. The CLI maps any of them to a
//! single `ERROR: <message>` line on stderr and exit code 1, so the
//! variants matter mostly for tests and for choosing the right message
//! prefix.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type RunResult<T> = Result<T, Error>;

/// Everything that can go wrong between source text and printed output.
#[derive(Debug, Error)]
pub enum Error {
    /// Unparsed remainder or a malformed literal. Reports the offending
    /// substring.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Unbound variable, no matching overload, operator on the wrong
    /// kind, indexer mismatch, empty sequence literal.
    #[error("{0}")]
    Type(String),

    /// Division by zero, index out of bounds, missing map key, regex
    /// failure, conversion failure.
    #[error("{0}")]
    Runtime(String),

    /// The input file could not be opened or read.
    #[error("cannot open input: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn syntax(msg: impl Into<String>) -> Self {
        Self::Syntax(msg.into())
    }

    pub(crate) fn ty(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }

    pub(crate) fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// An impossible state reached after inference passed. These point
    /// at a checker bug, not at user input.
    pub(crate) fn sanity(msg: impl Into<String>) -> Self {
        Self::Runtime(format!("sanity: {}", msg.into()))
    }

    /// True for errors the comprehension `try` form is allowed to
    /// swallow.
    pub(crate) fn is_recoverable(&self) -> bool {
        matches!(self, Self::Runtime(_))
    }
}
