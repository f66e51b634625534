//! Error taxonomy of the expectation engine.
//!
//! Every variant renders as a self-contained diagnostic that cites both the
//! site where the problem surfaced and, when known, where the offending
//! expectation was registered.

use std::fmt;

use thiserror::Error;

use crate::location::SourceLocation;

/// Which store a leftover entry was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeftoverKind {
    ReturnValue,
    OutputParameter,
    ParameterCheck,
    Call,
}

impl fmt::Display for LeftoverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ReturnValue => "has remaining non-returned values",
            Self::OutputParameter => "has remaining output values that were never read",
            Self::ParameterCheck => "parameter still has values that haven't been checked",
            Self::Call => "was expected to be called but was not",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MockError {
    #[error("no entries for symbol {symbol}")]
    MissingEntry { symbol: String },

    #[error("symbol path must contain at least one key")]
    EmptyPath,

    #[error("symbol {symbol} is already registered with a different key depth")]
    PathDepth { symbol: String },

    #[error("invalid multiplicity {raw}: expected a positive count, -1 (always) or -2 (maybe)")]
    InvalidMultiplicity { raw: i64 },

    #[error(
        "type mismatch for {symbol}: requested {requested} but the value registered at {location} is {registered}"
    )]
    TypeMismatch {
        symbol: String,
        requested: String,
        registered: String,
        location: SourceLocation,
    },

    #[error("value for {symbol} registered at {location} cannot be read as {requested}")]
    Undecodable {
        symbol: String,
        requested: String,
        location: SourceLocation,
    },

    #[error(
        "{site}: check of parameter {parameter} of {function} failed: {detail}\n{location}: note: expectation registered here"
    )]
    CheckFailed {
        function: String,
        parameter: String,
        detail: String,
        site: SourceLocation,
        location: SourceLocation,
    },

    #[error("{site}: unexpected call to {function}: no further calls are expected")]
    UnexpectedCall {
        function: String,
        site: SourceLocation,
    },

    #[error("{site}: wrong call order: expected {expected} (registered at {expected_at}), got {function}")]
    CallOrder {
        function: String,
        expected: String,
        expected_at: SourceLocation,
        site: SourceLocation,
    },

    #[error("{location}: {symbol} {kind}")]
    Leftover {
        kind: LeftoverKind,
        symbol: String,
        location: SourceLocation,
    },
}
