//! Error types for query compilation.
//!
//! Every failure carries an [`ErrorKind`] so a transport layer can map it to a status and a
//! wire name without inspecting the message.

use std::fmt;

use thiserror::Error;

/// Category of a compilation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request is structurally malformed: wrong types, missing keys, bad nesting.
    Parsing,
    /// A value has the right type but is outside its allowed domain.
    IllegalArgument,
    /// A value could not be interpreted in its expected textual format.
    XContentParse,
    /// The request uses a clause or aggregation type that is not supported.
    NotImplemented,
    /// A referenced resource, such as a named analyzer, does not exist.
    NotFound,
}

impl ErrorKind {
    /// Returns the wire name of this kind, e.g. `parsing_exception`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parsing => "parsing_exception",
            Self::IllegalArgument => "illegal_argument_exception",
            Self::XContentParse => "x_content_parse_exception",
            Self::NotImplemented => "not_implemented",
            Self::NotFound => "resource_not_found_exception",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A query compilation error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct QueryError {
    /// Error category.
    pub kind: ErrorKind,
    /// Human-readable description, usually prefixed with the clause name in brackets.
    pub message: String,
}

impl QueryError {
    /// Creates an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a [`ErrorKind::Parsing`] error.
    pub fn parsing(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parsing, message)
    }

    /// Creates an [`ErrorKind::IllegalArgument`] error.
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IllegalArgument, message)
    }

    /// Creates an [`ErrorKind::XContentParse`] error.
    pub fn x_content_parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::XContentParse, message)
    }

    /// Creates an [`ErrorKind::NotImplemented`] error.
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotImplemented, message)
    }

    /// Creates an [`ErrorKind::NotFound`] error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }
}
