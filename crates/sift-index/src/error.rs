//! Error types for the sift-index crate.

use std::{io, path::PathBuf};

use sift_config::ConfigError;
use sift_query::QueryError;
use thiserror::Error;

/// Errors that can occur when building or searching an index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Failed to open or create the index.
    #[error("failed to open index at {path}: {message}")]
    OpenIndex {
        /// Path to the index directory.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Failed to write to the index.
    #[error("failed to write to index: {0}")]
    Write(String),

    /// Failed to commit changes to the index.
    #[error("failed to commit index: {0}")]
    Commit(String),

    /// Failed while executing a search.
    #[error("search failed: {0}")]
    Search(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The request did not compile.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Invalid stemmer or stop word language.
    #[error("unsupported language: {0}")]
    InvalidLanguage(String),

    /// An analyzer definition cannot be built.
    #[error("invalid analyzer [{name}]: {message}")]
    InvalidAnalyzer {
        /// Analyzer name.
        name: String,
        /// What is wrong with it.
        message: String,
    },

    /// A clause or mapping names an analyzer the registry does not hold.
    #[error("analyzer [{0}] not found")]
    UnknownAnalyzer(String),

    /// The plan sorts in a way the engine cannot execute.
    #[error("unsupported sort: {0}")]
    UnsupportedSort(String),

    /// A document does not match the mappings.
    #[error("invalid document: {0}")]
    Document(String),

    /// A clause cannot be lowered against the schema.
    #[error("cannot execute [{clause}] on field [{field}]: {message}")]
    Lower {
        /// Clause type.
        clause: &'static str,
        /// Target field.
        field: String,
        /// What went wrong.
        message: String,
    },
}

impl IndexError {
    /// Creates an `OpenIndex` error from a path and Tantivy error.
    pub(crate) fn open_index(path: PathBuf, source: &tantivy::TantivyError) -> Self {
        Self::OpenIndex {
            path,
            message: source.to_string(),
        }
    }

    /// Creates a `Write` error from a Tantivy error.
    pub(crate) fn write(source: &tantivy::TantivyError) -> Self {
        Self::Write(source.to_string())
    }

    /// Creates a `Commit` error from a Tantivy error.
    pub(crate) fn commit(source: &tantivy::TantivyError) -> Self {
        Self::Commit(source.to_string())
    }

    /// Creates a `Search` error from any displayable error.
    pub(crate) fn search(source: &impl ToString) -> Self {
        Self::Search(source.to_string())
    }
}
