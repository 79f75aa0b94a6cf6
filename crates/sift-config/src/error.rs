//! Error types for sift configuration.

use std::{io, path::PathBuf};

use thiserror::Error;
use toml::{de, ser};

/// Errors that can occur when loading or processing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Failed to parse TOML configuration.
    #[error("failed to parse config file {path}: {source}")]
    ParseToml {
        /// Path to the file that could not be parsed.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: de::Error,
    },

    /// Failed to serialize the effective configuration.
    #[error("failed to serialize config: {0}")]
    SerializeToml(#[source] ser::Error),

    /// A setting has a value outside its domain.
    #[error("invalid setting {name} in {path}: {message}")]
    InvalidSetting {
        /// Config file that set the value.
        path: PathBuf,
        /// Dotted setting name, e.g. `search.max_results`.
        name: String,
        /// What is wrong with it.
        message: String,
    },

    /// An analyzer definition lacks the tokenizer it needs.
    #[error("analyzer {name} in {path} does not define a tokenizer")]
    MissingTokenizer {
        /// Config file containing the definition.
        path: PathBuf,
        /// Analyzer name.
        name: String,
    },
}
