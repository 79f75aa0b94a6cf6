//! Configuration file parsing.
//!
//! Parses individual `.sift.toml` files into intermediate `RawConfig` structures
//! that preserve the optional nature of all fields before merging.

use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;
use serde_with::{OneOrMany, serde_as};

use crate::{ConfigError, FilterKind, TokenizerKind};

/// Raw configuration as parsed directly from a TOML file.
///
/// All fields are optional to support partial configs that will be merged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// When true, stop discovery here - ignore parent and global configs.
    pub root: Option<bool>,
    /// Search settings section.
    pub search: Option<RawSearchSettings>,
    /// Analyzer definitions: name -> analyzer config.
    pub analyzer: Option<HashMap<String, RawAnalyzer>>,
}

/// Raw search settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSearchSettings {
    /// Largest accepted `size`.
    pub max_results: Option<usize>,
    /// `size` used when a request omits it.
    pub default_size: Option<usize>,
    /// Analyzer used when nothing else names one.
    pub default_analyzer: Option<String>,
    /// Maximum nesting depth of compound clauses.
    pub max_nesting_depth: Option<usize>,
}

/// Raw analyzer definition from TOML.
#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawAnalyzer {
    /// Tokenizer name.
    pub tokenizer: Option<TokenizerKind>,
    /// Filter name(s). Accepts either a single string or an array of strings.
    #[serde_as(as = "OneOrMany<_>")]
    pub filters: Vec<FilterKind>,
    /// Stemmer and stop-list language.
    pub language: Option<String>,
    /// Limit for the `remove_long` filter.
    pub max_token_length: Option<usize>,
    /// Explicit stop words.
    pub stop_words: Option<Vec<String>>,
}

/// Parses a configuration file from disk.
pub fn parse_config_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    parse_config_str(&contents, path)
}

/// Parses configuration from a TOML string.
///
/// The `path` parameter is used for error reporting.
pub fn parse_config_str(contents: &str, path: &Path) -> Result<RawConfig, ConfigError> {
    toml::from_str(contents).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })
}

/// Checks if a config file has `root = true` set.
///
/// Returns false if the file cannot be read or parsed.
pub fn is_root_config(path: &Path) -> bool {
    let Ok(contents) = fs::read_to_string(path) else {
        return false;
    };
    let Ok(config) = toml::from_str::<RawConfig>(&contents) else {
        return false;
    };
    config.root == Some(true)
}
