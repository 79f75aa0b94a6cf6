//! Configuration system for sift.
//!
//! sift uses TOML configuration files named `.sift.toml`. Configuration is resolved by walking
//! up the directory tree from the current working directory, collecting any `.sift.toml` files
//! found, then loading `~/.sift.toml` as the global config with lowest precedence.
//!
//! The resolved [`Config`] carries two things the query compiler and its engine adapter need:
//! process-wide [`SearchSettings`] (result window limits, the default analyzer) and named
//! [`AnalyzerDefinition`]s that extend the built-in analyzer catalog.

#![warn(missing_docs)]

mod discovery;
mod error;
mod merge;
mod parse;
#[cfg(test)]
mod test_support;

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

pub use discovery::{CONFIG_FILENAME, discover_config_files, global_config_path, is_global_config};
pub use error::ConfigError;
pub use merge::{ParsedConfig, merge_configs};
pub use parse::{
    RawAnalyzer, RawConfig, RawSearchSettings, parse_config_file, parse_config_str,
};
use serde::{Deserialize, Serialize};

/// Default upper bound on the number of hits a single request may ask for.
pub const DEFAULT_MAX_RESULTS: usize = 10_000;

/// Default number of hits when a request does not specify `size`.
pub const DEFAULT_SIZE: usize = 10;

/// Name of the analyzer used when neither the request nor the mappings name one.
pub const DEFAULT_ANALYZER: &str = "standard";

/// Default limit on how deeply compound clauses may nest.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 20;

/// Top-level merged configuration for sift.
///
/// This represents the fully resolved configuration after merging all discovered `.sift.toml`
/// files according to precedence rules.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Search-related settings.
    pub search: SearchSettings,
    /// Custom analyzers by name. A name defined here shadows a built-in analyzer.
    pub analyzers: BTreeMap<String, AnalyzerDefinition>,
    /// Directory containing the most specific config file.
    pub config_root: Option<PathBuf>,
}

impl Config {
    /// Loads configuration by discovering and merging all relevant `.sift.toml` files.
    ///
    /// This is the main entry point for loading configuration. It:
    /// 1. Discovers all `.sift.toml` files from `cwd` up to the filesystem root
    /// 2. Appends `~/.sift.toml` if it exists
    /// 3. Parses each file
    /// 4. Merges them according to precedence rules (closest to `cwd` wins)
    ///
    /// Returns `Ok(Config::default())` if no configuration files are found.
    pub fn load(cwd: &Path) -> Result<Self, ConfigError> {
        let config_files = discover_config_files(cwd);
        Self::load_from_files(&config_files)
    }

    /// Loads configuration from a specific list of config file paths.
    ///
    /// Files should be provided in precedence order: highest precedence first.
    pub fn load_from_files(files: &[PathBuf]) -> Result<Self, ConfigError> {
        if files.is_empty() {
            return Ok(Self::default());
        }

        let parsed: Vec<ParsedConfig> = files
            .iter()
            .map(|path| {
                let config = parse_config_file(path)?;
                Ok(ParsedConfig {
                    path: path.clone(),
                    config,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        merge_configs(&parsed)
    }

    /// Serializes the effective settings and analyzers to TOML format.
    ///
    /// The output uses the same layout as a `.sift.toml` file, so it can be pasted into one.
    pub fn settings_to_toml(&self) -> Result<String, ConfigError> {
        let serializable = SerializableConfig {
            search: &self.search,
            analyzer: &self.analyzers,
        };
        toml::to_string_pretty(&serializable).map_err(ConfigError::SerializeToml)
    }
}

/// Search-related settings shared by every compilation in the process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Largest `size` a request may use; larger values are clamped to this.
    pub max_results: usize,
    /// `size` used when a request omits it.
    pub default_size: usize,
    /// Analyzer used when no clause or mapping names one.
    pub default_analyzer: String,
    /// Maximum nesting depth of compound clauses.
    pub max_nesting_depth: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            default_size: DEFAULT_SIZE,
            default_analyzer: DEFAULT_ANALYZER.to_string(),
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

/// Tokenizer at the head of a custom analyzer pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    /// Splits on whitespace and punctuation.
    #[default]
    Simple,
    /// Splits on whitespace only.
    Whitespace,
    /// Emits the whole input as a single token.
    Keyword,
}

/// A token filter stage in a custom analyzer pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Lowercases tokens.
    Lowercase,
    /// Folds non-ASCII characters to their ASCII equivalents.
    AsciiFolding,
    /// Drops tokens that are not purely alphanumeric.
    AlphaNumOnly,
    /// Drops tokens longer than the analyzer's `max_token_length`.
    RemoveLong,
    /// Drops stop words, from the analyzer's `stop_words` or its language's list.
    Stop,
    /// Applies the stemmer for the analyzer's `language`.
    Stemmer,
}

/// A named analyzer assembled from a tokenizer and a chain of filters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AnalyzerDefinition {
    /// Tokenizer at the head of the pipeline.
    pub tokenizer: TokenizerKind,
    /// Filters, applied in order.
    pub filters: Vec<FilterKind>,
    /// Language for `stemmer` and language stop lists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Limit used by `remove_long`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_token_length: Option<usize>,
    /// Explicit stop words for `stop`; overrides the language list.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop_words: Vec<String>,
}

/// Internal struct for TOML serialization of the effective configuration.
#[derive(Serialize)]
struct SerializableConfig<'a> {
    /// Search-related settings.
    search: &'a SearchSettings,
    /// Custom analyzers, sorted by name.
    analyzer: &'a BTreeMap<String, AnalyzerDefinition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_settings_defaults() {
        let search = SearchSettings::default();
        assert_eq!(search.max_results, 10_000);
        assert_eq!(search.default_size, 10);
        assert_eq!(search.default_analyzer, "standard");
        assert_eq!(search.max_nesting_depth, 20);
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.analyzers.is_empty());
        assert!(config.config_root.is_none());
    }

    #[test]
    fn test_settings_to_toml() {
        let mut config = Config::default();
        config.analyzers.insert(
            "english_text".into(),
            AnalyzerDefinition {
                tokenizer: TokenizerKind::Simple,
                filters: vec![FilterKind::Lowercase, FilterKind::Stemmer],
                language: Some("english".into()),
                max_token_length: None,
                stop_words: vec![],
            },
        );
        let toml = config.settings_to_toml().unwrap();

        assert!(toml.contains("[search]"));
        assert!(toml.contains("max_results = 10000"));
        assert!(toml.contains("default_analyzer = \"standard\""));
        assert!(toml.contains("[analyzer.english_text]"));
        assert!(toml.contains("tokenizer = \"simple\""));

        let parsed: toml::Value =
            toml::from_str(&toml).expect("settings_to_toml should produce valid TOML");
        assert!(parsed.get("search").is_some());
        assert!(parsed.get("analyzer").is_some());
    }
}
