//! Configuration merging.
//!
//! Merges multiple `RawConfig` files into a single resolved `Config`,
//! applying precedence rules and validating values.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::{
    AnalyzerDefinition, Config, ConfigError, SearchSettings,
    parse::{RawAnalyzer, RawConfig, RawSearchSettings},
};

/// A parsed config file with its source path.
pub struct ParsedConfig {
    /// Path to the config file.
    pub path: PathBuf,
    /// Parsed raw configuration.
    pub config: RawConfig,
}

/// Merges multiple configuration files into a single resolved `Config`.
///
/// Configs should be provided in precedence order: highest precedence first (closest to CWD),
/// lowest precedence last (global config).
///
/// Merge rules:
/// - Scalar settings: first defined value wins (highest precedence)
/// - Analyzers: merged by name, first definition wins completely
pub fn merge_configs(configs: &[ParsedConfig]) -> Result<Config, ConfigError> {
    if configs.is_empty() {
        return Ok(Config::default());
    }

    let search = merge_search_settings(configs)?;
    let analyzers = merge_analyzers(configs)?;
    let config_root = configs
        .first()
        .and_then(|c| c.path.parent())
        .map(Path::to_path_buf);

    Ok(Config {
        search,
        analyzers,
        config_root,
    })
}

/// Merges search settings, taking the first defined value for each field.
fn merge_search_settings(configs: &[ParsedConfig]) -> Result<SearchSettings, ConfigError> {
    let mut result = SearchSettings::default();

    // Iterate in reverse (lowest precedence first) so higher precedence overwrites
    for parsed in configs.iter().rev() {
        if let Some(ref search) = parsed.config.search {
            apply_raw_search(&mut result, search, &parsed.path)?;
        }
    }

    Ok(result)
}

/// Applies raw search settings to result, rejecting out-of-domain values.
fn apply_raw_search(
    result: &mut SearchSettings,
    raw: &RawSearchSettings,
    path: &Path,
) -> Result<(), ConfigError> {
    if let Some(v) = raw.max_results {
        result.max_results = positive(v, "search.max_results", path)?;
    }
    if let Some(v) = raw.default_size {
        result.default_size = v;
    }
    if let Some(ref v) = raw.default_analyzer {
        if v.trim().is_empty() {
            return Err(invalid(path, "search.default_analyzer", "must not be empty"));
        }
        result.default_analyzer = v.clone();
    }
    if let Some(v) = raw.max_nesting_depth {
        result.max_nesting_depth = positive(v, "search.max_nesting_depth", path)?;
    }
    Ok(())
}

/// Merges analyzer definitions by name; the highest-precedence definition wins.
fn merge_analyzers(
    configs: &[ParsedConfig],
) -> Result<BTreeMap<String, AnalyzerDefinition>, ConfigError> {
    let mut merged = BTreeMap::new();

    for parsed in configs {
        let Some(ref analyzers) = parsed.config.analyzer else {
            continue;
        };
        for (name, raw) in analyzers {
            if merged.contains_key(name) {
                // Already defined by higher-precedence config
                continue;
            }
            merged.insert(name.clone(), convert_analyzer(name, raw, &parsed.path)?);
        }
    }

    Ok(merged)
}

/// Converts a raw analyzer to the resolved type.
fn convert_analyzer(
    name: &str,
    raw: &RawAnalyzer,
    path: &Path,
) -> Result<AnalyzerDefinition, ConfigError> {
    let tokenizer = raw.tokenizer.ok_or_else(|| ConfigError::MissingTokenizer {
        path: path.to_path_buf(),
        name: name.to_string(),
    })?;
    if let Some(limit) = raw.max_token_length {
        positive(limit, &format!("analyzer.{name}.max_token_length"), path)?;
    }

    Ok(AnalyzerDefinition {
        tokenizer,
        filters: raw.filters.clone(),
        language: raw.language.clone(),
        max_token_length: raw.max_token_length,
        stop_words: raw.stop_words.clone().unwrap_or_default(),
    })
}

/// Returns `value` if it is non-zero.
fn positive(value: usize, name: &str, path: &Path) -> Result<usize, ConfigError> {
    if value == 0 {
        return Err(invalid(path, name, "must be greater than zero"));
    }
    Ok(value)
}

/// Builds an `InvalidSetting` error.
fn invalid(path: &Path, name: &str, message: &str) -> ConfigError {
    ConfigError::InvalidSetting {
        path: path.to_path_buf(),
        name: name.to_string(),
        message: message.to_string(),
    }
}
