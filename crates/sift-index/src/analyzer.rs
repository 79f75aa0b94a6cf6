//! Analyzer catalog backed by tantivy text analyzers.
//!
//! Built-in analyzers:
//!
//! - `standard`: splits on whitespace and punctuation, drops tokens over 255 bytes, lowercases
//! - `simple`: splits on whitespace and punctuation, lowercases
//! - `whitespace`: splits on whitespace only, keeps case
//! - `keyword`: the whole input as one token
//! - one per stemmer language (`english`, `french`, ...): `standard` plus a stemmer
//!
//! Analyzers from `[analyzer.<name>]` config sections are assembled from a tokenizer and a
//! filter chain, and shadow built-ins of the same name.

use std::collections::HashMap;

use log::debug;
use parking_lot::RwLock;
use sift_config::{AnalyzerDefinition, Config, FilterKind, TokenizerKind};
use sift_query::AnalyzerCatalog;
use tantivy::tokenizer::{
    AlphaNumOnlyFilter, AsciiFoldingFilter, Language, LowerCaser, RawTokenizer, RemoveLongFilter,
    SimpleTokenizer, Stemmer, StopWordFilter, TextAnalyzer, TokenStream, TokenizerManager,
    WhitespaceTokenizer,
};

use crate::IndexError;

/// Token length limit of the `standard` analyzer, in bytes.
const STANDARD_MAX_TOKEN_LENGTH: usize = 255;

/// Token length limit of the language analyzers, in bytes.
const LANGUAGE_MAX_TOKEN_LENGTH: usize = 40;

/// Stemmer languages with a built-in analyzer of the same name.
const LANGUAGES: [&str; 18] = [
    "arabic",
    "danish",
    "dutch",
    "english",
    "finnish",
    "french",
    "german",
    "greek",
    "hungarian",
    "italian",
    "norwegian",
    "portuguese",
    "romanian",
    "russian",
    "spanish",
    "swedish",
    "tamil",
    "turkish",
];

/// Parses a stemmer language string into a Tantivy `Language`.
///
/// Supports lowercase language names matching Tantivy's `Language` enum.
pub fn parse_language(name: &str) -> Result<Language, IndexError> {
    match name.to_lowercase().as_str() {
        "arabic" => Ok(Language::Arabic),
        "danish" => Ok(Language::Danish),
        "dutch" => Ok(Language::Dutch),
        "english" => Ok(Language::English),
        "finnish" => Ok(Language::Finnish),
        "french" => Ok(Language::French),
        "german" => Ok(Language::German),
        "greek" => Ok(Language::Greek),
        "hungarian" => Ok(Language::Hungarian),
        "italian" => Ok(Language::Italian),
        "norwegian" => Ok(Language::Norwegian),
        "portuguese" => Ok(Language::Portuguese),
        "romanian" => Ok(Language::Romanian),
        "russian" => Ok(Language::Russian),
        "spanish" => Ok(Language::Spanish),
        "swedish" => Ok(Language::Swedish),
        "tamil" => Ok(Language::Tamil),
        "turkish" => Ok(Language::Turkish),
        other => Err(IndexError::InvalidLanguage(other.to_string())),
    }
}

/// Builds a language analyzer: simple tokenizer, lowercase, long-token removal, stemmer.
pub fn build_language_analyzer(language: Language) -> TextAnalyzer {
    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .filter(RemoveLongFilter::limit(LANGUAGE_MAX_TOKEN_LENGTH))
        .filter(Stemmer::new(language))
        .build()
}

/// Builds an analyzer from a config definition.
pub fn build_analyzer(name: &str, definition: &AnalyzerDefinition) -> Result<TextAnalyzer, IndexError> {
    let invalid = |message: &str| IndexError::InvalidAnalyzer {
        name: name.to_string(),
        message: message.to_string(),
    };
    let language = || {
        definition
            .language
            .as_deref()
            .ok_or_else(|| invalid("language is required by this filter"))
            .and_then(parse_language)
    };

    let mut builder = match definition.tokenizer {
        TokenizerKind::Simple => TextAnalyzer::builder(SimpleTokenizer::default()).dynamic(),
        TokenizerKind::Whitespace => TextAnalyzer::builder(WhitespaceTokenizer::default()).dynamic(),
        TokenizerKind::Keyword => TextAnalyzer::builder(RawTokenizer::default()).dynamic(),
    };

    for filter in &definition.filters {
        builder = match filter {
            FilterKind::Lowercase => builder.filter_dynamic(LowerCaser),
            FilterKind::AsciiFolding => builder.filter_dynamic(AsciiFoldingFilter),
            FilterKind::AlphaNumOnly => builder.filter_dynamic(AlphaNumOnlyFilter),
            FilterKind::RemoveLong => builder.filter_dynamic(RemoveLongFilter::limit(
                definition
                    .max_token_length
                    .unwrap_or(LANGUAGE_MAX_TOKEN_LENGTH),
            )),
            FilterKind::Stop if !definition.stop_words.is_empty() => {
                builder.filter_dynamic(StopWordFilter::remove(definition.stop_words.clone()))
            }
            FilterKind::Stop => {
                let filter = StopWordFilter::new(language()?)
                    .ok_or_else(|| invalid("no stop word list for this language"))?;
                builder.filter_dynamic(filter)
            }
            FilterKind::Stemmer => builder.filter_dynamic(Stemmer::new(language()?)),
        };
    }

    Ok(builder.build())
}

/// Named analyzers available to mappings and clauses.
///
/// The registry is shared between the compiler (as an [`AnalyzerCatalog`]) and the indexes it
/// configures, so lookups take a read lock and registration a write lock.
pub struct AnalyzerRegistry {
    /// Analyzers by name.
    analyzers: RwLock<HashMap<String, TextAnalyzer>>,
}

impl AnalyzerRegistry {
    /// A registry holding only the built-in analyzers.
    pub fn new() -> Self {
        let mut analyzers = HashMap::new();
        analyzers.insert(
            "standard".to_string(),
            TextAnalyzer::builder(SimpleTokenizer::default())
                .filter(RemoveLongFilter::limit(STANDARD_MAX_TOKEN_LENGTH))
                .filter(LowerCaser)
                .build(),
        );
        analyzers.insert(
            "simple".to_string(),
            TextAnalyzer::builder(SimpleTokenizer::default())
                .filter(LowerCaser)
                .build(),
        );
        analyzers.insert(
            "whitespace".to_string(),
            TextAnalyzer::from(WhitespaceTokenizer::default()),
        );
        analyzers.insert("keyword".to_string(), TextAnalyzer::from(RawTokenizer::default()));
        for name in LANGUAGES {
            if let Ok(language) = parse_language(name) {
                analyzers.insert(name.to_string(), build_language_analyzer(language));
            }
        }
        Self {
            analyzers: RwLock::new(analyzers),
        }
    }

    /// Built-ins plus every analyzer defined in `config`.
    pub fn from_config(config: &Config) -> Result<Self, IndexError> {
        let registry = Self::new();
        for (name, definition) in &config.analyzers {
            registry.register(name, build_analyzer(name, definition)?);
        }
        Ok(registry)
    }

    /// Adds or replaces an analyzer.
    pub fn register(&self, name: &str, analyzer: TextAnalyzer) {
        debug!("registering analyzer [{name}]");
        self.analyzers.write().insert(name.to_string(), analyzer);
    }

    /// Returns a copy of the named analyzer.
    pub fn get(&self, name: &str) -> Option<TextAnalyzer> {
        self.analyzers.read().get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.analyzers.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Registers every analyzer with a tantivy tokenizer manager.
    pub fn install(&self, manager: &TokenizerManager) {
        for (name, analyzer) in self.analyzers.read().iter() {
            manager.register(name, analyzer.clone());
        }
    }

    /// Runs the named analyzer over `text` and returns the token texts.
    pub fn tokenize(&self, name: &str, text: &str) -> Result<Vec<String>, IndexError> {
        let mut analyzer = self
            .get(name)
            .ok_or_else(|| IndexError::UnknownAnalyzer(name.to_string()))?;
        Ok(tokenize(&mut analyzer, text))
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalyzerCatalog for AnalyzerRegistry {
    fn contains(&self, name: &str) -> bool {
        self.analyzers.read().contains_key(name)
    }
}

/// Collects the token texts `analyzer` produces for `text`.
pub fn tokenize(analyzer: &mut TextAnalyzer, text: &str) -> Vec<String> {
    let mut stream = analyzer.token_stream(text);
    let mut tokens = Vec::new();
    while let Some(token) = stream.next() {
        tokens.push(token.text.clone());
    }
    tokens
}
