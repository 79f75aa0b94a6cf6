//! The compiled query tree.
//!
//! A [`Clause`] is engine-independent: analyzers are referenced by name, thresholds that depend
//! on analyzed term counts are kept unresolved, and date bounds are already parsed.

use std::{fmt, ops::Bound};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{analysis::AnalyzerRef, error::QueryError, threshold::Threshold};

/// A node of the compiled query tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Boolean composition of child clauses.
    Bool(BoolClause),
    /// Analyzed full-text match on one field.
    Match(MatchClause),
    /// Analyzed phrase match on one field.
    MatchPhrase(MatchPhraseClause),
    /// Exact term.
    Term(TermClause),
    /// Any of several exact terms.
    Terms(TermsClause),
    /// Bounded range.
    Range(RangeClause),
    /// Terms starting with a prefix.
    Prefix(PatternClause),
    /// Terms matching a `*`/`?` pattern.
    Wildcard(PatternClause),
    /// Terms within an edit distance.
    Fuzzy(FuzzyClause),
    /// Every document.
    MatchAll {
        /// Optional constant score.
        boost: Option<f32>,
    },
    /// No document.
    MatchNone,
}

/// Discriminant of a [`Clause`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClauseKind {
    /// `bool`
    Bool,
    /// `match`
    Match,
    /// `match_phrase`
    MatchPhrase,
    /// `term`
    Term,
    /// `terms`
    Terms,
    /// `range`
    Range,
    /// `prefix`
    Prefix,
    /// `wildcard`
    Wildcard,
    /// `fuzzy`
    Fuzzy,
    /// `match_all`
    MatchAll,
    /// `match_none`
    MatchNone,
}

impl ClauseKind {
    /// The DSL name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Match => "match",
            Self::MatchPhrase => "match_phrase",
            Self::Term => "term",
            Self::Terms => "terms",
            Self::Range => "range",
            Self::Prefix => "prefix",
            Self::Wildcard => "wildcard",
            Self::Fuzzy => "fuzzy",
            Self::MatchAll => "match_all",
            Self::MatchNone => "match_none",
        }
    }
}

/// How a child of a boolean clause participates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occur {
    /// Must match and contributes to the score.
    Must,
    /// Optional; counts toward `minimum_should_match`.
    Should,
    /// Must not match.
    MustNot,
    /// Must match, does not contribute to the score.
    Filter,
}

impl Occur {
    /// The DSL key of this occurrence.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Must => "must",
            Self::Should => "should",
            Self::MustNot => "must_not",
            Self::Filter => "filter",
        }
    }
}

/// Term combination inside a single analyzed match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Any term may match.
    #[default]
    Or,
    /// Every term must match.
    And,
}

impl Operator {
    /// Parses `or`/`and`, case-insensitively. Anything else fails with `IllegalArgument`.
    pub fn parse(value: &str, ctx: &str) -> Result<Self, QueryError> {
        match value.to_ascii_uppercase().as_str() {
            "OR" => Ok(Self::Or),
            "AND" => Ok(Self::And),
            other => Err(QueryError::illegal_argument(format!(
                "[{ctx}] unknown operator {other}"
            ))),
        }
    }
}

/// `multi_match` scoring strategy, carried through for the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MultiMatchType {
    /// Score by the best matching field.
    #[default]
    BestFields,
    /// Sum the scores of all matching fields.
    MostFields,
    /// Treat the fields as one combined field.
    CrossFields,
    /// Phrase match in each field.
    Phrase,
    /// Phrase-prefix match in each field.
    PhrasePrefix,
    /// Terms as a boolean query, last term as a prefix.
    BoolPrefix,
}

impl MultiMatchType {
    /// Parses the type name, case-insensitively.
    pub fn parse(value: &str) -> Result<Self, QueryError> {
        match value.to_ascii_lowercase().as_str() {
            "best_fields" => Ok(Self::BestFields),
            "most_fields" => Ok(Self::MostFields),
            "cross_fields" => Ok(Self::CrossFields),
            "phrase" => Ok(Self::Phrase),
            "phrase_prefix" => Ok(Self::PhrasePrefix),
            "bool_prefix" => Ok(Self::BoolPrefix),
            _ => Err(QueryError::illegal_argument(format!(
                "[multi_match] unknown type [{value}]"
            ))),
        }
    }

    /// The DSL name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BestFields => "best_fields",
            Self::MostFields => "most_fields",
            Self::CrossFields => "cross_fields",
            Self::Phrase => "phrase",
            Self::PhrasePrefix => "phrase_prefix",
            Self::BoolPrefix => "bool_prefix",
        }
    }
}

/// A boolean composition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolClause {
    /// Children in input order.
    pub children: Vec<BoolChild>,
    /// Resolved minimum number of `should` children that must match.
    pub minimum_should_match: Option<usize>,
    /// Boost; `None` when unset.
    pub boost: Option<f32>,
    /// Set when this clause was produced by `multi_match`.
    pub multi_match_type: Option<MultiMatchType>,
}

impl BoolClause {
    /// Appends a child.
    pub fn push(&mut self, occur: Occur, clause: Clause) {
        self.children.push(BoolChild { occur, clause });
    }

    /// Iterates children with the given occurrence.
    pub fn children_with(&self, occur: Occur) -> impl Iterator<Item = &Clause> {
        self.children
            .iter()
            .filter(move |c| c.occur == occur)
            .map(|c| &c.clause)
    }

    /// Number of `should` children.
    pub fn should_count(&self) -> usize {
        self.children_with(Occur::Should).count()
    }
}

/// One child of a [`BoolClause`].
#[derive(Debug, Clone, PartialEq)]
pub struct BoolChild {
    /// How the child participates.
    pub occur: Occur,
    /// The child clause.
    pub clause: Clause,
}

/// Analyzed match on one field.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchClause {
    /// Target field.
    pub field: String,
    /// Query text, analyzed by `analyzer`.
    pub query: String,
    /// How analyzed terms combine.
    pub operator: Operator,
    /// Analyzer for the query text.
    pub analyzer: AnalyzerRef,
    /// Threshold over the analyzed terms, resolved by the engine.
    pub minimum_should_match: Option<Threshold>,
    /// Optional per-term fuzziness.
    pub fuzziness: Option<Fuzziness>,
    /// Boost; `None` when unset.
    pub boost: Option<f32>,
}

/// Analyzed phrase match on one field.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchPhraseClause {
    /// Target field.
    pub field: String,
    /// Phrase text, analyzed by `analyzer`.
    pub query: String,
    /// Analyzer for the phrase text.
    pub analyzer: AnalyzerRef,
    /// Allowed positional distance between terms.
    pub slop: u32,
    /// Boost; `None` when unset.
    pub boost: Option<f32>,
}

/// An exact value.
#[derive(Debug, Clone, PartialEq)]
pub enum TermValue {
    /// A string.
    Text(String),
    /// An integer.
    Integer(i64),
    /// A floating point number.
    Float(f64),
    /// A boolean.
    Bool(bool),
}

impl TermValue {
    /// The value as `f64`, if numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.parse().ok(),
            Self::Bool(_) => None,
        }
    }
}

impl fmt::Display for TermValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Exact term on one field.
#[derive(Debug, Clone, PartialEq)]
pub struct TermClause {
    /// Target field.
    pub field: String,
    /// Value to match exactly.
    pub value: TermValue,
    /// Boost; `None` when unset.
    pub boost: Option<f32>,
}

/// Any of several exact terms on one field.
#[derive(Debug, Clone, PartialEq)]
pub struct TermsClause {
    /// Target field.
    pub field: String,
    /// Accepted values, in input order.
    pub values: Vec<TermValue>,
    /// Boost; `None` when unset.
    pub boost: Option<f32>,
}

/// A range bound.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeValue {
    /// Numeric bound.
    Number(f64),
    /// Date bound.
    Date(DateTime<Utc>),
    /// Lexicographic string bound.
    Text(String),
}

/// A range over one field.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeClause {
    /// Target field.
    pub field: String,
    /// Lower bound.
    pub lower: Bound<RangeValue>,
    /// Upper bound.
    pub upper: Bound<RangeValue>,
    /// Boost; `None` when unset.
    pub boost: Option<f32>,
}

/// A prefix or wildcard pattern on one field.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternClause {
    /// Target field.
    pub field: String,
    /// The prefix, or a pattern using `*` and `?`.
    pub value: String,
    /// Boost; `None` when unset.
    pub boost: Option<f32>,
}

/// Allowed edit distance for fuzzy matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Fuzziness {
    /// Chosen from the term length.
    #[default]
    Auto,
    /// A fixed distance, at most 2.
    Fixed(u8),
}

impl Fuzziness {
    /// Largest supported edit distance.
    pub const MAX_DISTANCE: u8 = 2;

    /// Decodes `"AUTO"`, `0`..`2`, or their string forms.
    pub fn parse(value: &Value, ctx: &str) -> Result<Self, QueryError> {
        let fixed = match value {
            Value::String(s) if s.eq_ignore_ascii_case("auto") => {
                return Ok(Self::Auto);
            }
            Value::String(s) => s.trim().parse::<i64>().ok(),
            Value::Number(n) => n.as_i64(),
            _ => {
                return Err(QueryError::parsing(format!(
                    "[{ctx}] fuzziness should be a number or a string"
                )));
            }
        };
        match fixed.and_then(|d| u8::try_from(d).ok()) {
            Some(d) if d <= Self::MAX_DISTANCE => Ok(Self::Fixed(d)),
            _ => Err(QueryError::illegal_argument(format!(
                "[{ctx}] fuzziness must be AUTO or between 0 and {}, got [{value}]",
                Self::MAX_DISTANCE
            ))),
        }
    }

    /// The edit distance to use for `term`.
    pub fn distance_for(self, term: &str) -> u8 {
        match self {
            Self::Fixed(d) => d,
            Self::Auto => match term.chars().count() {
                0..=2 => 0,
                3..=5 => 1,
                _ => 2,
            },
        }
    }
}

/// Fuzzy term on one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyClause {
    /// Target field.
    pub field: String,
    /// The term to approximate.
    pub value: String,
    /// Allowed edit distance.
    pub fuzziness: Fuzziness,
    /// Whether swapping two adjacent characters counts as one edit.
    pub transpositions: bool,
    /// Boost; `None` when unset.
    pub boost: Option<f32>,
}

impl Clause {
    /// The discriminant of this clause.
    pub fn kind(&self) -> ClauseKind {
        match self {
            Self::Bool(_) => ClauseKind::Bool,
            Self::Match(_) => ClauseKind::Match,
            Self::MatchPhrase(_) => ClauseKind::MatchPhrase,
            Self::Term(_) => ClauseKind::Term,
            Self::Terms(_) => ClauseKind::Terms,
            Self::Range(_) => ClauseKind::Range,
            Self::Prefix(_) => ClauseKind::Prefix,
            Self::Wildcard(_) => ClauseKind::Wildcard,
            Self::Fuzzy(_) => ClauseKind::Fuzzy,
            Self::MatchAll { .. } => ClauseKind::MatchAll,
            Self::MatchNone => ClauseKind::MatchNone,
        }
    }

    /// The boost of this clause, if set.
    pub fn boost(&self) -> Option<f32> {
        match self {
            Self::Bool(c) => c.boost,
            Self::Match(c) => c.boost,
            Self::MatchPhrase(c) => c.boost,
            Self::Term(c) => c.boost,
            Self::Terms(c) => c.boost,
            Self::Range(c) => c.boost,
            Self::Prefix(c) | Self::Wildcard(c) => c.boost,
            Self::Fuzzy(c) => c.boost,
            Self::MatchAll { boost } => *boost,
            Self::MatchNone => None,
        }
    }

    /// Replaces the boost. Has no effect on `match_none`.
    pub fn set_boost(&mut self, value: Option<f32>) {
        match self {
            Self::Bool(c) => c.boost = value,
            Self::Match(c) => c.boost = value,
            Self::MatchPhrase(c) => c.boost = value,
            Self::Term(c) => c.boost = value,
            Self::Terms(c) => c.boost = value,
            Self::Range(c) => c.boost = value,
            Self::Prefix(c) | Self::Wildcard(c) => c.boost = value,
            Self::Fuzzy(c) => c.boost = value,
            Self::MatchAll { boost } => *boost = value,
            Self::MatchNone => {}
        }
    }

    /// The field this clause targets, for leaf clauses.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Match(c) => Some(&c.field),
            Self::MatchPhrase(c) => Some(&c.field),
            Self::Term(c) => Some(&c.field),
            Self::Terms(c) => Some(&c.field),
            Self::Range(c) => Some(&c.field),
            Self::Prefix(c) | Self::Wildcard(c) => Some(&c.field),
            Self::Fuzzy(c) => Some(&c.field),
            Self::Bool(_) | Self::MatchAll { .. } | Self::MatchNone => None,
        }
    }

    /// All fields referenced by this clause and its descendants, in tree order.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    /// Accumulates referenced fields without duplicates.
    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let Self::Bool(b) = self {
            for child in &b.children {
                child.clause.collect_fields(out);
            }
        } else if let Some(field) = self.field()
            && !out.contains(&field)
        {
            out.push(field);
        }
    }

    /// Wraps a clause so that it excludes `negated` from everything.
    pub fn negate(negated: Self) -> Self {
        let mut bool_clause = BoolClause::default();
        bool_clause.push(Occur::Must, Self::MatchAll { boost: None });
        bool_clause.push(Occur::MustNot, negated);
        Self::Bool(bool_clause)
    }

    /// Formats the clause as an indented tree.
    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let prefix = "  ".repeat(indent);
        let boost = self.boost().map(|b| format!("^{b}")).unwrap_or_default();
        match self {
            Self::Bool(b) => {
                write!(f, "{prefix}Bool{boost}")?;
                if let Some(msm) = b.minimum_should_match {
                    write!(f, " min_should={msm}")?;
                }
                if let Some(t) = b.multi_match_type {
                    write!(f, " type={}", t.as_str())?;
                }
                writeln!(f)?;
                for child in &b.children {
                    writeln!(f, "{prefix}  {}:", child.occur.as_str())?;
                    child.clause.fmt_tree(f, indent + 2)?;
                }
                Ok(())
            }
            Self::Match(m) => writeln!(
                f,
                "{prefix}Match({}:{:?} op={:?} analyzer={}){boost}",
                m.field, m.query, m.operator, m.analyzer.name
            ),
            Self::MatchPhrase(m) => writeln!(
                f,
                "{prefix}MatchPhrase({}:{:?} slop={} analyzer={}){boost}",
                m.field, m.query, m.slop, m.analyzer.name
            ),
            Self::Term(t) => writeln!(f, "{prefix}Term({}={}){boost}", t.field, t.value),
            Self::Terms(t) => {
                let values: Vec<String> = t.values.iter().map(ToString::to_string).collect();
                writeln!(f, "{prefix}Terms({}=[{}]){boost}", t.field, values.join(", "))
            }
            Self::Range(r) => writeln!(
                f,
                "{prefix}Range({} {:?}..{:?}){boost}",
                r.field, r.lower, r.upper
            ),
            Self::Prefix(p) => writeln!(f, "{prefix}Prefix({}={:?}){boost}", p.field, p.value),
            Self::Wildcard(p) => writeln!(f, "{prefix}Wildcard({}={:?}){boost}", p.field, p.value),
            Self::Fuzzy(z) => writeln!(
                f,
                "{prefix}Fuzzy({}={:?} {:?}){boost}",
                z.field, z.value, z.fuzziness
            ),
            Self::MatchAll { .. } => writeln!(f, "{prefix}MatchAll{boost}"),
            Self::MatchNone => writeln!(f, "{prefix}MatchNone"),
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}
