//! `minimum_should_match` thresholds.
//!
//! A threshold is written as an integer (`3`, `-1`), a percentage (`"75%"`, `"-25%"`) or a
//! combination of conditional rules (`"2<75% 9<-3"`). [`compute`] turns one into a concrete
//! count for a given number of optional clauses.

use std::fmt;

use serde_json::Value;

use crate::error::QueryError;

/// A parsed `minimum_should_match` specification.
#[derive(Debug, Clone, PartialEq)]
pub enum Threshold {
    /// Absolute count. Negative values count clauses that may be missing.
    Count(i64),
    /// Percentage of the clause count. Negative values give the share that may be missing.
    Percent(f64),
    /// Conditional rules, sorted by ascending `above`.
    Combination(Vec<ConditionalRule>),
}

/// One `above<spec` rule of a combination threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalRule {
    /// The rule applies when the clause count is strictly greater than this.
    pub above: usize,
    /// Count or percentage applied when the rule is selected.
    pub then: Threshold,
}

impl Threshold {
    /// Decodes a threshold from a request value.
    ///
    /// Strings in no known shape and non-integral numbers fail with `XContentParse`. Values
    /// that are neither numbers nor strings fail with `Parsing`.
    pub fn parse(value: &Value) -> Result<Self, QueryError> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    return Ok(Self::Count(i));
                }
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Ok(Self::Count(f as i64)),
                    _ => Err(QueryError::x_content_parse(format!(
                        "unsupported minimum_should_match value [{n}]: not an integer"
                    ))),
                }
            }
            Value::String(s) => Self::parse_str(s),
            other => Err(QueryError::parsing(format!(
                "minimum_should_match should be a number or a string, got [{other}]"
            ))),
        }
    }

    /// Parses the textual form.
    pub fn parse_str(input: &str) -> Result<Self, QueryError> {
        let input = input.trim();
        if !input.contains('<') {
            return parse_simple(input);
        }

        let mut rules: Vec<ConditionalRule> = Vec::new();
        for part in input.split_whitespace() {
            let Some((above, spec)) = part.split_once('<') else {
                return Err(unsupported(input));
            };
            let above: usize = above.trim().parse().map_err(|_| unsupported(input))?;
            if rules.iter().any(|r| r.above == above) {
                return Err(QueryError::x_content_parse(format!(
                    "unsupported minimum_should_match value [{input}]: duplicate threshold [{above}]"
                )));
            }
            rules.push(ConditionalRule {
                above,
                then: parse_simple(spec)?,
            });
        }
        rules.sort_by_key(|r| r.above);
        Ok(Self::Combination(rules))
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Percent(p) => write!(f, "{p}%"),
            Self::Combination(rules) => {
                for (i, rule) in rules.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}<{}", rule.above, rule.then)?;
                }
                Ok(())
            }
        }
    }
}

/// Parses an integer or percentage.
fn parse_simple(input: &str) -> Result<Threshold, QueryError> {
    let input = input.trim();
    if let Some(number) = input.strip_suffix('%') {
        let percent: f64 = number.trim().parse().map_err(|_| unsupported(input))?;
        if !percent.is_finite() {
            return Err(unsupported(input));
        }
        return Ok(Threshold::Percent(percent));
    }
    input
        .parse::<i64>()
        .map(Threshold::Count)
        .map_err(|_| unsupported(input))
}

/// Error for text in no recognized shape.
fn unsupported(input: &str) -> QueryError {
    QueryError::x_content_parse(format!("unsupported minimum_should_match value [{input}]"))
}

/// Computes the number of optional clauses that must match.
///
/// The result is always in `0..=clause_count`. A positive integer larger than `clause_count`
/// fails with `IllegalArgument`.
pub fn compute(clause_count: usize, threshold: &Threshold) -> Result<usize, QueryError> {
    match threshold {
        Threshold::Count(n) if *n >= 0 => {
            let n = usize::try_from(*n).unwrap_or(usize::MAX);
            if n > clause_count {
                return Err(QueryError::illegal_argument(format!(
                    "minimum_should_match [{n}] exceeds the number of clauses [{clause_count}]"
                )));
            }
            Ok(n)
        }
        Threshold::Count(n) => {
            let missing = usize::try_from(n.unsigned_abs()).unwrap_or(usize::MAX);
            Ok(clause_count.saturating_sub(missing))
        }
        Threshold::Percent(p) if *p >= 0.0 => {
            let required = (clause_count as f64 * p / 100.0).ceil();
            Ok(clamp(required, clause_count))
        }
        Threshold::Percent(p) => {
            let missing = (clause_count as f64 * -p / 100.0).floor();
            Ok(clause_count.saturating_sub(clamp(missing, clause_count)))
        }
        Threshold::Combination(rules) => {
            match rules.iter().rev().find(|rule| rule.above < clause_count) {
                Some(rule) => compute(clause_count, &rule.then),
                None => Ok(clause_count),
            }
        }
    }
}

/// Converts a non-negative float to a count no larger than `max`.
fn clamp(value: f64, max: usize) -> usize {
    if value >= max as f64 {
        max
    } else if value <= 0.0 {
        0
    } else {
        value as usize
    }
}
