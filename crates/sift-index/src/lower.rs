//! Lowering of compiled clauses into Tantivy queries.
//!
//! Text is analyzed here, with the analyzer each clause carries. Terms on keyword, numeric,
//! boolean and date fields are built from the raw value according to the field kind.
//! Clauses on unmapped fields match nothing.

use std::ops::Bound;

use log::debug;
use sift_query::{
    BoolClause, Clause, FieldKind, Fuzziness, FuzzyClause, MatchClause, MatchPhraseClause,
    MultiMatchType, Occur as ClauseOccur, Operator, PatternClause, RangeClause, RangeValue,
    TermClause, TermValue, TermsClause, compute, parse_date,
};
use tantivy::{
    DateTime, Term,
    query::{
        AllQuery, BooleanQuery, BoostQuery, ConstScoreQuery, DisjunctionMaxQuery, EmptyQuery,
        FuzzyTermQuery, Occur, PhraseQuery, Query, RangeQuery, RegexQuery, TermQuery,
        TermSetQuery,
    },
    schema::{Field, IndexRecordOption},
    tokenizer::TokenStream,
};

use crate::{IndexError, analyzer::AnalyzerRegistry, schema::IndexSchema};

/// Lowers `clause` against `schema`, analyzing text with `analyzers`.
pub fn lower_clause(
    clause: &Clause,
    schema: &IndexSchema,
    analyzers: &AnalyzerRegistry,
) -> Result<Box<dyn Query>, IndexError> {
    Lowering { schema, analyzers }.lower(clause)
}

/// Schema and analyzers for one lowering pass.
struct Lowering<'a> {
    /// Field handles.
    schema: &'a IndexSchema,
    /// Analyzers named by text clauses.
    analyzers: &'a AnalyzerRegistry,
}

impl Lowering<'_> {
    /// Lowers one clause and applies its boost.
    fn lower(&self, clause: &Clause) -> Result<Box<dyn Query>, IndexError> {
        let query: Box<dyn Query> = match clause {
            Clause::Bool(b) => self.bool_query(b)?,
            Clause::Match(m) => self.match_query(m)?,
            Clause::MatchPhrase(p) => self.phrase_query(p)?,
            Clause::Term(t) => self.term_query(t)?,
            Clause::Terms(t) => self.terms_query(t)?,
            Clause::Range(r) => self.range_query(r)?,
            Clause::Prefix(p) => self.pattern_query(p, "prefix", prefix_regex)?,
            Clause::Wildcard(p) => self.pattern_query(p, "wildcard", wildcard_regex)?,
            Clause::Fuzzy(z) => self.fuzzy_query(z)?,
            Clause::MatchAll { .. } => Box::new(AllQuery),
            Clause::MatchNone => Box::new(EmptyQuery),
        };
        Ok(boosted(query, clause.boost()))
    }

    /// Resolves a mapped field, or `None` when the field is unmapped.
    fn field(&self, name: &str, clause: &str) -> Option<(Field, FieldKind)> {
        let field = self.schema.field(name);
        if field.is_none() {
            debug!("[{clause}] field [{name}] is not mapped, matching nothing");
        }
        field
    }

    /// Lowers a boolean composition.
    ///
    /// `filter` children are required with a zero score. A clause with no positive children
    /// matches everything its `must_not` children do not.
    fn bool_query(&self, clause: &BoolClause) -> Result<Box<dyn Query>, IndexError> {
        if clause.children.is_empty() {
            return Ok(Box::new(AllQuery));
        }

        if clause.multi_match_type.is_some() {
            return self.multi_match_query(clause);
        }

        let mut subqueries: Vec<(Occur, Box<dyn Query>)> =
            Vec::with_capacity(clause.children.len());
        for child in &clause.children {
            let query = self.lower(&child.clause)?;
            subqueries.push(match child.occur {
                ClauseOccur::Must => (Occur::Must, query),
                ClauseOccur::Should => (Occur::Should, query),
                ClauseOccur::MustNot => (Occur::MustNot, query),
                ClauseOccur::Filter => {
                    let unscored: Box<dyn Query> = Box::new(ConstScoreQuery::new(query, 0.0));
                    (Occur::Must, unscored)
                }
            });
        }

        if subqueries.iter().all(|(occur, _)| *occur == Occur::MustNot) {
            subqueries.push((Occur::Must, Box::new(AllQuery)));
        }

        Ok(match clause.minimum_should_match {
            Some(minimum) if minimum > 0 => {
                Box::new(BooleanQuery::with_minimum_required_clauses(subqueries, minimum))
            }
            _ => Box::new(BooleanQuery::new(subqueries)),
        })
    }

    /// Lowers the per-field `should` clauses produced by `multi_match`.
    ///
    /// `best_fields` scores by the best field, `phrase` types match each field as a phrase,
    /// and the other types sum the field scores.
    fn multi_match_query(&self, clause: &BoolClause) -> Result<Box<dyn Query>, IndexError> {
        let match_type = clause.multi_match_type.unwrap_or_default();
        let mut disjuncts = Vec::with_capacity(clause.children.len());
        for child in &clause.children {
            let query = match (&child.clause, match_type) {
                (Clause::Match(m), MultiMatchType::Phrase | MultiMatchType::PhrasePrefix) => {
                    let phrase = MatchPhraseClause {
                        field: m.field.clone(),
                        query: m.query.clone(),
                        analyzer: m.analyzer.clone(),
                        slop: 0,
                        boost: m.boost,
                    };
                    boosted(self.phrase_query(&phrase)?, m.boost)
                }
                (other, _) => self.lower(other)?,
            };
            disjuncts.push(query);
        }

        if match_type == MultiMatchType::BestFields && clause.minimum_should_match.is_none() {
            return Ok(Box::new(DisjunctionMaxQuery::new(disjuncts)));
        }

        let subqueries: Vec<(Occur, Box<dyn Query>)> = disjuncts
            .into_iter()
            .map(|query| (Occur::Should, query))
            .collect();
        Ok(match clause.minimum_should_match {
            Some(minimum) if minimum > 0 => {
                Box::new(BooleanQuery::with_minimum_required_clauses(subqueries, minimum))
            }
            _ => Box::new(BooleanQuery::new(subqueries)),
        })
    }

    /// Lowers an analyzed match.
    ///
    /// Each analyzed token becomes a term (or fuzzy term) query. With `and` every token is
    /// required; with `or` the threshold, if any, is resolved against the token count.
    fn match_query(&self, clause: &MatchClause) -> Result<Box<dyn Query>, IndexError> {
        let Some((field, kind)) = self.field(&clause.field, "match") else {
            return Ok(Box::new(EmptyQuery));
        };
        if kind != FieldKind::Text {
            let value = TermValue::Text(clause.query.clone());
            return self.exact_query(field, kind, &value, &clause.field, "match");
        }

        let tokens = self.analyzers.tokenize(&clause.analyzer.name, &clause.query)?;
        let mut queries: Vec<Box<dyn Query>> = tokens
            .iter()
            .map(|token| token_query(field, token, clause.fuzziness))
            .collect();

        if queries.is_empty() {
            return Ok(Box::new(EmptyQuery));
        }
        if queries.len() == 1
            && (clause.operator == Operator::And || clause.minimum_should_match.is_none())
        {
            return Ok(queries.remove(0));
        }

        let occur = match clause.operator {
            Operator::And => Occur::Must,
            Operator::Or => Occur::Should,
        };
        let subqueries: Vec<(Occur, Box<dyn Query>)> =
            queries.into_iter().map(|query| (occur, query)).collect();

        let minimum = match (&clause.minimum_should_match, clause.operator) {
            (Some(threshold), Operator::Or) => compute(subqueries.len(), threshold)?,
            _ => 0,
        };
        Ok(if minimum > 0 {
            Box::new(BooleanQuery::with_minimum_required_clauses(subqueries, minimum))
        } else {
            Box::new(BooleanQuery::new(subqueries))
        })
    }

    /// Lowers an analyzed phrase, keeping the token positions the analyzer reports.
    fn phrase_query(&self, clause: &MatchPhraseClause) -> Result<Box<dyn Query>, IndexError> {
        let Some((field, kind)) = self.field(&clause.field, "match_phrase") else {
            return Ok(Box::new(EmptyQuery));
        };
        if kind != FieldKind::Text {
            let value = TermValue::Text(clause.query.clone());
            return self.exact_query(field, kind, &value, &clause.field, "match_phrase");
        }

        let mut analyzer = self
            .analyzers
            .get(&clause.analyzer.name)
            .ok_or_else(|| IndexError::UnknownAnalyzer(clause.analyzer.name.clone()))?;
        let mut stream = analyzer.token_stream(&clause.query);
        let mut terms = Vec::new();
        while let Some(token) = stream.next() {
            terms.push((token.position, Term::from_field_text(field, &token.text)));
        }

        Ok(match terms.len() {
            0 => Box::new(EmptyQuery),
            1 => {
                let (_, term) = terms.remove(0);
                Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs))
            }
            _ => {
                let mut query = PhraseQuery::new_with_offset(terms);
                query.set_slop(clause.slop);
                Box::new(query)
            }
        })
    }

    /// Lowers an exact term.
    fn term_query(&self, clause: &TermClause) -> Result<Box<dyn Query>, IndexError> {
        let Some((field, kind)) = self.field(&clause.field, "term") else {
            return Ok(Box::new(EmptyQuery));
        };
        self.exact_query(field, kind, &clause.value, &clause.field, "term")
    }

    /// Lowers a set of exact terms. Dates are matched one by one.
    fn terms_query(&self, clause: &TermsClause) -> Result<Box<dyn Query>, IndexError> {
        let Some((field, kind)) = self.field(&clause.field, "terms") else {
            return Ok(Box::new(EmptyQuery));
        };
        if kind == FieldKind::Date {
            let subqueries = clause
                .values
                .iter()
                .map(|value| {
                    self.exact_query(field, kind, value, &clause.field, "terms")
                        .map(|query| (Occur::Should, query))
                })
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Box::new(BooleanQuery::new(subqueries)));
        }

        let terms = clause
            .values
            .iter()
            .map(|value| self.schema_term(field, kind, value, &clause.field, "terms"))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Box::new(TermSetQuery::new(terms)))
    }

    /// Matches one value exactly, according to the field kind.
    fn exact_query(
        &self,
        field: Field,
        kind: FieldKind,
        value: &TermValue,
        name: &str,
        clause: &'static str,
    ) -> Result<Box<dyn Query>, IndexError> {
        if kind == FieldKind::Date {
            let at = date_value(value, self.schema.format(name)).map_err(|message| {
                IndexError::Lower {
                    clause,
                    field: name.to_string(),
                    message,
                }
            })?;
            return Ok(Box::new(RangeQuery::new_date_bounds(
                name.to_string(),
                Bound::Included(at),
                Bound::Included(at),
            )));
        }
        let term = self.schema_term(field, kind, value, name, clause)?;
        Ok(Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)))
    }

    /// Builds the indexed term for a non-date value.
    fn schema_term(
        &self,
        field: Field,
        kind: FieldKind,
        value: &TermValue,
        name: &str,
        clause: &'static str,
    ) -> Result<Term, IndexError> {
        let mismatch = |expected: &str| IndexError::Lower {
            clause,
            field: name.to_string(),
            message: format!("expected {expected}, got [{value}]"),
        };
        match kind {
            FieldKind::Text | FieldKind::Keyword => {
                Ok(Term::from_field_text(field, &value.to_string()))
            }
            FieldKind::Numeric => value
                .as_f64()
                .map(|number| Term::from_field_f64(field, number))
                .ok_or_else(|| mismatch("a number")),
            FieldKind::Bool => match value {
                TermValue::Bool(b) => Ok(Term::from_field_bool(field, *b)),
                TermValue::Text(s) => s
                    .parse::<bool>()
                    .map(|b| Term::from_field_bool(field, b))
                    .map_err(|_| mismatch("a boolean")),
                _ => Err(mismatch("a boolean")),
            },
            FieldKind::Date => date_value(value, self.schema.format(name))
                .map(|at| Term::from_field_date(field, at))
                .map_err(|message| IndexError::Lower {
                    clause,
                    field: name.to_string(),
                    message,
                }),
        }
    }

    /// Lowers a range according to the field kind.
    fn range_query(&self, clause: &RangeClause) -> Result<Box<dyn Query>, IndexError> {
        let Some((_, kind)) = self.field(&clause.field, "range") else {
            return Ok(Box::new(EmptyQuery));
        };
        let field = clause.field.clone();
        let invalid = |message: String| IndexError::Lower {
            clause: "range",
            field: clause.field.clone(),
            message,
        };

        let query: Box<dyn Query> = match kind {
            FieldKind::Numeric => {
                let number = |bound: &RangeValue| match bound {
                    RangeValue::Number(n) => Ok(*n),
                    RangeValue::Text(s) => s
                        .parse::<f64>()
                        .map_err(|_| format!("expected a number, got [{s}]")),
                    RangeValue::Date(d) => Ok(d.timestamp_millis() as f64),
                };
                Box::new(RangeQuery::new_f64_bounds(
                    field,
                    map_bound(&clause.lower, number).map_err(invalid)?,
                    map_bound(&clause.upper, number).map_err(invalid)?,
                ))
            }
            FieldKind::Date => {
                let format = self.schema.format(&clause.field);
                let date = |bound: &RangeValue| match bound {
                    RangeValue::Date(d) => Ok(DateTime::from_timestamp_millis(d.timestamp_millis())),
                    RangeValue::Number(n) => Ok(DateTime::from_timestamp_millis(*n as i64)),
                    RangeValue::Text(s) => date_value(&TermValue::Text(s.clone()), format),
                };
                Box::new(RangeQuery::new_date_bounds(
                    field,
                    map_bound(&clause.lower, date).map_err(invalid)?,
                    map_bound(&clause.upper, date).map_err(invalid)?,
                ))
            }
            FieldKind::Text | FieldKind::Keyword => {
                let text = |bound: &RangeValue| -> Result<String, String> {
                    Ok(match bound {
                        RangeValue::Text(s) => s.clone(),
                        RangeValue::Number(n) => n.to_string(),
                        RangeValue::Date(d) => d.to_rfc3339(),
                    })
                };
                let lower = map_bound(&clause.lower, text).map_err(invalid)?;
                let upper = map_bound(&clause.upper, text).map_err(invalid)?;
                Box::new(RangeQuery::new_str_bounds(
                    field,
                    lower.as_ref().map(String::as_str),
                    upper.as_ref().map(String::as_str),
                ))
            }
            FieldKind::Bool => {
                return Err(invalid("ranges are not supported on boolean fields".into()));
            }
        };
        Ok(query)
    }

    /// Lowers a prefix or wildcard pattern to a regular expression over the term dictionary.
    ///
    /// Text fields hold analyzed (lowercased) tokens, so the pattern is lowercased for them.
    fn pattern_query(
        &self,
        clause: &PatternClause,
        name: &'static str,
        to_regex: fn(&str) -> String,
    ) -> Result<Box<dyn Query>, IndexError> {
        let Some((field, kind)) = self.field(&clause.field, name) else {
            return Ok(Box::new(EmptyQuery));
        };
        let value = match kind {
            FieldKind::Text => clause.value.to_lowercase(),
            FieldKind::Keyword => clause.value.clone(),
            _ => {
                return Err(IndexError::Lower {
                    clause: name,
                    field: clause.field.clone(),
                    message: "only text and keyword fields support patterns".into(),
                });
            }
        };
        let query = RegexQuery::from_pattern(&to_regex(&value), field).map_err(|e| {
            IndexError::Lower {
                clause: name,
                field: clause.field.clone(),
                message: e.to_string(),
            }
        })?;
        Ok(Box::new(query))
    }

    /// Lowers a fuzzy term.
    fn fuzzy_query(&self, clause: &FuzzyClause) -> Result<Box<dyn Query>, IndexError> {
        let Some((field, kind)) = self.field(&clause.field, "fuzzy") else {
            return Ok(Box::new(EmptyQuery));
        };
        let value = match kind {
            FieldKind::Text => clause.value.to_lowercase(),
            FieldKind::Keyword => clause.value.clone(),
            _ => {
                return Err(IndexError::Lower {
                    clause: "fuzzy",
                    field: clause.field.clone(),
                    message: "only text and keyword fields support fuzzy matching".into(),
                });
            }
        };
        let distance = clause.fuzziness.distance_for(&value);
        let term = Term::from_field_text(field, &value);
        Ok(Box::new(FuzzyTermQuery::new(
            term,
            distance,
            clause.transpositions,
        )))
    }
}

/// Wraps `query` in a boost unless the boost is absent or neutral.
fn boosted(query: Box<dyn Query>, boost: Option<f32>) -> Box<dyn Query> {
    match boost {
        Some(factor) if (factor - 1.0).abs() > f32::EPSILON => {
            Box::new(BoostQuery::new(query, factor))
        }
        _ => query,
    }
}

/// A term query for one analyzed token, fuzzy when asked for.
fn token_query(field: Field, token: &str, fuzziness: Option<Fuzziness>) -> Box<dyn Query> {
    let term = Term::from_field_text(field, token);
    match fuzziness.map(|f| f.distance_for(token)) {
        Some(distance) if distance > 0 => Box::new(FuzzyTermQuery::new(term, distance, true)),
        _ => Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)),
    }
}

/// Converts a bound with `convert`, keeping its inclusiveness.
fn map_bound<T, U>(
    bound: &Bound<T>,
    convert: impl Fn(&T) -> Result<U, String>,
) -> Result<Bound<U>, String> {
    Ok(match bound {
        Bound::Included(v) => Bound::Included(convert(v)?),
        Bound::Excluded(v) => Bound::Excluded(convert(v)?),
        Bound::Unbounded => Bound::Unbounded,
    })
}

/// Reads a date from epoch milliseconds or a string in `format` (RFC 3339 when unset).
fn date_value(value: &TermValue, format: Option<&str>) -> Result<DateTime, String> {
    match value {
        TermValue::Integer(millis) => Ok(DateTime::from_timestamp_millis(*millis)),
        TermValue::Float(millis) => Ok(DateTime::from_timestamp_millis(*millis as i64)),
        TermValue::Text(s) => parse_date(s, format)
            .map(|d| DateTime::from_timestamp_millis(d.timestamp_millis()))
            .map_err(|e| e.message),
        TermValue::Bool(b) => Err(format!("expected a date, got [{b}]")),
    }
}

/// Regex matching every term that starts with `prefix`.
fn prefix_regex(prefix: &str) -> String {
    format!("{}.*", regex::escape(prefix))
}

/// Regex for a `*`/`?` wildcard pattern.
fn wildcard_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut literal = String::new();
    for c in pattern.chars() {
        match c {
            '*' | '?' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(if c == '*' { ".*" } else { "." });
            }
            _ => literal.push(c),
        }
    }
    out.push_str(&regex::escape(&literal));
    out
}
