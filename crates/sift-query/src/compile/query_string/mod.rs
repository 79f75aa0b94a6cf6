//! The `query_string` clause.
//!
//! A compact query language embedded in the DSL:
//!
//! - **Terms**: `rust` (analyzed like a `match`)
//! - **Phrases**: `"error handling"`
//! - **Operators**: `AND`, `OR`, `NOT`, `&&`, `||`, `!`, and a leading `-`
//! - **Grouping**: `(a b) OR c`
//! - **Fields**: `title:guide`
//! - **Boosting**: `rust^2.5`
//! - **Patterns**: `tan*` (prefix), `t?n*vy` (wildcard), `roam~1` (fuzzy)
//!
//! Unscoped terms search `fields`, `default_field`, or every indexed text field, in that order.

mod ast;
mod lexer;
mod parser;

use log::debug;
use serde_json::Value;

use self::ast::Expr;
use super::{CompileContext, text::split_field_boost};
use crate::{
    analysis::FieldAnalyzers,
    clause::{
        BoolClause, Clause, Fuzziness, FuzzyClause, MatchClause, MatchPhraseClause, Occur,
        Operator, PatternClause,
    },
    error::QueryError,
    value,
};

/// A search target and its per-field boost.
type Target = (String, Option<f32>);

/// Compiles `{query, default_field, fields, default_operator, analyzer, boost}`.
pub fn compile_query_string(
    ctx: &mut CompileContext<'_>,
    body: &Value,
) -> Result<Clause, QueryError> {
    let obj = value::as_object(body, "query_string")?;

    let mut query = None;
    let mut default_field = None;
    let mut fields = None;
    let mut operator = Operator::default();
    let mut analyzer = None;
    let mut boost = None;

    for (key, v) in obj {
        match key.to_lowercase().as_str() {
            "query" => query = Some(value::as_str(v, "query_string", "query")?),
            "default_field" => {
                default_field = Some(value::as_str(v, "query_string", "default_field")?);
            }
            "fields" => fields = Some(value::as_string_list(v, "query_string", "fields")?),
            "default_operator" => {
                operator = Operator::parse(
                    value::as_str(v, "query_string", "default_operator")?,
                    "query_string",
                )?;
            }
            "analyzer" => analyzer = Some(value::as_str(v, "query_string", "analyzer")?),
            "boost" => boost = value::boost(v, "query_string")?,
            other => debug!("[query_string] ignoring unknown key [{other}]"),
        }
    }

    let query = query.ok_or_else(|| QueryError::parsing("[query_string] query is required"))?;

    let targets: Vec<Target> = match (fields, default_field) {
        (Some(fields), _) if !fields.is_empty() => fields
            .iter()
            .map(|spec| {
                split_field_boost(spec).map(|(name, boost)| (name.to_string(), boost))
            })
            .collect::<Result<_, _>>()?,
        (_, Some(field)) => vec![(field.to_string(), None)],
        _ => ctx
            .mappings()
            .text_fields()
            .map(|name| (name.to_string(), None))
            .collect(),
    };

    let max_depth = ctx.settings().max_nesting_depth;
    let Some(expr) = parser::parse(query, operator, max_depth)? else {
        return Ok(Clause::MatchNone);
    };

    let mut lowering = Lowering {
        analyzers: ctx.field_analyzers(analyzer)?,
        operator,
    };
    let mut clause = lowering.lower(&expr, &targets)?;
    if boost.is_some() {
        clause.set_boost(boost);
    }
    Ok(clause)
}

/// Converts query string expressions to clauses.
struct Lowering<'a> {
    /// Analyzer resolution shared by every leaf of the query.
    analyzers: FieldAnalyzers<'a>,
    /// Operator for terms that analyze into several tokens.
    operator: Operator,
}

impl Lowering<'_> {
    /// Lowers one expression against the current field targets.
    fn lower(&mut self, expr: &Expr, targets: &[Target]) -> Result<Clause, QueryError> {
        match expr {
            Expr::Term(text) => self.per_field(targets, |this, field| this.term(field, text)),
            Expr::Phrase(text) => self.per_field(targets, |this, field| {
                Ok(Clause::MatchPhrase(MatchPhraseClause {
                    field: field.to_string(),
                    query: text.clone(),
                    analyzer: this.analyzers.resolve(field),
                    slop: 0,
                    boost: None,
                }))
            }),
            Expr::Field { name, expr } => self.lower(expr, &[(name.clone(), None)]),
            Expr::Boost { expr, factor } => {
                let mut clause = self.lower(expr, targets)?;
                clause.set_boost(Some(*factor));
                Ok(clause)
            }
            Expr::Not(inner) => Ok(Clause::negate(self.lower(inner, targets)?)),
            Expr::And(exprs) => self.compose(exprs, Occur::Must, targets),
            Expr::Or(exprs) => self.compose(exprs, Occur::Should, targets),
        }
    }

    /// Builds a boolean clause; negated children become `must_not` in either mode.
    fn compose(
        &mut self,
        exprs: &[Expr],
        occur: Occur,
        targets: &[Target],
    ) -> Result<Clause, QueryError> {
        let mut clause = BoolClause::default();
        let mut positives = 0;
        for expr in exprs {
            if let Expr::Not(inner) = expr {
                let negated = self.lower(inner, targets)?;
                clause.push(Occur::MustNot, negated);
            } else {
                let child = self.lower(expr, targets)?;
                clause.push(occur, child);
                positives += 1;
            }
        }
        if positives == 0 {
            clause.push(Occur::Must, Clause::MatchAll { boost: None });
        }
        Ok(Clause::Bool(clause))
    }

    /// Applies `leaf` to every target; several targets are joined under `should`.
    fn per_field<F>(&mut self, targets: &[Target], mut leaf: F) -> Result<Clause, QueryError>
    where
        F: FnMut(&mut Self, &str) -> Result<Clause, QueryError>,
    {
        match targets {
            [] => Err(QueryError::parsing(
                "[query_string] no field to search: set fields or default_field, or map a text field",
            )),
            [(field, boost)] => {
                let mut clause = leaf(self, field)?;
                if boost.is_some() {
                    clause.set_boost(*boost);
                }
                Ok(clause)
            }
            _ => {
                let mut clause = BoolClause::default();
                for (field, boost) in targets {
                    let mut child = leaf(self, field)?;
                    if boost.is_some() {
                        child.set_boost(*boost);
                    }
                    clause.push(Occur::Should, child);
                }
                Ok(Clause::Bool(clause))
            }
        }
    }

    /// Lowers a bare term on one field.
    fn term(&mut self, field: &str, text: &str) -> Result<Clause, QueryError> {
        if text == "*" {
            return Ok(Clause::MatchAll { boost: None });
        }

        if let Some((word, distance)) = text.rsplit_once('~') {
            let fuzziness = if distance.is_empty() {
                Fuzziness::Auto
            } else {
                Fuzziness::parse(&Value::String(distance.to_string()), "query_string")?
            };
            return Ok(Clause::Fuzzy(FuzzyClause {
                field: field.to_string(),
                value: word.to_string(),
                fuzziness,
                transpositions: true,
                boost: None,
            }));
        }

        let stem = text.strip_suffix('*');
        if let Some(stem) = stem
            && !stem.contains(['*', '?'])
        {
            return Ok(Clause::Prefix(PatternClause {
                field: field.to_string(),
                value: stem.to_string(),
                boost: None,
            }));
        }
        if text.contains(['*', '?']) {
            return Ok(Clause::Wildcard(PatternClause {
                field: field.to_string(),
                value: text.to_string(),
                boost: None,
            }));
        }

        Ok(Clause::Match(MatchClause {
            field: field.to_string(),
            query: text.to_string(),
            operator: self.operator,
            analyzer: self.analyzers.resolve(field),
            minimum_should_match: None,
            fuzziness: None,
            boost: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde_json::json;
    use sift_config::SearchSettings;

    use super::*;
    use crate::{
        ErrorKind,
        compile::ClauseRegistry,
        mapping::{Mappings, Property},
    };

    fn compile_in(mappings: &Mappings, body: Value) -> Result<Clause, QueryError> {
        let registry = ClauseRegistry::standard();
        let catalog: HashSet<String> = ["standard", "english"].into_iter().map(String::from).collect();
        let settings = SearchSettings::default();
        CompileContext::new(&registry, mappings, &catalog, &settings)
            .compile(&json!({ "query_string": body }))
    }

    fn compile(body: Value) -> Result<Clause, QueryError> {
        let mappings = Mappings::new()
            .with_field("title", Property::text().with_analyzer("english"))
            .with_field("body", Property::text());
        compile_in(&mappings, body)
    }

    fn bool_of(clause: Clause) -> BoolClause {
        match clause {
            Clause::Bool(b) => b,
            other => panic!("expected bool, got {other}"),
        }
    }

    #[test]
    fn single_default_field_term() {
        let Clause::Match(m) =
            compile(json!({"query": "rust", "default_field": "title"})).unwrap()
        else {
            panic!("expected match");
        };
        assert_eq!(m.field, "title");
        assert_eq!(m.analyzer.name, "english");
    }

    #[test]
    fn unscoped_terms_search_all_text_fields() {
        let b = bool_of(compile(json!({"query": "rust"})).unwrap());
        let fields: Vec<&str> = b.children.iter().filter_map(|c| c.clause.field()).collect();
        assert_eq!(fields, vec!["body", "title"]);
    }

    #[test]
    fn and_with_negation() {
        let b = bool_of(
            compile(json!({"query": "rust AND -legacy", "default_field": "body"})).unwrap(),
        );
        let occurs: Vec<Occur> = b.children.iter().map(|c| c.occur).collect();
        assert_eq!(occurs, vec![Occur::Must, Occur::MustNot]);
    }

    #[test]
    fn negation_only_keeps_match_all() {
        let b = bool_of(compile(json!({"query": "-legacy", "default_field": "body"})).unwrap());
        assert_eq!(b.children[0].occur, Occur::Must);
        assert_eq!(b.children[0].clause, Clause::MatchAll { boost: None });
        assert_eq!(b.children[1].occur, Occur::MustNot);
    }

    #[test]
    fn field_scoping_and_boosts() {
        let b = bool_of(
            compile(json!({
                "query": "title:rust^2 tantivy",
                "fields": ["body^3"],
                "boost": 1.5
            }))
            .unwrap(),
        );
        assert_eq!(b.boost, Some(1.5));
        assert_eq!(b.children[0].clause.field(), Some("title"));
        assert_eq!(b.children[0].clause.boost(), Some(2.0));
        assert_eq!(b.children[1].clause.field(), Some("body"));
        assert_eq!(b.children[1].clause.boost(), Some(3.0));
    }

    #[test]
    fn patterns() {
        let b = bool_of(
            compile(json!({"query": "tan* t?nt*vy roam~1 *", "default_field": "body"})).unwrap(),
        );
        let kinds: Vec<_> = b.children.iter().map(|c| c.clause.kind().as_str()).collect();
        assert_eq!(kinds, vec!["prefix", "wildcard", "fuzzy", "match_all"]);
    }

    #[test]
    fn phrase_clause() {
        let Clause::MatchPhrase(p) =
            compile(json!({"query": "\"red fox\"", "default_field": "title"})).unwrap()
        else {
            panic!("expected match_phrase");
        };
        assert_eq!(p.query, "red fox");
    }

    #[test]
    fn blank_query_matches_nothing() {
        assert_eq!(
            compile(json!({"query": "  ", "default_field": "body"})).unwrap(),
            Clause::MatchNone
        );
    }

    #[test]
    fn no_searchable_field() {
        let err = compile_in(&Mappings::new(), json!({"query": "rust"})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parsing);
        // Scoped terms do not need a default
        assert!(compile_in(&Mappings::new(), json!({"query": "tag:rust"})).is_ok());
    }

    #[test]
    fn bad_operator_and_syntax() {
        let err = compile(json!({"query": "a", "default_operator": "xor"})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IllegalArgument);
        let err = compile(json!({"query": "(a", "default_field": "body"})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parsing);
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let nested = format!("{}rust{}", "(".repeat(5000), ")".repeat(5000));
        let err = compile(json!({"query": nested, "default_field": "title"})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parsing);

        let negated = format!("{}rust", "NOT ".repeat(5000));
        let err = compile(json!({"query": negated, "default_field": "title"})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parsing);

        assert!(compile(json!({"query": "((NOT legacy) rust)", "default_field": "body"})).is_ok());
    }
}
