//! Analyzed text clauses: `match`, `match_phrase` and `multi_match`.

use log::debug;
use serde_json::Value;

use super::CompileContext;
use crate::{
    clause::{
        BoolClause, Clause, Fuzziness, MatchClause, MatchPhraseClause, MultiMatchType, Occur,
        Operator,
    },
    error::QueryError,
    threshold::{self, Threshold},
    value,
};

/// Compiles `{field: text}` or `{field: {query, operator, analyzer, boost, minimum_should_match,
/// fuzziness}}`.
pub fn compile_match(ctx: &mut CompileContext<'_>, body: &Value) -> Result<Clause, QueryError> {
    let (field, spec) = value::single_field(body, "match")?;

    let mut query = None;
    let mut operator = Operator::default();
    let mut analyzer = None;
    let mut minimum_should_match = None;
    let mut fuzziness = None;
    let mut boost = None;

    match spec {
        Value::Object(obj) => {
            for (key, v) in obj {
                match key.to_lowercase().as_str() {
                    "query" => query = Some(value::scalar_text(v, "match", "query")?),
                    "operator" => {
                        operator = Operator::parse(value::as_str(v, "match", "operator")?, "match")?;
                    }
                    "analyzer" => analyzer = Some(value::as_str(v, "match", "analyzer")?),
                    "minimum_should_match" => {
                        minimum_should_match =
                            Some(Threshold::parse(v).map_err(value::in_clause("match"))?);
                    }
                    "fuzziness" => fuzziness = Some(Fuzziness::parse(v, "match")?),
                    "boost" => boost = value::boost(v, "match")?,
                    other => debug!("[match] ignoring unknown key [{other}]"),
                }
            }
        }
        other => query = Some(value::scalar_text(other, "match", "query")?),
    }

    let query = query.ok_or_else(|| QueryError::parsing("[match] query is required"))?;
    let analyzer = ctx.field_analyzers(analyzer)?.resolve(field);

    Ok(Clause::Match(MatchClause {
        field: field.to_string(),
        query,
        operator,
        analyzer,
        minimum_should_match,
        fuzziness,
        boost,
    }))
}

/// Compiles `{field: text}` or `{field: {query, analyzer, slop, boost}}`.
pub fn compile_match_phrase(
    ctx: &mut CompileContext<'_>,
    body: &Value,
) -> Result<Clause, QueryError> {
    let (field, spec) = value::single_field(body, "match_phrase")?;

    let mut query = None;
    let mut analyzer = None;
    let mut slop = 0;
    let mut boost = None;

    match spec {
        Value::Object(obj) => {
            for (key, v) in obj {
                match key.to_lowercase().as_str() {
                    "query" => query = Some(value::scalar_text(v, "match_phrase", "query")?),
                    "analyzer" => analyzer = Some(value::as_str(v, "match_phrase", "analyzer")?),
                    "slop" => {
                        let n = value::as_usize(v, "match_phrase", "slop")?;
                        slop = u32::try_from(n).map_err(|_| {
                            QueryError::illegal_argument(format!(
                                "[match_phrase] slop [{n}] is too large"
                            ))
                        })?;
                    }
                    "boost" => boost = value::boost(v, "match_phrase")?,
                    other => debug!("[match_phrase] ignoring unknown key [{other}]"),
                }
            }
        }
        other => query = Some(value::scalar_text(other, "match_phrase", "query")?),
    }

    let query = query.ok_or_else(|| QueryError::parsing("[match_phrase] query is required"))?;
    let analyzer = ctx.field_analyzers(analyzer)?.resolve(field);

    Ok(Clause::MatchPhrase(MatchPhraseClause {
        field: field.to_string(),
        query,
        analyzer,
        slop,
        boost,
    }))
}

/// Compiles `multi_match` into a `bool` of per-field `match` clauses under `should`.
///
/// Fields resolve their analyzers lazily in input order, so a field without one of its own
/// reuses the analyzer of an earlier field. `minimum_should_match` is computed against the
/// number of fields.
pub fn compile_multi_match(
    ctx: &mut CompileContext<'_>,
    body: &Value,
) -> Result<Clause, QueryError> {
    let obj = value::as_object(body, "multi_match")?;

    let mut query = None;
    let mut fields: Option<Vec<String>> = None;
    let mut analyzer = None;
    let mut boost = None;
    let mut match_type = MultiMatchType::default();
    let mut operator = Operator::default();
    let mut minimum_should_match = None;

    for (key, v) in obj {
        match key.to_lowercase().as_str() {
            "query" => query = Some(value::as_str(v, "multi_match", "query")?),
            "fields" => fields = Some(value::as_string_list(v, "multi_match", "fields")?),
            "analyzer" => analyzer = Some(value::as_str(v, "multi_match", "analyzer")?),
            "boost" => boost = value::boost(v, "multi_match")?,
            "type" => match_type = MultiMatchType::parse(value::as_str(v, "multi_match", "type")?)?,
            "operator" => {
                operator = Operator::parse(value::as_str(v, "multi_match", "operator")?, "multi_match")?;
            }
            "minimum_should_match" => {
                minimum_should_match =
                    Some(Threshold::parse(v).map_err(value::in_clause("multi_match"))?);
            }
            other => debug!("[multi_match] ignoring unknown key [{other}]"),
        }
    }

    let query = query.ok_or_else(|| QueryError::parsing("[multi_match] query is required"))?;
    let fields = match fields {
        Some(fields) if !fields.is_empty() => fields,
        _ => {
            return Err(QueryError::parsing(
                "[multi_match] fields is required and must not be empty",
            ));
        }
    };

    let mut clause = BoolClause {
        boost,
        multi_match_type: Some(match_type),
        ..BoolClause::default()
    };
    if let Some(threshold) = minimum_should_match {
        clause.minimum_should_match = Some(
            threshold::compute(fields.len(), &threshold)
                .map_err(value::in_clause("multi_match"))?,
        );
    }

    let mut analyzers = ctx.field_analyzers(analyzer)?;
    for spec in &fields {
        let (field, field_boost) = split_field_boost(spec)?;
        let analyzer = analyzers.resolve(field);
        clause.push(
            Occur::Should,
            Clause::Match(MatchClause {
                field: field.to_string(),
                query: query.to_string(),
                operator,
                analyzer,
                minimum_should_match: None,
                fuzziness: None,
                boost: field_boost,
            }),
        );
    }

    Ok(Clause::Bool(clause))
}

/// Splits `title^2.5` into the field name and its boost.
pub fn split_field_boost(spec: &str) -> Result<(&str, Option<f32>), QueryError> {
    let Some((field, boost)) = spec.rsplit_once('^') else {
        return Ok((spec, None));
    };
    let boost: f32 = boost.parse().map_err(|_| {
        QueryError::parsing(format!("[multi_match] invalid boost in field [{spec}]"))
    })?;
    if field.is_empty() {
        return Err(QueryError::parsing(format!(
            "[multi_match] missing field name in [{spec}]"
        )));
    }
    Ok((field, (boost >= 0.0).then_some(boost)))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde_json::json;
    use sift_config::SearchSettings;

    use super::*;
    use crate::{
        ErrorKind,
        analysis::{AnalyzerRef, AnalyzerSource},
        compile::ClauseRegistry,
        mapping::{Mappings, Property},
    };

    fn mappings() -> Mappings {
        Mappings::new()
            .with_field("title", Property::text().with_search_analyzer("english"))
            .with_field("body", Property::text())
            .with_field("summary", Property::text().with_analyzer("french"))
    }

    fn compile(query: Value) -> Result<Clause, QueryError> {
        let registry = ClauseRegistry::standard();
        let mappings = mappings();
        let catalog: HashSet<String> = ["standard", "english", "french", "whitespace"]
            .into_iter()
            .map(String::from)
            .collect();
        let settings = SearchSettings::default();
        CompileContext::new(&registry, &mappings, &catalog, &settings).compile(&query)
    }

    fn should_matches(clause: &Clause) -> Vec<&MatchClause> {
        let Clause::Bool(b) = clause else {
            panic!("expected bool, got {clause}");
        };
        b.children
            .iter()
            .map(|c| {
                assert_eq!(c.occur, Occur::Should);
                match &c.clause {
                    Clause::Match(m) => m,
                    other => panic!("expected match, got {other}"),
                }
            })
            .collect()
    }

    #[test]
    fn match_shorthand() {
        let Clause::Match(m) = compile(json!({"match": {"title": "rust search"}})).unwrap() else {
            panic!("expected match");
        };
        assert_eq!(m.field, "title");
        assert_eq!(m.query, "rust search");
        assert_eq!(m.operator, Operator::Or);
        assert_eq!(m.analyzer, AnalyzerRef::new("english", AnalyzerSource::FieldSearch));
        assert_eq!(m.boost, None);
    }

    #[test]
    fn match_full_form() {
        let Clause::Match(m) = compile(json!({"match": {"body": {
            "query": "rust search",
            "operator": "AND",
            "analyzer": "whitespace",
            "minimum_should_match": "50%",
            "fuzziness": "auto",
            "boost": 3
        }}}))
        .unwrap() else {
            panic!("expected match");
        };
        assert_eq!(m.operator, Operator::And);
        assert_eq!(m.analyzer, AnalyzerRef::new("whitespace", AnalyzerSource::Explicit));
        assert_eq!(m.minimum_should_match, Some(Threshold::Percent(50.0)));
        assert_eq!(m.fuzziness, Some(Fuzziness::Auto));
        assert_eq!(m.boost, Some(3.0));
    }

    #[test]
    fn match_without_query() {
        let err = compile(json!({"match": {"body": {"operator": "and"}}})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parsing);
    }

    #[test]
    fn match_phrase_slop() {
        let Clause::MatchPhrase(p) =
            compile(json!({"match_phrase": {"summary": {"query": "red fox", "slop": 2}}})).unwrap()
        else {
            panic!("expected match_phrase");
        };
        assert_eq!(p.slop, 2);
        assert_eq!(p.analyzer.name, "french");

        let err = compile(json!({"match_phrase": {"summary": {"query": "a", "slop": -1}}}))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::IllegalArgument);
    }

    #[test]
    fn multi_match_builds_should_of_matches() {
        let clause = compile(json!({"multi_match": {
            "query": "rust",
            "fields": ["title", "body"],
            "operator": "and"
        }}))
        .unwrap();
        let Clause::Bool(b) = &clause else {
            panic!("expected bool");
        };
        assert_eq!(b.minimum_should_match, None);
        assert_eq!(b.boost, None);
        assert_eq!(b.multi_match_type, Some(MultiMatchType::BestFields));

        let matches = should_matches(&clause);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].field, "title");
        assert_eq!(matches[1].field, "body");
        assert!(matches.iter().all(|m| m.operator == Operator::And && m.query == "rust"));
    }

    #[test]
    fn multi_match_analyzer_is_sticky() {
        let clause =
            compile(json!({"multi_match": {"query": "rust", "fields": ["title", "body"]}})).unwrap();
        let matches = should_matches(&clause);
        assert_eq!(matches[0].analyzer, AnalyzerRef::new("english", AnalyzerSource::FieldSearch));
        assert_eq!(matches[1].analyzer, AnalyzerRef::new("english", AnalyzerSource::Inherited));
    }

    #[test]
    fn multi_match_keeps_own_mapping() {
        let clause = compile(json!({"multi_match": {
            "query": "rust",
            "fields": ["title", "summary", "body"]
        }}))
        .unwrap();
        let names: Vec<&str> = should_matches(&clause)
            .iter()
            .map(|m| m.analyzer.name.as_str())
            .collect();
        assert_eq!(names, vec!["english", "french", "english"]);
    }

    #[test]
    fn multi_match_field_boosts() {
        let clause = compile(json!({"multi_match": {
            "query": "rust",
            "fields": ["title^3", "body"]
        }}))
        .unwrap();
        let matches = should_matches(&clause);
        assert_eq!(matches[0].field, "title");
        assert_eq!(matches[0].boost, Some(3.0));
        assert_eq!(matches[1].boost, None);
    }

    #[test]
    fn multi_match_boost_handling() {
        let unset = compile(json!({"multi_match": {
            "query": "rust", "fields": ["body"], "boost": -1
        }}))
        .unwrap();
        assert_eq!(unset.boost(), None);

        let set = compile(json!({"multi_match": {
            "query": "rust", "fields": ["body"], "boost": 2.5
        }}))
        .unwrap();
        assert_eq!(set.boost(), Some(2.5));
    }

    #[test]
    fn multi_match_minimum_should_match_over_fields() {
        let clause = compile(json!({"multi_match": {
            "query": "rust",
            "fields": ["title", "body", "summary"],
            "minimum_should_match": "2"
        }}))
        .unwrap();
        let Clause::Bool(b) = clause else {
            panic!("expected bool");
        };
        assert_eq!(b.minimum_should_match, Some(2));
    }

    #[test]
    fn multi_match_errors() {
        let cases = [
            (json!({"fields": ["body"]}), ErrorKind::Parsing),
            (json!({"query": "rust"}), ErrorKind::Parsing),
            (json!({"query": "rust", "fields": []}), ErrorKind::Parsing),
            (json!({"query": 7, "fields": ["body"]}), ErrorKind::Parsing),
            (json!({"query": "rust", "fields": "body"}), ErrorKind::Parsing),
            (json!({"query": "rust", "fields": ["body"], "operator": "XOR"}), ErrorKind::IllegalArgument),
            (json!({"query": "rust", "fields": ["body"], "type": "fastest"}), ErrorKind::IllegalArgument),
            (json!({"query": "rust", "fields": ["body"], "minimum_should_match": "lots"}), ErrorKind::XContentParse),
            (json!({"query": "rust", "fields": ["body"], "minimum_should_match": 2}), ErrorKind::IllegalArgument),
            (json!({"query": "rust", "fields": ["body"], "analyzer": "klingon"}), ErrorKind::NotFound),
        ];
        for (body, kind) in cases {
            let err = compile(json!({ "multi_match": body.clone() })).unwrap_err();
            assert_eq!(err.kind, kind, "body {body}");
        }
    }

    #[test]
    fn multi_match_operator_message() {
        let err = compile(json!({"multi_match": {
            "query": "rust", "fields": ["body"], "operator": "xor"
        }}))
        .unwrap_err();
        assert_eq!(err.message, "[multi_match] unknown operator XOR");
    }

    #[test]
    fn split_field_boost_forms() {
        assert_eq!(split_field_boost("title").unwrap(), ("title", None));
        assert_eq!(split_field_boost("title^2").unwrap(), ("title", Some(2.0)));
        assert!(split_field_boost("title^x").is_err());
        assert!(split_field_boost("^2").is_err());
    }
}
