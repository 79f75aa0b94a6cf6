//! Exact-value clauses: `term`, `terms`, `prefix`, `wildcard`, `fuzzy`, plus `match_all` and
//! `match_none`.

use log::debug;
use serde_json::Value;

use super::CompileContext;
use crate::{
    clause::{Clause, Fuzziness, FuzzyClause, PatternClause, TermClause, TermValue, TermsClause},
    error::QueryError,
    value,
};

/// Decodes an exact value.
fn term_value(v: &Value, ctx: &str) -> Result<TermValue, QueryError> {
    match v {
        Value::String(s) => Ok(TermValue::Text(s.clone())),
        Value::Bool(b) => Ok(TermValue::Bool(*b)),
        Value::Number(n) => Ok(match n.as_i64() {
            Some(i) => TermValue::Integer(i),
            None => TermValue::Float(n.as_f64().unwrap_or_default()),
        }),
        _ => Err(QueryError::parsing(format!(
            "[{ctx}] value should be a string, number or boolean"
        ))),
    }
}

/// Decodes `{field: value}` or `{field: {value, boost}}`, returning the field, the raw value and
/// the options object when present.
fn field_value<'a>(
    body: &'a Value,
    ctx: &str,
) -> Result<(&'a str, &'a Value, Option<f32>, Option<&'a value::Object>), QueryError> {
    let (field, spec) = value::single_field(body, ctx)?;
    let Value::Object(obj) = spec else {
        return Ok((field, spec, None, None));
    };

    let mut raw = None;
    let mut boost = None;
    for (key, v) in obj {
        match key.to_lowercase().as_str() {
            "value" => raw = Some(v),
            "boost" => boost = value::boost(v, ctx)?,
            _ => {}
        }
    }
    let raw = raw.ok_or_else(|| QueryError::parsing(format!("[{ctx}] value is required")))?;
    Ok((field, raw, boost, Some(obj)))
}

/// Compiles `{field: value}` or `{field: {value, boost}}`.
pub fn compile_term(_ctx: &mut CompileContext<'_>, body: &Value) -> Result<Clause, QueryError> {
    let (field, raw, boost, _) = field_value(body, "term")?;
    Ok(Clause::Term(TermClause {
        field: field.to_string(),
        value: term_value(raw, "term")?,
        boost,
    }))
}

/// Compiles `{field: [values], boost}`.
pub fn compile_terms(_ctx: &mut CompileContext<'_>, body: &Value) -> Result<Clause, QueryError> {
    let obj = value::as_object(body, "terms")?;

    let mut target: Option<(&str, &Vec<Value>)> = None;
    let mut boost = None;
    for (key, v) in obj {
        if key.eq_ignore_ascii_case("boost") {
            boost = value::boost(v, "terms")?;
            continue;
        }
        if target.is_some() {
            return Err(QueryError::parsing(
                "[terms] query doesn't support multiple fields",
            ));
        }
        let values = v
            .as_array()
            .ok_or_else(|| QueryError::parsing(format!("[terms] values of [{key}] should be an array")))?;
        target = Some((key.as_str(), values));
    }

    let (field, values) =
        target.ok_or_else(|| QueryError::parsing("[terms] query malformed, no field specified"))?;
    let values = values
        .iter()
        .map(|v| term_value(v, "terms"))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Clause::Terms(TermsClause {
        field: field.to_string(),
        values,
        boost,
    }))
}

/// Compiles `{field: prefix}` or `{field: {value, boost}}`.
pub fn compile_prefix(_ctx: &mut CompileContext<'_>, body: &Value) -> Result<Clause, QueryError> {
    Ok(Clause::Prefix(pattern(body, "prefix")?))
}

/// Compiles `{field: pattern}` or `{field: {value, boost}}`.
pub fn compile_wildcard(
    _ctx: &mut CompileContext<'_>,
    body: &Value,
) -> Result<Clause, QueryError> {
    Ok(Clause::Wildcard(pattern(body, "wildcard")?))
}

/// Shared decoding of prefix and wildcard clauses.
fn pattern(body: &Value, ctx: &str) -> Result<PatternClause, QueryError> {
    let (field, raw, boost, _) = field_value(body, ctx)?;
    Ok(PatternClause {
        field: field.to_string(),
        value: value::as_str(raw, ctx, "value")?.to_string(),
        boost,
    })
}

/// Compiles `{field: value}` or `{field: {value, fuzziness, transpositions, boost}}`.
pub fn compile_fuzzy(_ctx: &mut CompileContext<'_>, body: &Value) -> Result<Clause, QueryError> {
    let (field, raw, boost, options) = field_value(body, "fuzzy")?;

    let mut fuzziness = Fuzziness::Auto;
    let mut transpositions = true;
    for (key, v) in options.into_iter().flatten() {
        match key.to_lowercase().as_str() {
            "fuzziness" => fuzziness = Fuzziness::parse(v, "fuzzy")?,
            "transpositions" => transpositions = value::as_bool(v, "fuzzy", "transpositions")?,
            "value" | "boost" => {}
            other => debug!("[fuzzy] ignoring unknown key [{other}]"),
        }
    }

    Ok(Clause::Fuzzy(FuzzyClause {
        field: field.to_string(),
        value: value::scalar_text(raw, "fuzzy", "value")?,
        fuzziness,
        transpositions,
        boost,
    }))
}

/// Compiles `{boost}`.
pub fn compile_match_all(
    _ctx: &mut CompileContext<'_>,
    body: &Value,
) -> Result<Clause, QueryError> {
    let obj = value::as_object(body, "match_all")?;
    let mut boost = None;
    for (key, v) in obj {
        if key.eq_ignore_ascii_case("boost") {
            boost = value::boost(v, "match_all")?;
        }
    }
    Ok(Clause::MatchAll { boost })
}

/// Compiles `{}`. Any keys are ignored.
pub fn compile_match_none(
    _ctx: &mut CompileContext<'_>,
    body: &Value,
) -> Result<Clause, QueryError> {
    value::as_object(body, "match_none")?;
    Ok(Clause::MatchNone)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde_json::json;
    use sift_config::SearchSettings;

    use super::*;
    use crate::{ErrorKind, compile::ClauseRegistry, mapping::Mappings};

    fn compile(query: Value) -> Result<Clause, QueryError> {
        let registry = ClauseRegistry::standard();
        let mappings = Mappings::new();
        let catalog: HashSet<String> = HashSet::new();
        let settings = SearchSettings::default();
        CompileContext::new(&registry, &mappings, &catalog, &settings).compile(&query)
    }

    #[test]
    fn term_forms() {
        assert_eq!(
            compile(json!({"term": {"status": "published"}})).unwrap(),
            Clause::Term(TermClause {
                field: "status".into(),
                value: TermValue::Text("published".into()),
                boost: None,
            })
        );
        assert_eq!(
            compile(json!({"term": {"views": {"value": 42, "boost": 2}}})).unwrap(),
            Clause::Term(TermClause {
                field: "views".into(),
                value: TermValue::Integer(42),
                boost: Some(2.0),
            })
        );
    }

    #[test]
    fn term_rejects_compound_values() {
        let err = compile(json!({"term": {"status": [1, 2]}})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parsing);
        let err = compile(json!({"term": {"status": {"boost": 2}}})).unwrap_err();
        assert_eq!(err.message, "[term] value is required");
    }

    #[test]
    fn terms_with_boost() {
        let Clause::Terms(t) =
            compile(json!({"terms": {"tag": ["rust", 7, true], "boost": 1.5}})).unwrap()
        else {
            panic!("expected terms");
        };
        assert_eq!(t.field, "tag");
        assert_eq!(
            t.values,
            vec![
                TermValue::Text("rust".into()),
                TermValue::Integer(7),
                TermValue::Bool(true)
            ]
        );
        assert_eq!(t.boost, Some(1.5));
    }

    #[test]
    fn terms_errors() {
        assert_eq!(
            compile(json!({"terms": {"tag": "rust"}})).unwrap_err().kind,
            ErrorKind::Parsing
        );
        assert_eq!(
            compile(json!({"terms": {"a": [], "b": []}})).unwrap_err().kind,
            ErrorKind::Parsing
        );
        assert_eq!(
            compile(json!({"terms": {"boost": 2}})).unwrap_err().kind,
            ErrorKind::Parsing
        );
    }

    #[test]
    fn prefix_and_wildcard() {
        assert_eq!(
            compile(json!({"prefix": {"name": "tan"}})).unwrap(),
            Clause::Prefix(PatternClause {
                field: "name".into(),
                value: "tan".into(),
                boost: None,
            })
        );
        assert_eq!(
            compile(json!({"wildcard": {"name": {"value": "ta?t*", "boost": 0}}})).unwrap(),
            Clause::Wildcard(PatternClause {
                field: "name".into(),
                value: "ta?t*".into(),
                boost: Some(0.0),
            })
        );
    }

    #[test]
    fn fuzzy_options() {
        let Clause::Fuzzy(f) = compile(json!({"fuzzy": {"name": {
            "value": "tantivi",
            "fuzziness": 1,
            "transpositions": false
        }}}))
        .unwrap() else {
            panic!("expected fuzzy");
        };
        assert_eq!(f.fuzziness, Fuzziness::Fixed(1));
        assert!(!f.transpositions);

        let Clause::Fuzzy(f) = compile(json!({"fuzzy": {"name": "tantivi"}})).unwrap() else {
            panic!("expected fuzzy");
        };
        assert_eq!(f.fuzziness, Fuzziness::Auto);
        assert!(f.transpositions);
    }

    #[test]
    fn match_all_and_none() {
        assert_eq!(
            compile(json!({"match_all": {}})).unwrap(),
            Clause::MatchAll { boost: None }
        );
        assert_eq!(
            compile(json!({"match_all": {"boost": 1.2}})).unwrap(),
            Clause::MatchAll { boost: Some(1.2) }
        );
        assert_eq!(compile(json!({"match_none": {}})).unwrap(), Clause::MatchNone);
        assert_eq!(
            compile(json!({"match_all": []})).unwrap_err().kind,
            ErrorKind::Parsing
        );
    }
}
