//! The `bool` clause.

use log::debug;
use serde_json::Value;

use super::CompileContext;
use crate::{
    clause::{BoolClause, Clause, Occur},
    error::QueryError,
    threshold::{self, Threshold},
    value,
};

/// Compiles `{must, should, must_not, filter, minimum_should_match, boost}`.
///
/// Each occurrence accepts one clause object or an array of them. Children keep input order
/// across all four groups.
pub fn compile_bool(ctx: &mut CompileContext<'_>, body: &Value) -> Result<Clause, QueryError> {
    let obj = value::as_object(body, "bool")?;
    let mut clause = BoolClause::default();
    let mut minimum_should_match = None;

    for (key, v) in obj {
        match key.to_lowercase().as_str() {
            "must" => push_children(ctx, &mut clause, Occur::Must, v)?,
            "should" => push_children(ctx, &mut clause, Occur::Should, v)?,
            "must_not" => push_children(ctx, &mut clause, Occur::MustNot, v)?,
            "filter" => push_children(ctx, &mut clause, Occur::Filter, v)?,
            "minimum_should_match" => {
                minimum_should_match =
                    Some(Threshold::parse(v).map_err(value::in_clause("bool"))?);
            }
            "boost" => clause.boost = value::boost(v, "bool")?,
            other => debug!("[bool] ignoring unknown key [{other}]"),
        }
    }

    if let Some(threshold) = minimum_should_match {
        let should = clause.should_count();
        clause.minimum_should_match = Some(
            threshold::compute(should, &threshold).map_err(value::in_clause("bool"))?,
        );
    }

    Ok(Clause::Bool(clause))
}

/// Compiles one occurrence group into `clause`.
fn push_children(
    ctx: &mut CompileContext<'_>,
    clause: &mut BoolClause,
    occur: Occur,
    v: &Value,
) -> Result<(), QueryError> {
    match v {
        Value::Object(_) => {
            let child = ctx.compile(v)?;
            clause.push(occur, child);
        }
        Value::Array(items) => {
            for item in items {
                let child = ctx.compile(item)?;
                clause.push(occur, child);
            }
        }
        _ => {
            return Err(QueryError::parsing(format!(
                "[bool] {} should be an object or an array",
                occur.as_str()
            )));
        }
    }
    Ok(())
}
