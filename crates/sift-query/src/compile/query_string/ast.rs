//! Query string syntax tree.

/// A parsed query string expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A single word, possibly with wildcards or a fuzzy suffix.
    Term(String),

    /// Quoted text, matched as a phrase.
    Phrase(String),

    /// Negation: results must NOT match this expression.
    Not(Box<Self>),

    /// Conjunction: all sub-expressions must match.
    And(Vec<Self>),

    /// Disjunction: at least one sub-expression must match.
    Or(Vec<Self>),

    /// Field-scoped expression.
    Field {
        /// Field name.
        name: String,
        /// Expression to match within that field.
        expr: Box<Self>,
    },

    /// Boosted expression.
    Boost {
        /// The expression to boost.
        expr: Box<Self>,
        /// The boost factor.
        factor: f32,
    },
}

impl Expr {
    /// Creates an And expression, flattening nested Ands.
    pub fn and(exprs: Vec<Self>) -> Self {
        Self::flatten(exprs, true)
    }

    /// Creates an Or expression, flattening nested Ors.
    pub fn or(exprs: Vec<Self>) -> Self {
        Self::flatten(exprs, false)
    }

    /// Shared flattening for [`Self::and`] and [`Self::or`].
    fn flatten(exprs: Vec<Self>, conjunction: bool) -> Self {
        let mut flattened: Vec<Self> = Vec::with_capacity(exprs.len());
        for expr in exprs {
            match expr {
                Self::And(inner) if conjunction => flattened.extend(inner),
                Self::Or(inner) if !conjunction => flattened.extend(inner),
                other => flattened.push(other),
            }
        }

        if flattened.len() == 1
            && let Some(single) = flattened.pop()
        {
            return single;
        }
        if conjunction {
            Self::And(flattened)
        } else {
            Self::Or(flattened)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(s: &str) -> Expr {
        Expr::Term(s.into())
    }

    #[test]
    fn and_flattens_nested() {
        let nested = Expr::and(vec![term("a"), Expr::And(vec![term("b"), term("c")])]);
        assert_eq!(nested, Expr::And(vec![term("a"), term("b"), term("c")]));
    }

    #[test]
    fn or_keeps_nested_and() {
        let mixed = Expr::or(vec![term("a"), Expr::And(vec![term("b"), term("c")])]);
        assert_eq!(
            mixed,
            Expr::Or(vec![term("a"), Expr::And(vec![term("b"), term("c")])])
        );
    }

    #[test]
    fn single_element_unwraps() {
        assert_eq!(Expr::or(vec![term("a")]), term("a"));
        assert_eq!(Expr::and(vec![term("a")]), term("a"));
    }
}
