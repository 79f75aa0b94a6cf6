//! Query string parser.
//!
//! Parses a token stream into an [`Expr`] using recursive descent.
//!
//! # Grammar
//!
//! ```text
//! query      → or_expr
//! or_expr    → seq ("OR" seq)*
//! seq        → and_expr+                 (joined by the default operator)
//! and_expr   → unary ("AND" unary)*
//! unary      → "NOT" unary | primary
//! primary    → (TERM | PHRASE | field_expr | "(" or_expr ")") BOOST?
//! field_expr → FIELD_PREFIX (TERM | PHRASE | "(" or_expr ")")
//! ```
//!
//! Explicit `AND` binds tighter than adjacency, which binds tighter than `OR`.

use std::mem;

use super::{
    ast::Expr,
    lexer::{Token, tokenize},
};
use crate::{clause::Operator, error::QueryError};

/// Recursive descent parser for query string expressions.
struct Parser {
    /// Token stream to parse.
    tokens: Vec<Token>,
    /// Current position in token stream.
    position: usize,
    /// How adjacent expressions combine.
    default_operator: Operator,
    /// Current group and negation nesting.
    depth: usize,
    /// Deepest nesting accepted.
    max_depth: usize,
}

impl Parser {
    /// Creates a new parser from a token stream.
    fn new(tokens: Vec<Token>, default_operator: Operator, max_depth: usize) -> Self {
        Self {
            tokens,
            position: 0,
            default_operator,
            depth: 0,
            max_depth,
        }
    }

    /// Enters one level of nesting.
    fn descend(&mut self) -> Result<(), QueryError> {
        if self.depth >= self.max_depth {
            return Err(self.error(&format!(
                "nesting exceeds the maximum depth of {}",
                self.max_depth
            )));
        }
        self.depth += 1;
        Ok(())
    }

    /// Creates an error at the current token.
    fn error(&self, message: &str) -> QueryError {
        QueryError::parsing(format!(
            "[query_string] {message} at token {}",
            self.position
        ))
    }

    /// Parses the token stream into an expression.
    fn parse(mut self) -> Result<Option<Expr>, QueryError> {
        if self.tokens.is_empty() {
            return Ok(None);
        }

        let expr = self.parse_or_expr()?;

        if let Some(token) = self.peek() {
            return Err(self.error(&format!("unexpected token {token:?}")));
        }

        Ok(Some(expr))
    }

    /// Parses: or_expr → seq ("OR" seq)*
    fn parse_or_expr(&mut self) -> Result<Expr, QueryError> {
        let mut exprs = vec![self.parse_seq()?];

        while self.check(&Token::Or) {
            self.advance(); // consume OR
            exprs.push(self.parse_seq()?);
        }

        Ok(Expr::or(exprs))
    }

    /// Parses: seq → and_expr+
    fn parse_seq(&mut self) -> Result<Expr, QueryError> {
        let mut exprs = vec![self.parse_and_expr()?];

        while self.can_start_unary() {
            exprs.push(self.parse_and_expr()?);
        }

        Ok(match self.default_operator {
            Operator::And => Expr::and(exprs),
            Operator::Or => Expr::or(exprs),
        })
    }

    /// Parses: and_expr → unary ("AND" unary)*
    fn parse_and_expr(&mut self) -> Result<Expr, QueryError> {
        let mut exprs = vec![self.parse_unary()?];

        while self.check(&Token::And) {
            self.advance(); // consume AND
            exprs.push(self.parse_unary()?);
        }

        Ok(Expr::and(exprs))
    }

    /// Checks if the current token can start a unary expression.
    fn can_start_unary(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Term(_))
                | Some(Token::Phrase(_))
                | Some(Token::Not)
                | Some(Token::LParen)
                | Some(Token::FieldPrefix(_))
        )
    }

    /// Parses: unary → "NOT" unary | primary
    fn parse_unary(&mut self) -> Result<Expr, QueryError> {
        if self.check(&Token::Not) {
            self.advance(); // consume NOT
            self.descend()?;
            let expr = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(expr)));
        }

        self.parse_primary()
    }

    /// Parses a primary expression and an optional boost suffix.
    fn parse_primary(&mut self) -> Result<Expr, QueryError> {
        let expr = match self.peek().cloned() {
            Some(Token::Term(_) | Token::Phrase(_)) => self.parse_term_or_phrase()?,
            Some(Token::FieldPrefix(name)) => {
                self.advance();
                self.parse_field_expr(name)?
            }
            Some(Token::LParen) => self.parse_group()?,
            Some(Token::RParen) => return Err(self.error("unexpected closing parenthesis")),
            Some(Token::Or | Token::And) => {
                return Err(self.error("operator needs an expression before it"));
            }
            Some(Token::Not) => return Err(self.error("unexpected negation")),
            Some(Token::Boost(_)) => {
                return Err(self.error("boost needs an expression before it"));
            }
            None => return Err(self.error("unexpected end of query")),
        };

        if let Some(Token::Boost(factor)) = self.peek().cloned() {
            self.advance();
            return Ok(Expr::Boost {
                expr: Box::new(expr),
                factor,
            });
        }
        Ok(expr)
    }

    /// Parses the expression after a field prefix.
    fn parse_field_expr(&mut self, name: String) -> Result<Expr, QueryError> {
        let expr = match self.peek() {
            Some(Token::Term(_) | Token::Phrase(_)) => self.parse_term_or_phrase()?,
            Some(Token::LParen) => self.parse_group()?,
            _ => {
                return Err(self.error(&format!(
                    "expected term, phrase, or group after '{name}:'"
                )));
            }
        };

        Ok(Expr::Field {
            name,
            expr: Box::new(expr),
        })
    }

    /// Parses a TERM or PHRASE token, consuming it.
    fn parse_term_or_phrase(&mut self) -> Result<Expr, QueryError> {
        let expr = match self.peek() {
            Some(Token::Term(text)) => Expr::Term(text.clone()),
            Some(Token::Phrase(text)) => Expr::Phrase(text.clone()),
            _ => return Err(self.error("expected term or phrase")),
        };
        self.advance();
        Ok(expr)
    }

    /// Parses a parenthesized group, consuming the surrounding parentheses.
    fn parse_group(&mut self) -> Result<Expr, QueryError> {
        self.advance(); // consume (
        self.descend()?;
        let inner = self.parse_or_expr()?;
        self.depth -= 1;

        if !self.check(&Token::RParen) {
            return Err(self.error("expected closing parenthesis"));
        }
        self.advance(); // consume )

        Ok(inner)
    }

    /// Returns the current token without consuming it.
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    /// Checks if the current token has the same variant as `token`.
    fn check(&self, token: &Token) -> bool {
        self.peek()
            .is_some_and(|t| mem::discriminant(t) == mem::discriminant(token))
    }

    /// Advances to the next token.
    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }
}

/// Parses query string text.
///
/// Returns `Ok(None)` for blank input. Groups and negations nested deeper than `max_depth`
/// fail with a parsing error.
pub fn parse(
    input: &str,
    default_operator: Operator,
    max_depth: usize,
) -> Result<Option<Expr>, QueryError> {
    let tokens = tokenize(input)?;
    Parser::new(tokens, default_operator, max_depth).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn term(s: &str) -> Expr {
        Expr::Term(s.into())
    }

    fn not(e: Expr) -> Expr {
        Expr::Not(Box::new(e))
    }

    fn field(name: &str, e: Expr) -> Expr {
        Expr::Field {
            name: name.into(),
            expr: Box::new(e),
        }
    }

    const MAX_DEPTH: usize = 20;

    fn parse_or(input: &str) -> Expr {
        parse(input, Operator::Or, MAX_DEPTH).unwrap().unwrap()
    }

    #[test]
    fn blank_query() {
        assert_eq!(parse("  ", Operator::Or, MAX_DEPTH).unwrap(), None);
    }

    #[test]
    fn adjacency_uses_default_operator() {
        assert_eq!(parse_or("rust search"), Expr::Or(vec![term("rust"), term("search")]));
        assert_eq!(
            parse("rust search", Operator::And, MAX_DEPTH).unwrap().unwrap(),
            Expr::And(vec![term("rust"), term("search")])
        );
    }

    #[test]
    fn and_binds_tighter_than_adjacency() {
        assert_eq!(
            parse_or("a b AND c"),
            Expr::Or(vec![term("a"), Expr::And(vec![term("b"), term("c")])])
        );
    }

    #[test]
    fn or_is_loosest() {
        assert_eq!(
            parse("a b OR c", Operator::And, MAX_DEPTH).unwrap().unwrap(),
            Expr::Or(vec![Expr::And(vec![term("a"), term("b")]), term("c")])
        );
    }

    #[test]
    fn negation_and_fields() {
        assert_eq!(
            parse_or("title:rust -body:legacy"),
            Expr::Or(vec![
                field("title", term("rust")),
                not(field("body", term("legacy")))
            ])
        );
    }

    #[test]
    fn field_group_with_boost() {
        assert_eq!(
            parse_or("title:(rust OR tantivy)^2"),
            Expr::Boost {
                expr: Box::new(field("title", Expr::Or(vec![term("rust"), term("tantivy")]))),
                factor: 2.0,
            }
        );
    }

    #[test]
    fn phrase() {
        assert_eq!(parse_or("\"red fox\""), Expr::Phrase("red fox".into()));
    }

    #[test]
    fn errors() {
        for bad in ["(rust", "rust)", "OR rust", "rust AND", "title:", "^2"] {
            let err = parse(bad, Operator::Or, MAX_DEPTH).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Parsing, "input {bad}");
        }
    }

    #[test]
    fn nesting_is_bounded() {
        let nested = format!("{}rust{}", "(".repeat(5000), ")".repeat(5000));
        let err = parse(&nested, Operator::Or, MAX_DEPTH).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parsing);
        assert!(err.message.contains("maximum depth"), "{}", err.message);

        let negated = format!("{}rust", "NOT ".repeat(5000));
        let err = parse(&negated, Operator::Or, MAX_DEPTH).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parsing);

        let shallow = format!("{}rust{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert_eq!(parse_or(&shallow), term("rust"));
        assert!(parse(&format!("(({}rust))", "NOT ".repeat(3)), Operator::Or, 4).is_err());
    }
}
