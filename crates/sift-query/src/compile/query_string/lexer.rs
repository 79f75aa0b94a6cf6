//! Query string lexer.
//!
//! Converts query string text into a stream of tokens for the parser.

use std::{iter::Peekable, str::Chars};

use crate::error::QueryError;

/// A token in the query string language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A bare word, possibly carrying `*`, `?` or a `~` suffix.
    Term(String),

    /// A quoted phrase (the quotes are stripped, content preserved).
    Phrase(String),

    /// `AND` or `&&`.
    And,

    /// `OR` or `||`.
    Or,

    /// `NOT`, `!` or a leading `-`.
    Not,

    /// Left parenthesis.
    LParen,

    /// Right parenthesis.
    RParen,

    /// Field prefix (e.g., "title:" produces FieldPrefix("title")).
    FieldPrefix(String),

    /// Boost operator with factor (e.g., "^2.5" produces Boost(2.5)).
    Boost(f32),
}

/// Tokenizes a query string.
struct Lexer<'a> {
    /// Character iterator with one-character lookahead.
    chars: Peekable<Chars<'a>>,
    /// Current byte position in input.
    position: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            position: 0,
        }
    }

    /// Creates an error at a specific position.
    fn error_at(message: &str, position: usize) -> QueryError {
        QueryError::parsing(format!("[query_string] {message} at position {position}"))
    }

    /// Tokenizes the entire input, returning all tokens or an error.
    fn tokenize(mut self) -> Result<Vec<Token>, QueryError> {
        let mut tokens = Vec::new();

        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }

        Ok(tokens)
    }

    /// Returns the next token, or None if at end of input.
    fn next_token(&mut self) -> Result<Option<Token>, QueryError> {
        self.skip_whitespace();

        let Some(&ch) = self.chars.peek() else {
            return Ok(None);
        };

        match ch {
            '"' => self.read_phrase(),
            '(' => {
                self.advance();
                Ok(Some(Token::LParen))
            }
            ')' => {
                self.advance();
                Ok(Some(Token::RParen))
            }
            '-' | '!' => {
                self.advance();
                Ok(Some(Token::Not))
            }
            '^' => self.read_boost(),
            _ => self.read_term_or_keyword(),
        }
    }

    /// Reads a quoted phrase. A backslash escapes the next character.
    fn read_phrase(&mut self) -> Result<Option<Token>, QueryError> {
        let start_pos = self.position;
        self.advance(); // consume opening quote

        let mut content = String::new();

        loop {
            match self.chars.peek() {
                Some(&'"') => {
                    self.advance(); // consume closing quote
                    return Ok(Some(Token::Phrase(content)));
                }
                Some(&'\\') => {
                    self.advance();
                    if let Some(&escaped) = self.chars.peek() {
                        content.push(escaped);
                        self.advance();
                    }
                }
                Some(&ch) => {
                    content.push(ch);
                    self.advance();
                }
                None => return Err(Self::error_at("unclosed quote", start_pos)),
            }
        }
    }

    /// Reads a term, keyword, or field prefix.
    fn read_term_or_keyword(&mut self) -> Result<Option<Token>, QueryError> {
        let mut word = String::new();

        while let Some(&ch) = self.chars.peek() {
            if ch.is_whitespace() || ch == '(' || ch == ')' || ch == '"' || ch == '^' {
                break;
            }

            // Check for field prefix (word ending in colon)
            if ch == ':' {
                self.advance(); // consume the colon
                if word.is_empty() {
                    continue;
                }
                return Ok(Some(Token::FieldPrefix(word)));
            }

            word.push(ch);
            self.advance();
        }

        if word.is_empty() {
            return Ok(None);
        }

        let token = match word.as_str() {
            "AND" | "&&" => Token::And,
            "OR" | "||" => Token::Or,
            "NOT" => Token::Not,
            _ => Token::Term(word),
        };
        Ok(Some(token))
    }

    /// Reads a boost operator (^N or ^N.N).
    fn read_boost(&mut self) -> Result<Option<Token>, QueryError> {
        let start_pos = self.position;
        self.advance(); // consume '^'

        let mut number = String::new();

        while let Some(&ch) = self.chars.peek() {
            if ch.is_ascii_digit() || (ch == '.' && !number.contains('.')) {
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if number.is_empty() {
            return Err(Self::error_at("expected number after '^'", start_pos));
        }

        match number.parse::<f32>() {
            Ok(factor) => Ok(Some(Token::Boost(factor))),
            Err(_) => Err(Self::error_at(
                &format!("invalid boost value {number}"),
                start_pos,
            )),
        }
    }

    /// Skips whitespace characters.
    fn skip_whitespace(&mut self) {
        while let Some(&ch) = self.chars.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Advances to the next character.
    fn advance(&mut self) {
        if let Some(ch) = self.chars.next() {
            self.position += ch.len_utf8();
        }
    }
}

/// Tokenizes a query string.
pub fn tokenize(input: &str) -> Result<Vec<Token>, QueryError> {
    Lexer::new(input).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(s: &str) -> Token {
        Token::Term(s.into())
    }

    #[test]
    fn empty_input() {
        assert_eq!(tokenize("   ").unwrap(), vec![]);
    }

    #[test]
    fn keywords_are_uppercase_only() {
        assert_eq!(
            tokenize("rust AND tantivy OR lucene").unwrap(),
            vec![term("rust"), Token::And, term("tantivy"), Token::Or, term("lucene")]
        );
        assert_eq!(
            tokenize("cats and dogs").unwrap(),
            vec![term("cats"), term("and"), term("dogs")]
        );
    }

    #[test]
    fn symbolic_operators() {
        assert_eq!(
            tokenize("a && b || !c").unwrap(),
            vec![term("a"), Token::And, term("b"), Token::Or, Token::Not, term("c")]
        );
    }

    #[test]
    fn not_keyword_and_dash() {
        assert_eq!(
            tokenize("NOT legacy -deprecated").unwrap(),
            vec![Token::Not, term("legacy"), Token::Not, term("deprecated")]
        );
    }

    #[test]
    fn inner_dash_stays_in_term() {
        assert_eq!(tokenize("e-mail").unwrap(), vec![term("e-mail")]);
    }

    #[test]
    fn wildcards_and_fuzzy_stay_in_term() {
        assert_eq!(
            tokenize("tan* t?ntivy roam~1").unwrap(),
            vec![term("tan*"), term("t?ntivy"), term("roam~1")]
        );
    }

    #[test]
    fn field_prefix_with_phrase_and_boost() {
        assert_eq!(
            tokenize("title:\"getting started\"^2").unwrap(),
            vec![
                Token::FieldPrefix("title".into()),
                Token::Phrase("getting started".into()),
                Token::Boost(2.0)
            ]
        );
    }

    #[test]
    fn escaped_quote_in_phrase() {
        assert_eq!(
            tokenize(r#""say \"hi\"""#).unwrap(),
            vec![Token::Phrase("say \"hi\"".into())]
        );
    }

    #[test]
    fn groups() {
        assert_eq!(
            tokenize("(a b)").unwrap(),
            vec![Token::LParen, term("a"), term("b"), Token::RParen]
        );
    }

    #[test]
    fn unclosed_quote() {
        let err = tokenize("rust \"error handling").unwrap_err();
        assert_eq!(err.message, "[query_string] unclosed quote at position 5");
    }

    #[test]
    fn boost_without_number() {
        let err = tokenize("rust^").unwrap_err();
        assert!(err.message.contains("expected number"));
    }
}
