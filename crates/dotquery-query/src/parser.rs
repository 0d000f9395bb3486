//! Path parser
//!
//! Grammar:
//!
//! ```text
//! Path := Identifier ('.' (Identifier | Number))* End
//! ```
//!
//! The first segment must name a field; later segments may also be numeric
//! array indices.

use crate::lexer::{Lexer, Token, TokenKind};
use dotquery_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An ordered, non-empty sequence of path segments
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// Build a path from raw segments
    ///
    /// Rejects an empty segment list and empty segments. Segments built this
    /// way may contain characters the lexer would never produce; the planner
    /// takes that into account.
    pub fn new<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(Error::Internal("path must have at least one segment".to_string()));
        }
        if segments.iter().any(String::is_empty) {
            return Err(Error::Internal("path segments must not be empty".to_string()));
        }
        Ok(Self { segments })
    }

    /// Segments in traversal order
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Consume into the segment list
    pub fn into_segments(self) -> Vec<String> {
        self.segments
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Parse a path query string
pub fn parse_query(query: &str) -> Result<Path> {
    let mut parser = Parser::new(query);
    parser.parse_query()
}

/// Recursive descent parser with one token of lookahead
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    peek: Token,
    errors: Vec<String>,
}

impl<'a> Parser<'a> {
    /// Create a parser over `query`
    pub fn new(query: &'a str) -> Self {
        let mut lexer = Lexer::new(query);
        let current = lexer.next_token();
        let peek = lexer.next_token();
        Self {
            lexer,
            current,
            peek,
            errors: Vec::new(),
        }
    }

    /// Diagnostics recorded so far
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Parse the whole input as a path, stopping at the first error
    pub fn parse_query(&mut self) -> Result<Path> {
        if !self.current.is(TokenKind::Identifier) {
            let token = self.current.clone();
            return Err(self.unexpected("identifier", &token));
        }

        let mut segments = vec![self.current.text.clone()];

        while self.peek.is(TokenKind::Dot) {
            self.advance();

            if !self.peek.is(TokenKind::Identifier) && !self.peek.is(TokenKind::Number) {
                let token = self.peek.clone();
                return Err(self.unexpected("identifier or number after '.'", &token));
            }

            self.advance();
            segments.push(self.current.text.clone());
        }

        if !self.peek.is(TokenKind::End) {
            let token = self.peek.clone();
            return Err(self.unexpected("end of input", &token));
        }

        Ok(Path { segments })
    }

    fn advance(&mut self) {
        let next = self.lexer.next_token();
        self.current = std::mem::replace(&mut self.peek, next);
    }

    fn unexpected(&mut self, expected: &str, token: &Token) -> Error {
        let error = if token.is(TokenKind::Error) {
            Error::Lexical {
                character: token.text.clone(),
                line: token.line,
                column: token.column,
            }
        } else {
            Error::UnexpectedToken {
                expected: expected.to_string(),
                found: describe(token),
                line: token.line,
                column: token.column,
            }
        };
        self.errors.push(error.to_string());
        error
    }
}

fn describe(token: &Token) -> String {
    match token.kind {
        TokenKind::Identifier | TokenKind::Number => format!("{} '{}'", token.kind, token.text),
        _ => token.kind.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dotquery_core::ErrorKind;

    #[test]
    fn test_single_segment() {
        let path = parse_query("a").unwrap();
        assert_eq!(path.segments(), &["a".to_string()]);
        assert_eq!(path.len(), 1);
    }

    #[test]
    fn test_mixed_segments() {
        let path = parse_query("a.b.2.c").unwrap();
        assert_eq!(path.segments(), &["a", "b", "2", "c"]);
        assert_eq!(path.to_string(), "a.b.2.c");
    }

    #[test]
    fn test_whitespace_between_tokens() {
        let path = parse_query(" x . 0 .\n y ").unwrap();
        assert_eq!(path.into_segments(), vec!["x", "0", "y"]);
    }

    #[test]
    fn test_empty_query() {
        let err = parse_query("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert_eq!(
            err,
            Error::UnexpectedToken {
                expected: "identifier".to_string(),
                found: "end of input".to_string(),
                line: 1,
                column: 1,
            }
        );
    }

    #[test]
    fn test_leading_dot() {
        let err = parse_query(".a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert!(err.to_string().contains("found '.'"));
    }

    #[test]
    fn test_leading_number() {
        let err = parse_query("0.a").unwrap_err();
        assert!(matches!(err, Error::UnexpectedToken { ref found, .. } if found == "number '0'"));
    }

    #[test]
    fn test_missing_segment_after_dot() {
        let err = parse_query("a..b").unwrap_err();
        assert_eq!(
            err,
            Error::UnexpectedToken {
                expected: "identifier or number after '.'".to_string(),
                found: "'.'".to_string(),
                line: 1,
                column: 3,
            }
        );
        assert!(parse_query("a.").is_err());
    }

    #[test]
    fn test_trailing_input() {
        let err = parse_query("a.b c").unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedToken { ref expected, column: 5, .. } if expected == "end of input"
        ));
    }

    #[test]
    fn test_lexical_error() {
        let err = parse_query("a.b#").unwrap_err();
        assert_eq!(
            err,
            Error::Lexical {
                character: "#".to_string(),
                line: 1,
                column: 4,
            }
        );
        assert_eq!(err.kind(), ErrorKind::Lexical);
    }

    #[test]
    fn test_errors_accessor_records_first_failure() {
        let mut parser = Parser::new("a.");
        assert!(parser.parse_query().is_err());
        assert_eq!(parser.errors().len(), 1);
        assert!(parser.errors()[0].contains("line 1, column 3"));
    }

    #[test]
    fn test_path_new_validation() {
        assert!(Path::new(Vec::<String>::new()).is_err());
        assert!(Path::new(["a", ""]).is_err());
        assert_eq!(Path::new(["a", "b.c"]).unwrap().len(), 2);
    }
}
