//! Path lexer using logos

use logos::{Logos, Skip};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a path token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Identifier,
    Number,
    Dot,
    End,
    Error,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Identifier => write!(f, "identifier"),
            TokenKind::Number => write!(f, "number"),
            TokenKind::Dot => write!(f, "'.'"),
            TokenKind::End => write!(f, "end of input"),
            TokenKind::Error => write!(f, "invalid character"),
        }
    }
}

/// A token with its source position (1-based line and column)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    /// Check the token kind
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

/// Line bookkeeping carried through the logos lexer
#[derive(Debug, Default, Clone, Copy)]
struct LineTracker {
    newlines: usize,
    line_start: usize,
}

fn newline(lex: &mut logos::Lexer<Lexeme>) -> Skip {
    lex.extras.newlines += 1;
    lex.extras.line_start = lex.span().end;
    Skip
}

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(extras = LineTracker)]
#[logos(skip r"[ \t\r]+")]
enum Lexeme {
    #[token("\n", newline)]
    Newline,

    #[token(".")]
    Dot,

    #[regex(r"[\p{L}_][\p{L}\p{Nd}_]*")]
    Identifier,

    #[regex(r"\p{Nd}+")]
    Number,
}

/// Incremental path lexer
///
/// Never fails: characters outside the path alphabet come back as
/// [`TokenKind::Error`] tokens, and once the input is exhausted every call
/// returns [`TokenKind::End`].
pub struct Lexer<'a> {
    source: &'a str,
    inner: logos::Lexer<'a, Lexeme>,
    finished: bool,
    end_emitted: bool,
}

impl<'a> Lexer<'a> {
    /// Create a lexer over `source`
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            inner: Lexeme::lexer(source),
            finished: false,
            end_emitted: false,
        }
    }

    /// Produce the next token
    pub fn next_token(&mut self) -> Token {
        if self.finished {
            return self.end_token();
        }

        match self.inner.next() {
            Some(Ok(lexeme)) => {
                let kind = match lexeme {
                    Lexeme::Dot => TokenKind::Dot,
                    Lexeme::Identifier => TokenKind::Identifier,
                    Lexeme::Number => TokenKind::Number,
                    // Newlines are skipped by their callback
                    Lexeme::Newline => unreachable!("newline tokens are skipped"),
                };
                self.token_at(kind, self.inner.slice().to_string(), self.inner.span().start)
            }
            Some(Err(())) => {
                let text = self
                    .inner
                    .slice()
                    .chars()
                    .next()
                    .map(String::from)
                    .unwrap_or_default();
                self.token_at(TokenKind::Error, text, self.inner.span().start)
            }
            None => {
                self.finished = true;
                self.end_token()
            }
        }
    }

    fn end_token(&self) -> Token {
        self.token_at(TokenKind::End, String::new(), self.source.len())
    }

    fn token_at(&self, kind: TokenKind, text: String, offset: usize) -> Token {
        let LineTracker {
            newlines,
            line_start,
        } = self.inner.extras;
        let column = self.source[line_start.min(offset)..offset].chars().count() + 1;
        Token {
            kind,
            text,
            line: newlines + 1,
            column,
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    /// Yields every token up to and including the first `End`
    fn next(&mut self) -> Option<Token> {
        if self.end_emitted {
            return None;
        }
        let token = self.next_token();
        if token.is(TokenKind::End) {
            self.end_emitted = true;
        }
        Some(token)
    }
}

/// Tokenize a path query, including the trailing `End` token
pub fn tokenize(input: &str) -> Vec<Token> {
    Lexer::new(input).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_basic_path() {
        let tokens = tokenize("a.b.2.c");
        assert_eq!(
            kinds("a.b.2.c"),
            vec![
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Number,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::End,
            ]
        );
        assert_eq!(tokens[4].text, "2");
        assert_eq!(tokens[6].text, "c");
    }

    #[test]
    fn test_identifiers() {
        let tokens = tokenize("_private.user_name2");
        assert!(tokens
            .iter()
            .any(|t| t.kind == TokenKind::Identifier && t.text == "_private"));
        assert!(tokens
            .iter()
            .any(|t| t.kind == TokenKind::Identifier && t.text == "user_name2"));
    }

    #[test]
    fn test_unicode_letters() {
        let tokens = tokenize("datos.año");
        assert_eq!(tokens[2].kind, TokenKind::Identifier);
        assert_eq!(tokens[2].text, "año");
    }

    #[test]
    fn test_digits_then_letters_split() {
        assert_eq!(
            kinds("12ab"),
            vec![TokenKind::Number, TokenKind::Identifier, TokenKind::End]
        );
    }

    #[test]
    fn test_error_token() {
        let tokens = tokenize("a.$b");
        assert_eq!(tokens[2].kind, TokenKind::Error);
        assert_eq!(tokens[2].text, "$");
        assert_eq!(tokens[2].column, 3);
        assert_eq!(tokens[3].kind, TokenKind::Identifier);
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("a .\n  bc");
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (1, 3));
        assert_eq!((tokens[2].line, tokens[2].column), (2, 3));
        assert_eq!(tokens[2].text, "bc");
        assert_eq!((tokens[3].line, tokens[3].column), (2, 5));
    }

    #[test]
    fn test_whitespace_only() {
        assert_eq!(kinds(" \t\r\n "), vec![TokenKind::End]);
        assert_eq!(kinds(""), vec![TokenKind::End]);
    }

    #[test]
    fn test_end_is_sticky() {
        let mut lexer = Lexer::new("a");
        assert_eq!(lexer.next_token().kind, TokenKind::Identifier);
        for _ in 0..3 {
            assert_eq!(lexer.next_token().kind, TokenKind::End);
        }
    }
}
