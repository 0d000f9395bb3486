//! Error types for dotquery
//!
//! Every failure a query can hit is one of these variants. The engine
//! converts them into result values at the API boundary, so none of them is
//! ever fatal to the process.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for dotquery operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // ========== Query Text Errors ==========
    #[error("Lexical error: unexpected character '{character}' at line {line}, column {column}")]
    Lexical {
        character: String,
        line: usize,
        column: usize,
    },

    #[error("Syntax error: expected {expected}, found {found} at line {line}, column {column}")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
        column: usize,
    },

    // ========== Navigation Errors ==========
    #[error("No value found for segment: {target}")]
    NotFound { target: String },

    // ========== Document Errors ==========
    #[error("Document parse error: {0}")]
    TreeParse(String),

    #[error("Unknown tree provider: {0}")]
    UnknownProvider(String),

    // ========== Configuration Errors ==========
    #[error("Invalid optimization level: {0} (expected 0, 1 or 2)")]
    InvalidOptimizationLevel(u8),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // ========== IO Errors ==========
    #[error("IO error: {0}")]
    Io(String),

    // ========== Internal Errors ==========
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for dotquery operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], reported alongside failed queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unrecognized character in the query text
    Lexical,
    /// Malformed path
    Syntax,
    /// Path does not exist in the tree
    Navigation,
    /// The document text could not be turned into a tree
    Document,
    /// Anything else
    Internal,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Lexical { .. } => ErrorKind::Lexical,
            Error::UnexpectedToken { .. } => ErrorKind::Syntax,
            Error::NotFound { .. } => ErrorKind::Navigation,
            Error::TreeParse(_) | Error::UnknownProvider(_) => ErrorKind::Document,
            Error::InvalidOptimizationLevel(_)
            | Error::Configuration(_)
            | Error::Io(_)
            | Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if this error was raised while compiling the query text
    pub fn is_compile_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Lexical | ErrorKind::Syntax)
    }

    /// Returns true if the same query may succeed against a different tree
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::TreeParse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound {
            target: "b".to_string(),
        };
        assert_eq!(err.to_string(), "No value found for segment: b");

        let err = Error::UnexpectedToken {
            expected: "identifier".to_string(),
            found: "dot".to_string(),
            line: 1,
            column: 1,
        };
        assert_eq!(
            err.to_string(),
            "Syntax error: expected identifier, found dot at line 1, column 1"
        );
    }

    #[test]
    fn test_error_kind() {
        let lexical = Error::Lexical {
            character: "$".to_string(),
            line: 1,
            column: 3,
        };
        assert_eq!(lexical.kind(), ErrorKind::Lexical);
        assert!(lexical.is_compile_error());

        assert_eq!(Error::TreeParse("eof".into()).kind(), ErrorKind::Document);
        assert_eq!(Error::Internal("x".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_error_recoverable() {
        assert!(Error::NotFound { target: "a".into() }.is_recoverable());
        assert!(!Error::TreeParse("bad".into()).is_recoverable());
    }

    #[test]
    fn test_from_serde_json() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Document);
    }
}
