//! Compile error taxonomy.
//!
//! Every component fails fast with a typed error carrying its source
//! position; the top-level compile surfaces the first one. User-visible
//! messages follow `<file>:<line>:<col>: <kind>: <detail>`.

use thiserror::Error;

/// A position in a source file: 1-based line and column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePos {
    pub file: String,
    pub line: u32,
    pub col: u32,
}

impl SourcePos {
    pub fn new(file: impl Into<String>, line: u32, col: u32) -> SourcePos {
        SourcePos {
            file: file.into(),
            line,
            col,
        }
    }
}

impl std::fmt::Display for SourcePos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{file}: I/O error: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{pos}: lex error: {kind}")]
    Lex { pos: SourcePos, kind: LexErrorKind },

    #[error("{pos}: syntax error: {message}")]
    Syntax { pos: SourcePos, message: String },

    #[error("{pos}: type error: {message}")]
    Type { pos: SourcePos, message: String },

    #[error("{pos}: semantic error: {kind}")]
    Semantic {
        pos: SourcePos,
        kind: SemanticErrorKind,
    },

    #[error("{pos}: codegen error: {message}")]
    Codegen { pos: SourcePos, message: String },

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexErrorKind {
    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("unterminated block comment")]
    UnterminatedComment,

    #[error("unterminated character literal")]
    UnterminatedChar,

    #[error("malformed number")]
    MalformedNumber,

    #[error("invalid escape sequence '\\{0}'")]
    InvalidEscape(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticErrorKind {
    #[error("undefined identifier '{0}'")]
    Undefined(String),

    #[error("undefined label '{0}'")]
    UndefinedLabel(String),

    #[error("redefinition of '{0}'")]
    Redefinition(String),

    #[error("return type mismatch: {0}")]
    ReturnTypeMismatch(String),

    #[error("call to '{name}' with {got} argument(s), expected {expected}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_format() {
        let err = CompileError::Syntax {
            pos: SourcePos::new("foo.c", 3, 7),
            message: "expected ';'".to_string(),
        };
        assert_eq!(err.to_string(), "foo.c:3:7: syntax error: expected ';'");
    }

    #[test]
    fn test_semantic_redefinition_format() {
        let err = CompileError::Semantic {
            pos: SourcePos::new("x.c", 1, 12),
            kind: SemanticErrorKind::Redefinition("x".to_string()),
        };
        assert_eq!(err.to_string(), "x.c:1:12: semantic error: redefinition of 'x'");
    }

    #[test]
    fn test_lex_kind_format() {
        let err = CompileError::Lex {
            pos: SourcePos::new("a.c", 9, 1),
            kind: LexErrorKind::UnterminatedComment,
        };
        assert_eq!(
            err.to_string(),
            "a.c:9:1: lex error: unterminated block comment"
        );
    }
}
