use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreeSitterError {
    #[error("failed to initialize tree-sitter parser")]
    ParserInit,

    #[error("failed to set language for parser")]
    LanguageSet,

    #[error("failed to parse source code")]
    ParseFailed,

    #[error("syntax error at line {line}, column {column}: {detail}")]
    SyntaxError {
        line: usize,
        column: usize,
        detail: String,
    },

    #[error("{count} syntax errors, first at line {first_line}: {detail}")]
    MultipleSyntaxErrors {
        count: usize,
        first_line: usize,
        detail: String,
    },

    #[error("unsupported construct '{kind}' at line {line}")]
    Unsupported { kind: String, line: usize },

    #[error("malformed '{kind}' node at line {line}: missing {field}")]
    Malformed {
        kind: String,
        field: &'static str,
        line: usize,
    },

    #[error("invalid literal '{text}' at line {line}")]
    InvalidLiteral { text: String, line: usize },
}
