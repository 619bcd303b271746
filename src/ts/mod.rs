//! Tree-sitter integration: parsing Python source and lowering it to [`crate::ast`].
//!
//! The grammar comes from `ast-grep-language`, so the tree-sitter version here
//! must match the one that crate was built against.

pub mod errors;
pub mod lower;
pub mod parser;
pub mod validator;

pub use errors::TreeSitterError;
pub use lower::lower_module;
pub use parser::{ParsedSource, PythonParser, SyntaxIssue};
pub use validator::{check_parsed, validate_syntax};

use crate::ast::Module;

/// Parse and lower a module using the thread-local parser.
pub fn parse_module(source: &str) -> Result<Module, TreeSitterError> {
    crate::pool::with_parser(|parser| {
        let parsed = parser.parse_with_source(source)?;
        lower_module(&parsed)
    })?
}
