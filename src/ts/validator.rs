use crate::ts::errors::TreeSitterError;
use crate::ts::parser::ParsedSource;

/// Fold the syntax issues of a parse into one error.
pub fn check_parsed(parsed: &ParsedSource<'_>) -> Result<(), TreeSitterError> {
    let issues = parsed.syntax_issues();
    let Some(first) = issues.first() else {
        return Ok(());
    };
    if issues.len() == 1 {
        return Err(TreeSitterError::SyntaxError {
            line: first.line,
            column: first.column,
            detail: first.detail.clone(),
        });
    }
    Err(TreeSitterError::MultipleSyntaxErrors {
        count: issues.len(),
        first_line: first.line,
        detail: first.detail.clone(),
    })
}

/// Parse `source` only to report whether it is valid Python.
pub fn validate_syntax(source: &str) -> Result<(), TreeSitterError> {
    crate::pool::with_parser(|parser| {
        let parsed = parser.parse_with_source(source)?;
        check_parsed(&parsed)
    })?
}
