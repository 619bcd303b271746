//! Thread-local parser pooling.
//!
//! Module loads parse many sources in a row; keeping one parser per thread
//! avoids re-creating it (and re-setting the grammar) for every module.

use crate::ts::{PythonParser, TreeSitterError};
use std::cell::RefCell;

thread_local! {
    static PYTHON_PARSER: RefCell<Option<PythonParser>> = const { RefCell::new(None) };
}

/// Execute function with pooled parser instance.
///
/// On first call per thread, creates new parser. Subsequent calls reuse
/// the same parser instance.
///
/// # Example
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use mixweave::pool::with_parser;
///
/// let has_errors = with_parser(|parser| {
///     parser.parse_with_source("def main():\n    pass\n").map(|p| p.has_errors())
/// })??;
/// # Ok(())
/// # }
/// ```
pub fn with_parser<F, R>(f: F) -> Result<R, TreeSitterError>
where
    F: FnOnce(&mut PythonParser) -> R,
{
    PYTHON_PARSER.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            *slot = Some(PythonParser::new()?);
        }
        match slot.as_mut() {
            Some(parser) => Ok(f(parser)),
            None => Err(TreeSitterError::ParserInit),
        }
    })
}
