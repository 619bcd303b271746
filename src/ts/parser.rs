use crate::ts::errors::TreeSitterError;
use ast_grep_language::{LanguageExt, SupportLang};
use tree_sitter::{Node, Parser, Tree};

/// Python parser with the grammar already loaded.
pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    pub fn new() -> Result<Self, TreeSitterError> {
        let mut parser = Parser::new();
        let grammar = SupportLang::Python.get_ts_language();
        parser
            .set_language(&grammar)
            .map_err(|_| TreeSitterError::LanguageSet)?;
        Ok(Self { parser })
    }

    pub fn parse_with_source<'a>(&mut self, source: &'a str) -> Result<ParsedSource<'a>, TreeSitterError> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or(TreeSitterError::ParseFailed)?;
        Ok(ParsedSource { source, tree })
    }
}

/// Module source together with its concrete syntax tree.
pub struct ParsedSource<'a> {
    pub source: &'a str,
    pub tree: Tree,
}

impl<'a> ParsedSource<'a> {
    pub fn root_node(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    /// Every `ERROR` or missing node, outermost first.
    ///
    /// Subtrees that contain no errors are skipped without descending.
    pub fn syntax_issues(&self) -> Vec<SyntaxIssue> {
        let mut issues = Vec::new();
        let mut pending = vec![self.tree.root_node()];
        while let Some(node) = pending.pop() {
            if node.is_missing() {
                issues.push(SyntaxIssue::at(node, format!("expected '{}'", node.kind())));
                continue;
            }
            if node.is_error() {
                let text = self.source[node.byte_range()].lines().next().unwrap_or_default().trim();
                issues.push(SyntaxIssue::at(node, format!("unexpected '{text}'")));
            }
            if node.has_error() {
                let mut cursor = node.walk();
                let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
                pending.extend(children.into_iter().rev());
            }
        }
        issues
    }
}

/// One syntax problem, positioned 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxIssue {
    pub line: usize,
    pub column: usize,
    pub detail: String,
}

impl SyntaxIssue {
    fn at(node: Node<'_>, detail: String) -> Self {
        let start = node.start_position();
        Self {
            line: start.row + 1,
            column: start.column + 1,
            detail,
        }
    }
}
