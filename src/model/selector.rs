//! Structural call-site selectors.
//!
//! Matching happens on syntax, before anything executes: positional
//! patterns compare literal, name and attribute-path nodes, never runtime
//! values. Keyword sources are tri-state so `**expr` expansions that are
//! not statically known can be handled by an explicit policy.

use super::Literal;
use crate::ast::{CallExpr, Expr, ExprKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionalMode {
    #[default]
    Prefix,
    Exact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeywordMode {
    #[default]
    Subset,
    Exact,
}

/// What to do with a `**expr` expansion whose keys cannot be known statically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnresolvedPolicy {
    /// Any unresolved expansion makes the selector fail.
    #[default]
    Fail,
    /// Unresolved expansions are allowed but never satisfy a missing key.
    Ignore,
    /// Under SUBSET, missing keys are assumed to come from the expansion.
    AssumeMatch,
}

/// Shape of one argument in a selector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgPattern {
    Any,
    Const(Literal),
    Name(String),
    Attr(Vec<String>),
}

impl ArgPattern {
    pub fn attr(path: &str) -> Self {
        ArgPattern::Attr(path.split('.').map(str::to_string).collect())
    }

    pub fn matches(&self, node: &Expr) -> bool {
        match self {
            ArgPattern::Any => true,
            ArgPattern::Const(value) => {
                matches!(&node.kind, ExprKind::Constant(lit) if lit == value)
            }
            ArgPattern::Name(name) => matches!(&node.kind, ExprKind::Name(n) if n == name),
            ArgPattern::Attr(parts) => node.dotted_path().as_ref() == Some(parts),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct KeywordPattern {
    #[serde(default)]
    pub mode: KeywordMode,
    pub items: BTreeMap<String, ArgPattern>,
}

impl KeywordPattern {
    pub fn subset<K: Into<String>>(items: impl IntoIterator<Item = (K, ArgPattern)>) -> Self {
        Self {
            mode: KeywordMode::Subset,
            items: items.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn exact<K: Into<String>>(items: impl IntoIterator<Item = (K, ArgPattern)>) -> Self {
        Self {
            mode: KeywordMode::Exact,
            items: items.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Matches a call by callee path, positional shapes and keyword patterns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CallSelector {
    pub callee: Option<Vec<String>>,
    pub positional: Vec<ArgPattern>,
    pub positional_mode: PositionalMode,
    pub keywords: Option<KeywordPattern>,
    pub unresolved: UnresolvedPolicy,
}

impl CallSelector {
    pub fn callee(path: &str) -> Self {
        Self {
            callee: Some(path.split('.').map(str::to_string).collect()),
            ..Self::default()
        }
    }

    pub fn with_positional(mut self, patterns: Vec<ArgPattern>, mode: PositionalMode) -> Self {
        self.positional = patterns;
        self.positional_mode = mode;
        self
    }

    pub fn with_keywords(mut self, pattern: KeywordPattern) -> Self {
        self.keywords = Some(pattern);
        self
    }

    pub fn with_unresolved(mut self, policy: UnresolvedPolicy) -> Self {
        self.unresolved = policy;
        self
    }

    pub fn callee_dotted(&self) -> Option<String> {
        self.callee.as_ref().map(|parts| parts.join("."))
    }

    pub fn matches(&self, shape: &CallShape<'_>) -> bool {
        if let Some(callee) = &self.callee {
            if shape.callee.as_ref() != Some(callee) {
                return false;
            }
        }

        let actual = shape.positional.len();
        let wanted = self.positional.len();
        if self.positional_mode == PositionalMode::Exact && actual != wanted {
            return false;
        }
        if actual < wanted {
            return false;
        }
        if !self
            .positional
            .iter()
            .zip(&shape.positional)
            .all(|(pattern, node)| pattern.matches(node))
        {
            return false;
        }

        let unresolved = shape.has_dynamic_keywords();
        if unresolved && self.unresolved == UnresolvedPolicy::Fail {
            return false;
        }

        let Some(pattern) = &self.keywords else {
            return true;
        };
        let known = shape.known_keywords();

        let missing = pattern.items.keys().any(|k| !known.contains_key(k.as_str()));
        if missing {
            let assumed = unresolved
                && self.unresolved == UnresolvedPolicy::AssumeMatch
                && pattern.mode == KeywordMode::Subset;
            if !assumed {
                return false;
            }
        }

        for (key, arg) in &pattern.items {
            if let Some(node) = known.get(key.as_str()) {
                if !arg.matches(node) {
                    return false;
                }
            }
        }

        if pattern.mode == KeywordMode::Exact {
            let same_keys = known.len() == pattern.items.len()
                && known.keys().all(|k| pattern.items.contains_key(*k));
            if !same_keys {
                return false;
            }
        }

        true
    }
}

/// One keyword argument source of a call.
#[derive(Debug, Clone)]
pub enum KeywordSource<'a> {
    /// `name=value`
    Explicit(&'a str, &'a Expr),
    /// `**{"a": x, "b": y}` with all-string literal keys.
    Static(Vec<(&'a str, &'a Expr)>),
    /// `**expr` that cannot be resolved before execution.
    Dynamic(&'a Expr),
}

/// Syntactic view of a call used for selector matching.
#[derive(Debug, Clone)]
pub struct CallShape<'a> {
    pub callee: Option<Vec<String>>,
    pub positional: Vec<&'a Expr>,
    pub keywords: Vec<KeywordSource<'a>>,
}

impl<'a> CallShape<'a> {
    pub fn of(call: &'a CallExpr) -> Self {
        let keywords = call
            .keywords
            .iter()
            .map(|kw| match &kw.name {
                Some(name) => KeywordSource::Explicit(name.as_str(), &kw.value),
                None => static_expansion(&kw.value)
                    .map(KeywordSource::Static)
                    .unwrap_or(KeywordSource::Dynamic(&kw.value)),
            })
            .collect();
        Self {
            callee: call.func.dotted_path(),
            positional: call.args.iter().collect(),
            keywords,
        }
    }

    pub fn has_dynamic_keywords(&self) -> bool {
        self.keywords
            .iter()
            .any(|k| matches!(k, KeywordSource::Dynamic(_)))
    }

    /// Explicit keywords plus statically resolved expansions, in call order.
    pub fn known_keywords(&self) -> IndexMap<&'a str, &'a Expr> {
        let mut out = IndexMap::new();
        for source in &self.keywords {
            match source {
                KeywordSource::Explicit(name, value) => {
                    out.insert(*name, *value);
                }
                KeywordSource::Static(pairs) => {
                    for (name, value) in pairs {
                        out.insert(*name, *value);
                    }
                }
                KeywordSource::Dynamic(_) => {}
            }
        }
        out
    }
}

fn static_expansion(expr: &Expr) -> Option<Vec<(&str, &Expr)>> {
    let ExprKind::Dict(items) = &expr.kind else {
        return None;
    };
    items
        .iter()
        .map(|item| match item.key.as_ref().map(|k| &k.kind) {
            Some(ExprKind::Constant(Literal::Str(key))) => Some((key.as_str(), &item.value)),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DictItem, Keyword, NodeId};

    fn e(kind: ExprKind) -> Expr {
        Expr::new(NodeId(0), 1, kind)
    }

    fn name(n: &str) -> Expr {
        e(ExprKind::Name(n.into()))
    }

    fn int(i: i64) -> Expr {
        e(ExprKind::Constant(Literal::Int(i)))
    }

    fn attr(obj: &str, field: &str) -> Expr {
        e(ExprKind::Attribute {
            value: Box::new(name(obj)),
            attr: field.into(),
        })
    }

    fn call(func: Expr, args: Vec<Expr>, keywords: Vec<Keyword>) -> CallExpr {
        CallExpr {
            func: Box::new(func),
            args,
            keywords,
        }
    }

    fn kw(n: &str, value: Expr) -> Keyword {
        Keyword {
            name: Some(n.into()),
            value,
        }
    }

    fn splat(value: Expr) -> Keyword {
        Keyword { name: None, value }
    }

    #[test]
    fn callee_mismatch_fails() {
        let c = call(attr("self", "send"), vec![], vec![]);
        assert!(!CallSelector::callee("self.recv").matches(&CallShape::of(&c)));
        assert!(CallSelector::callee("self.send").matches(&CallShape::of(&c)));
    }

    #[test]
    fn positional_prefix_and_exact() {
        let c = call(name("f"), vec![int(1), name("x")], vec![]);
        let shape = CallShape::of(&c);
        let prefix = CallSelector::callee("f")
            .with_positional(vec![ArgPattern::Const(Literal::Int(1))], PositionalMode::Prefix);
        assert!(prefix.matches(&shape));
        let exact = CallSelector::callee("f")
            .with_positional(vec![ArgPattern::Const(Literal::Int(1))], PositionalMode::Exact);
        assert!(!exact.matches(&shape));
        let both = CallSelector::callee("f").with_positional(
            vec![ArgPattern::Any, ArgPattern::Name("x".into())],
            PositionalMode::Exact,
        );
        assert!(both.matches(&shape));
    }

    #[test]
    fn attribute_pattern_matches_dotted_path() {
        let c = call(name("f"), vec![attr("self", "host")], vec![]);
        let sel = CallSelector::callee("f")
            .with_positional(vec![ArgPattern::attr("self.host")], PositionalMode::Prefix);
        assert!(sel.matches(&CallShape::of(&c)));
    }

    #[test]
    fn static_dict_expansion_equals_explicit_keywords() {
        let explicit = call(name("f"), vec![], vec![kw("timeout", int(5))]);
        let expanded = call(
            name("f"),
            vec![],
            vec![splat(e(ExprKind::Dict(vec![DictItem {
                key: Some(e(ExprKind::Constant(Literal::Str("timeout".into())))),
                value: int(5),
            }])))],
        );
        let sel = CallSelector::callee("f").with_keywords(KeywordPattern::exact([(
            "timeout",
            ArgPattern::Const(Literal::Int(5)),
        )]));
        assert!(sel.matches(&CallShape::of(&explicit)));
        assert!(sel.matches(&CallShape::of(&expanded)));
        assert!(!CallShape::of(&expanded).has_dynamic_keywords());
    }

    #[test]
    fn unresolved_expansion_policies() {
        let c = call(name("f"), vec![], vec![splat(name("opts"))]);
        let shape = CallShape::of(&c);
        let pattern = KeywordPattern::subset([("retries", ArgPattern::Any)]);

        let fail = CallSelector::callee("f").with_keywords(pattern.clone());
        assert!(!fail.matches(&shape));

        let assume = fail.clone().with_unresolved(UnresolvedPolicy::AssumeMatch);
        assert!(assume.matches(&shape));

        let ignore = fail.with_unresolved(UnresolvedPolicy::Ignore);
        assert!(!ignore.matches(&shape));
    }

    #[test]
    fn exact_keywords_compare_known_keys_only() {
        let c = call(name("f"), vec![], vec![kw("a", int(1)), splat(name("rest"))]);
        let sel = CallSelector::callee("f")
            .with_keywords(KeywordPattern::exact([("a", ArgPattern::Any)]))
            .with_unresolved(UnresolvedPolicy::Ignore);
        assert!(sel.matches(&CallShape::of(&c)));

        let wider = CallSelector::callee("f")
            .with_keywords(KeywordPattern::exact([("a", ArgPattern::Any), ("b", ArgPattern::Any)]))
            .with_unresolved(UnresolvedPolicy::AssumeMatch);
        assert!(!wider.matches(&CallShape::of(&c)));
    }

    #[test]
    fn dynamic_expansion_without_keyword_pattern() {
        let c = call(name("f"), vec![], vec![splat(name("opts"))]);
        assert!(!CallSelector::callee("f").matches(&CallShape::of(&c)));
        assert!(CallSelector::callee("f")
            .with_unresolved(UnresolvedPolicy::Ignore)
            .matches(&CallShape::of(&c)));
    }
}
