//! Safe runtime condition trees.
//!
//! A condition is pure data: a comparison of a context path against a
//! literal operand, or a boolean combination of nested conditions. The
//! evaluator lives in [`crate::runtime::condition`].

use super::Literal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    In,
    NotIn,
    IsNone,
    NotNone,
    Match,
    IsInstance,
    LenEq,
    LenGt,
    LenLt,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
            CompareOp::In => "in",
            CompareOp::NotIn => "not in",
            CompareOp::IsNone => "is None",
            CompareOp::NotNone => "is not None",
            CompareOp::Match => "=~",
            CompareOp::IsInstance => "isinstance",
            CompareOp::LenEq => "len ==",
            CompareOp::LenGt => "len >",
            CompareOp::LenLt => "len <",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Compare {
        path: String,
        op: CompareOp,
        #[serde(default = "none_literal")]
        operand: Literal,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

fn none_literal() -> Literal {
    Literal::None
}

impl Condition {
    pub fn compare(path: impl Into<String>, op: CompareOp, operand: impl Into<Literal>) -> Self {
        Condition::Compare {
            path: path.into(),
            op,
            operand: operand.into(),
        }
    }

    pub fn eq(path: impl Into<String>, operand: impl Into<Literal>) -> Self {
        Self::compare(path, CompareOp::Eq, operand)
    }

    pub fn ne(path: impl Into<String>, operand: impl Into<Literal>) -> Self {
        Self::compare(path, CompareOp::Ne, operand)
    }

    pub fn gt(path: impl Into<String>, operand: impl Into<Literal>) -> Self {
        Self::compare(path, CompareOp::Gt, operand)
    }

    pub fn lt(path: impl Into<String>, operand: impl Into<Literal>) -> Self {
        Self::compare(path, CompareOp::Lt, operand)
    }

    pub fn is_none(path: impl Into<String>) -> Self {
        Self::compare(path, CompareOp::IsNone, Literal::None)
    }

    pub fn not_none(path: impl Into<String>) -> Self {
        Self::compare(path, CompareOp::NotNone, Literal::None)
    }

    pub fn matches(path: impl Into<String>, pattern: &str) -> Self {
        Self::compare(path, CompareOp::Match, pattern)
    }

    pub fn is_instance(path: impl Into<String>, class: &str) -> Self {
        Self::compare(path, CompareOp::IsInstance, class)
    }

    pub fn and(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Condition::And(conditions.into_iter().collect())
    }

    pub fn or(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Condition::Or(conditions.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(condition: Condition) -> Self {
        Condition::Not(Box::new(condition))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Compare { path, op, operand } => match op {
                CompareOp::IsNone | CompareOp::NotNone => write!(f, "{path} {}", op.symbol()),
                CompareOp::IsInstance => write!(f, "isinstance({path}, {operand})"),
                _ => write!(f, "{path} {} {operand}", op.symbol()),
            },
            Condition::And(items) | Condition::Or(items) => {
                let joiner = if matches!(self, Condition::And(_)) {
                    " and "
                } else {
                    " or "
                };
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(joiner)?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Condition::Not(inner) => write!(f, "not {inner}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_readable() {
        let cond = Condition::and([Condition::lt("value", 0), Condition::not_none("self")]);
        assert_eq!(cond.to_string(), "(value < 0 and self is not None)");
    }

    #[test]
    fn json_form_round_trips_operand_default() {
        let cond: Condition =
            serde_json::from_str(r#"{"compare": {"path": "args[0]", "op": "IS_NONE"}}"#).unwrap();
        assert_eq!(cond, Condition::is_none("args[0]"));
    }
}
