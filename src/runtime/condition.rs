//! Evaluation of [`Condition`] trees against a dispatch context.

use super::callback_info::Context;
use crate::cache::get_or_compile_regex;
use crate::model::{CompareOp, Condition, Literal};
use crate::value::Value;
use std::cmp::Ordering;

/// Evaluate a condition; comparisons that cannot be made are false.
pub fn evaluate(condition: &Condition, ctx: &Context) -> bool {
    match condition {
        Condition::And(parts) => parts.iter().all(|c| evaluate(c, ctx)),
        Condition::Or(parts) => parts.iter().any(|c| evaluate(c, ctx)),
        Condition::Not(inner) => !evaluate(inner, ctx),
        Condition::Compare { path, op, operand } => match resolve_path(ctx, path) {
            Some(value) => compare(&value, *op, operand),
            None => *op == CompareOp::IsNone,
        },
    }
}

/// Look up a dotted path such as `self.health` or `args[0]`.
///
/// The whole path is tried as a context key first. Each segment reads a dict
/// key, else an attribute, and may carry one `[n]` index.
pub fn resolve_path(ctx: &Context, path: &str) -> Option<Value> {
    if let Some(v) = ctx.get(path) {
        return Some(v.clone());
    }

    let mut current: Option<Value> = None;
    for (i, token) in path.split('.').enumerate() {
        let (key, index) = parse_segment(token)?;
        let next = match (&current, i) {
            (_, 0) => ctx.get(key).cloned(),
            (Some(Value::Dict(d)), _) => d.borrow().get(&Value::str(key)).cloned(),
            (Some(v), _) => v.get_attr(key),
            (None, _) => None,
        }?;
        current = Some(match index {
            Some(n) => next.index(n)?,
            None => next,
        });
    }
    current
}

fn parse_segment(token: &str) -> Option<(&str, Option<i64>)> {
    let is_word = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_');
    match token.split_once('[') {
        None if is_word(token) => Some((token, None)),
        None => None,
        Some((key, rest)) => {
            let digits = rest.strip_suffix(']')?;
            if !is_word(key) || digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            Some((key, Some(digits.parse().ok()?)))
        }
    }
}

fn compare(left: &Value, op: CompareOp, operand: &Literal) -> bool {
    let right = Value::from(operand);
    match op {
        CompareOp::Eq => left.py_eq(&right),
        CompareOp::Ne => !left.py_eq(&right),
        CompareOp::Gt => left.py_cmp(&right) == Some(Ordering::Greater),
        CompareOp::Lt => left.py_cmp(&right) == Some(Ordering::Less),
        CompareOp::Ge => matches!(left.py_cmp(&right), Some(Ordering::Greater | Ordering::Equal)),
        CompareOp::Le => matches!(left.py_cmp(&right), Some(Ordering::Less | Ordering::Equal)),
        CompareOp::In => contains(&right, left),
        CompareOp::NotIn => !contains(&right, left),
        CompareOp::IsNone => left.is_none(),
        CompareOp::NotNone => !left.is_none(),
        CompareOp::Match => {
            let Some(pattern) = operand.as_str() else {
                return false;
            };
            match get_or_compile_regex(pattern) {
                Ok(re) => re.is_match(&left.to_string()),
                Err(err) => {
                    tracing::warn!(pattern, error = %err, "invalid MATCH pattern in condition");
                    false
                }
            }
        }
        CompareOp::IsInstance => operand
            .as_str()
            .map(|class| is_instance(left, class))
            .unwrap_or(false),
        CompareOp::LenEq | CompareOp::LenGt | CompareOp::LenLt => {
            let (Some(len), Literal::Int(n)) = (left.len(), operand) else {
                return false;
            };
            let len = len as i64;
            match op {
                CompareOp::LenEq => len == *n,
                CompareOp::LenGt => len > *n,
                _ => len < *n,
            }
        }
    }
}

fn contains(container: &Value, item: &Value) -> bool {
    match container {
        Value::Str(haystack) => item.as_str().map(|s| haystack.contains(s)).unwrap_or(false),
        other => other
            .as_items()
            .map(|items| items.iter().any(|v| v.py_eq(item)))
            .unwrap_or(false),
    }
}

fn is_instance(value: &Value, class: &str) -> bool {
    match value {
        Value::Instance(inst) => inst.class.inherits_named(class),
        Value::Bool(_) if class == "int" => true,
        other => other.type_name() == class,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Class, Instance};
    use indexmap::IndexMap;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn ctx() -> Context {
        let class = Rc::new(Class::new("Player", vec![]));
        let player = Value::Instance(Rc::new(Instance {
            class,
            attrs: RefCell::new(IndexMap::from([("health".to_string(), Value::Int(40))])),
        }));
        let mut ctx = Context::new();
        ctx.insert("self".into(), player);
        ctx.insert("args".into(), Value::list(vec![Value::Int(-5), Value::str("x")]));
        ctx.insert(
            "kwargs".into(),
            Value::dict([(Value::str("mode"), Value::str("fast"))]),
        );
        ctx.insert("value".into(), Value::Int(-5));
        ctx
    }

    #[test]
    fn resolves_attributes_keys_and_indices() {
        let ctx = ctx();
        assert_eq!(resolve_path(&ctx, "self.health"), Some(Value::Int(40)));
        assert_eq!(resolve_path(&ctx, "args[1]"), Some(Value::str("x")));
        assert_eq!(resolve_path(&ctx, "kwargs.mode"), Some(Value::str("fast")));
        assert_eq!(resolve_path(&ctx, "args[9]"), None);
        assert_eq!(resolve_path(&ctx, "self.mana"), None);
        assert_eq!(resolve_path(&ctx, "bad path!"), None);
    }

    #[test]
    fn comparisons() {
        let ctx = ctx();
        assert!(evaluate(&Condition::lt("value", 0), &ctx));
        assert!(evaluate(&Condition::gt("self.health", 10), &ctx));
        assert!(evaluate(&Condition::compare("args[1]", CompareOp::In, "xyz"), &ctx));
        assert!(evaluate(&Condition::compare("args", CompareOp::LenEq, 2), &ctx));
        assert!(evaluate(&Condition::matches("kwargs.mode", "^fa"), &ctx));
        assert!(evaluate(&Condition::is_instance("self", "Player"), &ctx));
        assert!(!evaluate(&Condition::eq("value", "-5"), &ctx));
    }

    #[test]
    fn missing_paths_only_satisfy_is_none() {
        let ctx = ctx();
        assert!(evaluate(&Condition::is_none("nothing.here"), &ctx));
        assert!(!evaluate(&Condition::not_none("nothing"), &ctx));
        assert!(!evaluate(&Condition::ne("nothing", 1), &ctx));
        assert!(!evaluate(&Condition::eq("nothing", Literal::None), &ctx));
    }

    #[test]
    fn boolean_combinators() {
        let ctx = ctx();
        let cond = Condition::and([
            Condition::lt("value", 0),
            Condition::not(Condition::eq("kwargs.mode", "slow")),
        ]);
        assert!(evaluate(&cond, &ctx));
        assert!(evaluate(&Condition::or([Condition::eq("value", 1), Condition::eq("value", -5)]), &ctx));
    }

    #[test]
    fn invalid_regex_is_false() {
        assert!(!evaluate(&Condition::matches("value", "("), &ctx()));
    }
}
