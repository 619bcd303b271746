//! Expression evaluation and operator semantics.
//!
//! Integers are 64-bit; arithmetic that leaves that range raises
//! `OverflowError` instead of promoting.

use super::{builtins, Frame, Interpreter};
use crate::ast::{BinOp, BoolOp, CallExpr, CmpOp, Comprehension, Expr, ExprKind, Keyword, UnaryOp};
use crate::runtime::{keywords_from_mapping, merge_keywords};
use crate::value::{Exception, Function, FunctionBody, KwArgs, Value};
use indexmap::IndexMap;
use std::rc::Rc;

impl Interpreter {
    pub(crate) fn eval(&self, expr: &Expr, frame: &mut Frame) -> Result<Value, Exception> {
        match &expr.kind {
            ExprKind::Constant(lit) => Ok(Value::from(lit)),
            ExprKind::Name(name) => frame
                .scope
                .get(name)
                .or_else(|| self.builtin(name))
                .ok_or_else(|| Exception::name_error(name)),
            ExprKind::Attribute { value, attr } => {
                let object = self.eval(value, frame)?;
                self.get_attribute(&object, attr)
            }
            ExprKind::Subscript { value, index } => {
                let container = self.eval(value, frame)?;
                let index = self.eval(index, frame)?;
                self.get_item(&container, &index)
            }
            ExprKind::Call(call) => {
                let (callee, args, kwargs) = self.eval_call_parts(call, frame)?;
                self.call(&callee, args, kwargs)
            }
            ExprKind::BinOp { left, op, right } => {
                let left = self.eval(left, frame)?;
                let right = self.eval(right, frame)?;
                binop(&left, *op, &right)
            }
            ExprKind::UnaryOp { op, operand } => {
                let operand = self.eval(operand, frame)?;
                unary(*op, &operand)
            }
            ExprKind::BoolOp { op, left, right } => {
                let left = self.eval(left, frame)?;
                match (op, left.truthy()) {
                    (BoolOp::And, false) | (BoolOp::Or, true) => Ok(left),
                    _ => self.eval(right, frame),
                }
            }
            ExprKind::Compare {
                left,
                ops,
                comparators,
            } => {
                let mut current = self.eval(left, frame)?;
                for (op, next) in ops.iter().zip(comparators) {
                    let next = self.eval(next, frame)?;
                    if !compare(*op, &current, &next)? {
                        return Ok(Value::Bool(false));
                    }
                    current = next;
                }
                Ok(Value::Bool(true))
            }
            ExprKind::IfExp { test, body, orelse } => {
                if self.eval(test, frame)?.truthy() {
                    self.eval(body, frame)
                } else {
                    self.eval(orelse, frame)
                }
            }
            ExprKind::List(items) => Ok(Value::list(self.eval_args(items, frame)?)),
            ExprKind::Tuple(items) => Ok(Value::tuple(self.eval_args(items, frame)?)),
            ExprKind::Dict(items) => {
                let mut entries = Vec::with_capacity(items.len());
                for item in items {
                    let value = self.eval(&item.value, frame)?;
                    match &item.key {
                        Some(key) => entries.push((self.eval(key, frame)?, value)),
                        None => match &value {
                            Value::Dict(d) => {
                                entries.extend(d.borrow().iter().map(|(k, v)| (k.clone(), v.clone())))
                            }
                            other => {
                                return Err(Exception::type_error(format!(
                                    "'{}' object is not a mapping",
                                    other.type_name()
                                )))
                            }
                        },
                    }
                }
                Ok(Value::dict(entries))
            }
            ExprKind::ListComp { elt, generators } => {
                let mut inner = Frame {
                    scope: frame.scope.child(),
                    def_scope: frame.def_scope.clone(),
                    qualprefix: frame.qualprefix.clone(),
                    func: frame.func.clone(),
                    produced: None,
                    handling: Vec::new(),
                };
                let mut out = Vec::new();
                self.comprehend(elt, generators, &mut inner, &mut out)?;
                Ok(Value::list(out))
            }
            ExprKind::Lambda { params, body } => {
                let mut defaults = IndexMap::new();
                for param in params.positional.iter().chain(&params.kwonly) {
                    if let Some(default) = &param.default {
                        defaults.insert(param.name.clone(), self.eval(default, frame)?);
                    }
                }
                Ok(Value::Function(Rc::new(Function {
                    name: "<lambda>".to_string(),
                    qualname: format!("{}<lambda>", frame.qualprefix),
                    params: Rc::new((**params).clone()),
                    body: FunctionBody::Lambda(Rc::new((**body).clone())),
                    defaults,
                    is_async: false,
                    is_generator: false,
                    closure: frame.scope.clone(),
                })))
            }
            ExprKind::Starred(_) => Err(Exception::type_error("can't use starred expression here")),
            ExprKind::Yield(value) => {
                let value = match value {
                    Some(v) => self.eval(v, frame)?,
                    None => Value::None,
                };
                match frame.produced.as_mut() {
                    Some(produced) => {
                        produced.push(value);
                        Ok(Value::None)
                    }
                    None => Err(Exception::runtime_error("'yield' outside generator")),
                }
            }
            ExprKind::Await(inner) => self.eval(inner, frame),
            ExprKind::Hook(hook) => self.eval_hook(hook, frame),
            ExprKind::HookCall(hook) => self.eval_hook_call(hook, frame),
        }
    }

    /// Callee, positional values and merged keywords of a call, each
    /// evaluated once and left to right.
    pub(crate) fn eval_call_parts(
        &self,
        call: &CallExpr,
        frame: &mut Frame,
    ) -> Result<(Value, Vec<Value>, KwArgs), Exception> {
        let callee = self.eval(&call.func, frame)?;
        let args = self.eval_args(&call.args, frame)?;
        let kwargs = self.eval_keywords(&call.keywords, frame)?;
        Ok((callee, args, kwargs))
    }

    fn eval_args(&self, items: &[Expr], frame: &mut Frame) -> Result<Vec<Value>, Exception> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match &item.kind {
                ExprKind::Starred(inner) => {
                    let value = self.eval(inner, frame)?;
                    out.extend(self.iterate(&value)?);
                }
                _ => out.push(self.eval(item, frame)?),
            }
        }
        Ok(out)
    }

    fn eval_keywords(&self, keywords: &[Keyword], frame: &mut Frame) -> Result<KwArgs, Exception> {
        let mut maps = Vec::with_capacity(keywords.len());
        for keyword in keywords {
            let value = self.eval(&keyword.value, frame)?;
            maps.push(match &keyword.name {
                Some(name) => KwArgs::from([(name.clone(), value)]),
                None => keywords_from_mapping(&value)?,
            });
        }
        merge_keywords(maps)
    }

    fn comprehend(
        &self,
        elt: &Expr,
        generators: &[Comprehension],
        frame: &mut Frame,
        out: &mut Vec<Value>,
    ) -> Result<(), Exception> {
        let Some((first, rest)) = generators.split_first() else {
            out.push(self.eval(elt, frame)?);
            return Ok(());
        };
        let iterable = self.eval(&first.iter, frame)?;
        'items: for item in self.iterate(&iterable)? {
            self.assign(&first.target, item, frame)?;
            for cond in &first.ifs {
                if !self.eval(cond, frame)?.truthy() {
                    continue 'items;
                }
            }
            self.comprehend(elt, rest, frame, out)?;
        }
        Ok(())
    }

    pub(crate) fn get_attribute(&self, object: &Value, name: &str) -> Result<Value, Exception> {
        object
            .get_attr(name)
            .or_else(|| builtins::method(object, name))
            .ok_or_else(|| Exception::attribute_error(object, name))
    }

    pub(crate) fn get_item(&self, container: &Value, index: &Value) -> Result<Value, Exception> {
        match container {
            Value::List(_) | Value::Tuple(_) | Value::Str(_) => {
                let i = int_index(container, index)?;
                container
                    .index(i)
                    .ok_or_else(|| Exception::index_error(&container.type_name()))
            }
            Value::Dict(d) => d
                .borrow()
                .get(index)
                .cloned()
                .ok_or_else(|| Exception::key_error(index)),
            other => Err(Exception::type_error(format!(
                "'{}' object is not subscriptable",
                other.type_name()
            ))),
        }
    }

    pub(crate) fn set_item(&self, container: &Value, index: Value, value: Value) -> Result<(), Exception> {
        match container {
            Value::List(items) => {
                let i = int_index(container, &index)?;
                let mut items = items.borrow_mut();
                let len = items.len() as i64;
                let i = if i < 0 { len + i } else { i };
                if !(0..len).contains(&i) {
                    return Err(Exception::index_error("list assignment"));
                }
                items[i as usize] = value;
                Ok(())
            }
            Value::Dict(d) => {
                d.borrow_mut().insert(index, value);
                Ok(())
            }
            other => Err(Exception::type_error(format!(
                "'{}' object does not support item assignment",
                other.type_name()
            ))),
        }
    }

    /// Items of an iterable: list, tuple, string characters or dict keys.
    pub(crate) fn iterate(&self, value: &Value) -> Result<Vec<Value>, Exception> {
        match value {
            Value::List(items) => Ok(items.borrow().clone()),
            Value::Tuple(items) => Ok(items.as_ref().clone()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            Value::Dict(d) => Ok(d.borrow().keys()),
            other => Err(Exception::type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    /// `target op= operand`; lists extend in place.
    pub(crate) fn augmented(&self, current: Value, op: BinOp, operand: Value) -> Result<Value, Exception> {
        if let (Value::List(items), BinOp::Add) = (&current, op) {
            let extra = self.iterate(&operand)?;
            items.borrow_mut().extend(extra);
            return Ok(current);
        }
        binop(&current, op, &operand)
    }
}

fn int_index(container: &Value, index: &Value) -> Result<i64, Exception> {
    match index {
        Value::Int(_) | Value::Bool(_) => index
            .as_int()
            .ok_or_else(|| Exception::type_error("indices must be integers")),
        other => Err(Exception::type_error(format!(
            "{} indices must be integers, not {}",
            container.type_name(),
            other.type_name()
        ))),
    }
}

fn overflow() -> Exception {
    Exception::new("OverflowError", "integer result out of range")
}

fn unsupported(op: &str, left: &Value, right: &Value) -> Exception {
    Exception::type_error(format!(
        "unsupported operand type(s) for {op}: '{}' and '{}'",
        left.type_name(),
        right.type_name()
    ))
}

fn exact_int(value: &Value) -> Option<i64> {
    match value {
        Value::Int(_) | Value::Bool(_) => value.as_int(),
        _ => None,
    }
}

fn repeat<T: Clone>(items: &[T], times: i64) -> Vec<T> {
    let times = usize::try_from(times).unwrap_or(0);
    let mut out = Vec::with_capacity(items.len() * times);
    for _ in 0..times {
        out.extend_from_slice(items);
    }
    out
}

pub(crate) fn binop(left: &Value, op: BinOp, right: &Value) -> Result<Value, Exception> {
    match (left, right, op) {
        (Value::Str(a), Value::Str(b), BinOp::Add) => return Ok(Value::str(format!("{a}{b}"))),
        (Value::Str(s), n, BinOp::Mul) | (n, Value::Str(s), BinOp::Mul) if exact_int(n).is_some() => {
            let times = usize::try_from(exact_int(n).unwrap_or(0)).unwrap_or(0);
            return Ok(Value::str(s.repeat(times)));
        }
        (Value::List(a), Value::List(b), BinOp::Add) => {
            let mut out = a.borrow().clone();
            out.extend(b.borrow().iter().cloned());
            return Ok(Value::list(out));
        }
        (Value::List(a), n, BinOp::Mul) | (n, Value::List(a), BinOp::Mul) if exact_int(n).is_some() => {
            return Ok(Value::list(repeat(&a.borrow(), exact_int(n).unwrap_or(0))));
        }
        (Value::Tuple(a), Value::Tuple(b), BinOp::Add) => {
            let mut out = a.as_ref().clone();
            out.extend(b.iter().cloned());
            return Ok(Value::tuple(out));
        }
        _ => {}
    }

    if let (Some(a), Some(b)) = (exact_int(left), exact_int(right)) {
        return match op {
            BinOp::Div if b == 0 => Err(Exception::zero_division()),
            BinOp::Div => Ok(Value::Float(a as f64 / b as f64)),
            BinOp::Pow if b < 0 && a == 0 => Err(Exception::new(
                "ZeroDivisionError",
                "0.0 cannot be raised to a negative power",
            )),
            BinOp::Pow if b < 0 => Ok(Value::Float((a as f64).powf(b as f64))),
            _ => int_op(a, op, b).map(Value::Int),
        };
    }
    match (left, right) {
        (Value::Float(_) | Value::Int(_) | Value::Bool(_), Value::Float(_) | Value::Int(_) | Value::Bool(_)) => {
            let (Some(a), Some(b)) = (left.as_float(), right.as_float()) else {
                return Err(unsupported(op.token(), left, right));
            };
            float_op(a, op, b).ok_or_else(|| unsupported(op.token(), left, right))?
        }
        _ => Err(unsupported(op.token(), left, right)),
    }
}

/// Integer arithmetic for everything but true division and negative powers.
fn int_op(a: i64, op: BinOp, b: i64) -> Result<i64, Exception> {
    match op {
        BinOp::Add => a.checked_add(b).ok_or_else(overflow),
        BinOp::Sub => a.checked_sub(b).ok_or_else(overflow),
        BinOp::Mul => a.checked_mul(b).ok_or_else(overflow),
        BinOp::Div => {
            if b == 0 {
                return Err(Exception::zero_division());
            }
            Ok(a / b)
        }
        BinOp::FloorDiv => {
            if b == 0 {
                return Err(Exception::new("ZeroDivisionError", "integer division or modulo by zero"));
            }
            let q = a.checked_div(b).ok_or_else(overflow)?;
            Ok(if (a % b != 0) && ((a < 0) != (b < 0)) { q - 1 } else { q })
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(Exception::new("ZeroDivisionError", "integer modulo by zero"));
            }
            let r = a.checked_rem(b).ok_or_else(overflow)?;
            Ok(if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r })
        }
        BinOp::Pow => {
            let exp = u32::try_from(b).map_err(|_| overflow())?;
            a.checked_pow(exp).ok_or_else(overflow)
        }
        BinOp::BitOr => Ok(a | b),
        BinOp::BitAnd => Ok(a & b),
        BinOp::BitXor => Ok(a ^ b),
        BinOp::LShift => {
            if b < 0 {
                return Err(Exception::value_error("negative shift count"));
            }
            if a == 0 {
                return Ok(0);
            }
            if b >= 63 {
                return Err(overflow());
            }
            let shifted = a << b;
            if shifted >> b != a {
                return Err(overflow());
            }
            Ok(shifted)
        }
        BinOp::RShift => {
            if b < 0 {
                return Err(Exception::value_error("negative shift count"));
            }
            Ok(if b >= 64 { if a < 0 { -1 } else { 0 } } else { a >> b })
        }
    }
}

fn float_op(a: f64, op: BinOp, b: f64) -> Option<Result<Value, Exception>> {
    let zero = || Err(Exception::new("ZeroDivisionError", "float division by zero"));
    Some(match op {
        BinOp::Add => Ok(Value::Float(a + b)),
        BinOp::Sub => Ok(Value::Float(a - b)),
        BinOp::Mul => Ok(Value::Float(a * b)),
        BinOp::Div if b == 0.0 => zero(),
        BinOp::Div => Ok(Value::Float(a / b)),
        BinOp::FloorDiv if b == 0.0 => zero(),
        BinOp::FloorDiv => Ok(Value::Float((a / b).floor())),
        BinOp::Mod if b == 0.0 => Err(Exception::new("ZeroDivisionError", "float modulo")),
        BinOp::Mod => {
            let r = a % b;
            Ok(Value::Float(if r != 0.0 && ((r < 0.0) != (b < 0.0)) { r + b } else { r }))
        }
        BinOp::Pow => Ok(Value::Float(a.powf(b))),
        _ => return None,
    })
}

fn unary(op: UnaryOp, operand: &Value) -> Result<Value, Exception> {
    let bad = || {
        Exception::type_error(format!(
            "bad operand type for unary operator: '{}'",
            operand.type_name()
        ))
    };
    match op {
        UnaryOp::Not => Ok(Value::Bool(!operand.truthy())),
        UnaryOp::Neg => match operand {
            Value::Float(x) => Ok(Value::Float(-x)),
            other => {
                let i = exact_int(other).ok_or_else(bad)?;
                i.checked_neg().map(Value::Int).ok_or_else(overflow)
            }
        },
        UnaryOp::Pos => match operand {
            Value::Float(x) => Ok(Value::Float(*x)),
            other => exact_int(other).map(Value::Int).ok_or_else(bad),
        },
        UnaryOp::Invert => exact_int(operand).map(|i| Value::Int(!i)).ok_or_else(bad),
    }
}

pub(crate) fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool, Exception> {
    use std::cmp::Ordering::{Equal, Greater, Less};
    let ordered = |accept: &[std::cmp::Ordering]| -> Result<bool, Exception> {
        match left.py_cmp(right) {
            Some(ord) => Ok(accept.contains(&ord)),
            None => Err(Exception::type_error(format!(
                "'{}' not supported between instances of '{}' and '{}'",
                op.token(),
                left.type_name(),
                right.type_name()
            ))),
        }
    };
    match op {
        CmpOp::Eq => Ok(left.py_eq(right)),
        CmpOp::NotEq => Ok(!left.py_eq(right)),
        CmpOp::Lt => ordered(&[Less]),
        CmpOp::LtE => ordered(&[Less, Equal]),
        CmpOp::Gt => ordered(&[Greater]),
        CmpOp::GtE => ordered(&[Greater, Equal]),
        CmpOp::In => contains(right, left),
        CmpOp::NotIn => contains(right, left).map(|found| !found),
        CmpOp::Is => Ok(left.is_same(right)),
        CmpOp::IsNot => Ok(!left.is_same(right)),
    }
}

fn contains(container: &Value, item: &Value) -> Result<bool, Exception> {
    match container {
        Value::Str(haystack) => match item {
            Value::Str(needle) => Ok(haystack.contains(needle.as_str())),
            other => Err(Exception::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::List(items) => Ok(items.borrow().iter().any(|v| v.py_eq(item))),
        Value::Tuple(items) => Ok(items.iter().any(|v| v.py_eq(item))),
        Value::Dict(d) => Ok(d.borrow().get(item).is_some()),
        other => Err(Exception::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_division_follows_floor_semantics() {
        assert_eq!(binop(&Value::Int(-7), BinOp::FloorDiv, &Value::Int(2)).unwrap(), Value::Int(-4));
        assert_eq!(binop(&Value::Int(-7), BinOp::Mod, &Value::Int(3)).unwrap(), Value::Int(2));
        assert_eq!(binop(&Value::Int(7), BinOp::Div, &Value::Int(2)).unwrap(), Value::Float(3.5));
        assert_eq!(
            binop(&Value::Int(1), BinOp::Div, &Value::Int(0)).unwrap_err().class_name,
            "ZeroDivisionError"
        );
    }

    #[test]
    fn overflow_is_reported() {
        let err = binop(&Value::Int(i64::MAX), BinOp::Add, &Value::Int(1)).unwrap_err();
        assert_eq!(err.class_name, "OverflowError");
    }

    #[test]
    fn mixed_numeric_and_sequence_ops() {
        assert_eq!(binop(&Value::Int(1), BinOp::Add, &Value::Float(0.5)).unwrap(), Value::Float(1.5));
        assert_eq!(binop(&Value::str("ab"), BinOp::Mul, &Value::Int(2)).unwrap(), Value::str("abab"));
        let joined = binop(
            &Value::list(vec![Value::Int(1)]),
            BinOp::Add,
            &Value::list(vec![Value::Int(2)]),
        )
        .unwrap();
        assert_eq!(joined.to_string(), "[1, 2]");
        let err = binop(&Value::str("a"), BinOp::Add, &Value::Int(1)).unwrap_err();
        assert_eq!(err.message, "unsupported operand type(s) for +: 'str' and 'int'");
    }

    #[test]
    fn comparisons_and_membership() {
        assert!(compare(CmpOp::Lt, &Value::Int(1), &Value::Float(1.5)).unwrap());
        assert!(compare(CmpOp::In, &Value::str("el"), &Value::str("hello")).unwrap());
        assert!(compare(CmpOp::NotIn, &Value::Int(3), &Value::list(vec![Value::Int(1)])).unwrap());
        assert!(compare(CmpOp::Lt, &Value::str("a"), &Value::Int(1)).is_err());
        assert!(compare(CmpOp::Is, &Value::None, &Value::None).unwrap());
    }
}
