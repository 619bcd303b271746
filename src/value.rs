//! Runtime values of the woven target language.
//!
//! Values are cheap to clone: containers and objects are reference counted
//! and share their interior, so a list passed to a callback and mutated there
//! is the same list the woven function sees.

use crate::ast::{Expr, Params, Stmt};
use crate::interp::{Interpreter, Scope};
use crate::model::literal::{format_float, quote_str};
use crate::model::Literal;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

/// Keyword arguments of a call, in call order.
pub type KwArgs = IndexMap<String, Value>;

/// Host function callable from woven code.
pub type NativeFn = dyn Fn(&Interpreter, &[Value], &KwArgs) -> Result<Value, Exception>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<Vec<Value>>),
    Dict(Rc<RefCell<Dict>>),
    Function(Rc<Function>),
    BoundMethod(Rc<BoundMethod>),
    Class(Rc<Class>),
    Instance(Rc<Instance>),
    Builtin(Rc<Builtin>),
}

/// Insertion-ordered mapping keyed by value equality.
#[derive(Clone, Default)]
pub struct Dict {
    entries: Vec<(Value, Value)>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.py_eq(key))
            .map(|(_, v)| v)
    }

    pub fn insert(&mut self, key: Value, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| k.py_eq(&key)) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k.py_eq(key))?;
        Some(self.entries.remove(index).1)
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

pub enum FunctionBody {
    Block(Rc<Vec<Stmt>>),
    Lambda(Rc<Expr>),
}

/// A user-defined function or lambda closed over its defining scope.
pub struct Function {
    pub name: String,
    pub qualname: String,
    pub params: Rc<Params>,
    pub body: FunctionBody,
    pub defaults: IndexMap<String, Value>,
    pub is_async: bool,
    pub is_generator: bool,
    pub closure: Scope,
}

pub struct BoundMethod {
    pub receiver: Value,
    pub function: Value,
}

pub struct Class {
    pub name: String,
    pub bases: Vec<Rc<Class>>,
    pub attrs: RefCell<IndexMap<String, Value>>,
}

impl Class {
    pub fn new(name: impl Into<String>, bases: Vec<Rc<Class>>) -> Self {
        Self {
            name: name.into(),
            bases,
            attrs: RefCell::new(IndexMap::new()),
        }
    }

    /// Depth-first, left-to-right linearisation without duplicates.
    pub fn mro(self: &Rc<Self>) -> Vec<Rc<Class>> {
        let mut out: Vec<Rc<Class>> = Vec::new();
        fn visit(class: &Rc<Class>, out: &mut Vec<Rc<Class>>) {
            if out.iter().any(|c| Rc::ptr_eq(c, class)) {
                return;
            }
            out.push(class.clone());
            for base in &class.bases {
                visit(base, out);
            }
        }
        visit(self, &mut out);
        out
    }

    pub fn lookup(self: &Rc<Self>, name: &str) -> Option<Value> {
        self.mro()
            .iter()
            .find_map(|c| c.attrs.borrow().get(name).cloned())
    }

    pub fn is_subclass_of(self: &Rc<Self>, other: &Rc<Class>) -> bool {
        self.mro().iter().any(|c| Rc::ptr_eq(c, other))
    }

    pub fn inherits_named(self: &Rc<Self>, name: &str) -> bool {
        self.mro().iter().any(|c| c.name == name)
    }
}

pub struct Instance {
    pub class: Rc<Class>,
    pub attrs: RefCell<IndexMap<String, Value>>,
}

pub struct Builtin {
    pub name: String,
    pub func: Rc<NativeFn>,
    /// Bound to the instance when found on its class.
    pub is_method: bool,
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Rc::new(items))
    }

    pub fn dict(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        let mut dict = Dict::new();
        for (k, v) in entries {
            dict.insert(k, v);
        }
        Value::Dict(Rc::new(RefCell::new(dict)))
    }

    /// A dict with string keys, e.g. a keyword-argument map.
    pub fn from_kwargs(kwargs: &KwArgs) -> Self {
        Value::dict(kwargs.iter().map(|(k, v)| (Value::str(k.as_str()), v.clone())))
    }

    pub fn builtin<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Interpreter, &[Value], &KwArgs) -> Result<Value, Exception> + 'static,
    {
        Value::Builtin(Rc::new(Builtin {
            name: name.into(),
            func: Rc::new(func),
            is_method: false,
        }))
    }

    /// A native function that takes the instance as its first argument.
    pub fn native_method<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Interpreter, &[Value], &KwArgs) -> Result<Value, Exception> + 'static,
    {
        Value::Builtin(Rc::new(Builtin {
            name: name.into(),
            func: Rc::new(func),
            is_method: true,
        }))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::None => "NoneType".into(),
            Value::Bool(_) => "bool".into(),
            Value::Int(_) => "int".into(),
            Value::Float(_) => "float".into(),
            Value::Str(_) => "str".into(),
            Value::List(_) => "list".into(),
            Value::Tuple(_) => "tuple".into(),
            Value::Dict(_) => "dict".into(),
            Value::Function(_) => "function".into(),
            Value::BoundMethod(_) => "method".into(),
            Value::Class(_) => "type".into(),
            Value::Instance(inst) => inst.class.name.clone(),
            Value::Builtin(_) => "builtin_function_or_method".into(),
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(d) => !d.borrow().is_empty(),
            _ => true,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Int(i) => Some(*i as f64),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Snapshot of the items of a list or tuple.
    pub fn as_items(&self) -> Option<Vec<Value>> {
        match self {
            Value::List(items) => Some(items.borrow().clone()),
            Value::Tuple(items) => Some(items.as_ref().clone()),
            _ => None,
        }
    }

    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.chars().count()),
            Value::List(items) => Some(items.borrow().len()),
            Value::Tuple(items) => Some(items.len()),
            Value::Dict(d) => Some(d.borrow().len()),
            _ => None,
        }
    }

    /// Item at `index` of a list, tuple or string; negative counts from the end.
    pub fn index(&self, index: i64) -> Option<Value> {
        let resolve = |len: usize| -> Option<usize> {
            let i = if index < 0 { len as i64 + index } else { index };
            (0..len as i64).contains(&i).then_some(i as usize)
        };
        match self {
            Value::List(items) => {
                let items = items.borrow();
                resolve(items.len()).map(|i| items[i].clone())
            }
            Value::Tuple(items) => resolve(items.len()).map(|i| items[i].clone()),
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                resolve(chars.len()).map(|i| Value::Str(chars[i].to_string()))
            }
            _ => None,
        }
    }

    /// Instance or class attribute; functions found on the class are bound.
    pub fn get_attr(&self, name: &str) -> Option<Value> {
        match self {
            Value::Instance(inst) => {
                if let Some(v) = inst.attrs.borrow().get(name) {
                    return Some(v.clone());
                }
                let found = inst.class.lookup(name)?;
                let binds = match &found {
                    Value::Function(_) => true,
                    Value::Builtin(b) => b.is_method,
                    _ => false,
                };
                if binds {
                    return Some(Value::BoundMethod(Rc::new(BoundMethod {
                        receiver: self.clone(),
                        function: found,
                    })));
                }
                Some(found)
            }
            Value::Class(class) => {
                if name == "__name__" {
                    return Some(Value::str(class.name.as_str()));
                }
                class.lookup(name)
            }
            Value::Function(func) if name == "__name__" => Some(Value::str(func.name.as_str())),
            _ => None,
        }
    }

    pub fn set_attr(&self, name: &str, value: Value) -> bool {
        match self {
            Value::Instance(inst) => {
                inst.attrs.borrow_mut().insert(name.to_string(), value);
                true
            }
            Value::Class(class) => {
                class.attrs.borrow_mut().insert(name.to_string(), value);
                true
            }
            _ => false,
        }
    }

    /// Equality as `==` sees it: numbers compare across int, float and bool.
    pub fn py_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (a, b) if a.is_number() && b.is_number() => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
            (Value::List(a), Value::List(b)) => {
                Rc::ptr_eq(a, b) || seq_eq(&a.borrow(), &b.borrow())
            }
            (Value::Tuple(a), Value::Tuple(b)) => seq_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).map(|w| v.py_eq(w)).unwrap_or(false))
            }
            _ => self.is_same(other),
        }
    }

    /// Identity as `is` sees it.
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::BoundMethod(a), Value::BoundMethod(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Ordering for `<` and friends; `None` when the types do not compare.
    pub fn py_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (a, b) if a.is_number() && b.is_number() => a.as_float()?.partial_cmp(&b.as_float()?),
            (Value::List(a), Value::List(b)) => seq_cmp(&a.borrow(), &b.borrow()),
            (Value::Tuple(a), Value::Tuple(b)) => seq_cmp(a, b),
            _ => None,
        }
    }

    fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_) | Value::Bool(_))
    }

    /// `repr()` text.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => quote_str(s),
            other => other.to_string(),
        }
    }
}

fn seq_eq(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.py_eq(y))
}

fn seq_cmp(a: &[Value], b: &[Value]) -> Option<Ordering> {
    for (x, y) in a.iter().zip(b) {
        if !x.py_eq(y) {
            return x.py_cmp(y);
        }
    }
    Some(a.len().cmp(&b.len()))
}

/// `str()` text.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |items: &[Value]| items.iter().map(Value::repr).collect::<Vec<_>>().join(", ");
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => f.write_str(&format_float(*x)),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => write!(f, "[{}]", join(&items.borrow())),
            Value::Tuple(items) if items.len() == 1 => write!(f, "({},)", items[0].repr()),
            Value::Tuple(items) => write!(f, "({})", join(items)),
            Value::Dict(d) => {
                let parts: Vec<String> = d
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.repr(), v.repr()))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::Function(func) => write!(f, "<function {}>", func.qualname),
            Value::BoundMethod(m) => match &m.function {
                Value::Function(func) => write!(f, "<bound method {}>", func.qualname),
                _ => f.write_str("<bound method>"),
            },
            Value::Class(class) => write!(f, "<class '{}'>", class.name),
            Value::Instance(inst) => {
                if inst.class.inherits_named("BaseException") {
                    let message = inst
                        .attrs
                        .borrow()
                        .get("args")
                        .and_then(Value::as_items)
                        .and_then(|args| args.first().map(|a| a.to_string()))
                        .unwrap_or_default();
                    f.write_str(&message)
                } else {
                    write!(f, "<{} object>", inst.class.name)
                }
            }
            Value::Builtin(b) => write!(f, "<built-in function {}>", b.name),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.py_eq(other)
    }
}

impl From<&Literal> for Value {
    fn from(lit: &Literal) -> Self {
        match lit {
            Literal::None => Value::None,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::Int(*i),
            Literal::Float(x) => Value::Float(*x),
            Literal::Str(s) => Value::Str(s.clone()),
            Literal::List(items) => Value::list(items.iter().map(Value::from).collect()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::list(v)
    }
}

/// An exception raised by woven code, a callback or the runtime.
///
/// Host code creates exceptions by class name; the interpreter materialises
/// an instance of the matching builtin class when the exception is caught.
#[derive(Clone)]
pub struct Exception {
    pub class_name: String,
    pub message: String,
    /// The raised instance, or `None` for host-created exceptions.
    pub value: Value,
}

impl Exception {
    pub fn new(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: message.into(),
            value: Value::None,
        }
    }

    /// Wrap a raised exception instance.
    pub fn from_instance(value: Value) -> Self {
        let class_name = match &value {
            Value::Instance(inst) => inst.class.name.clone(),
            other => other.type_name(),
        };
        Self {
            class_name,
            message: value.to_string(),
            value,
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new("ValueError", message)
    }

    pub fn runtime_error(message: impl Into<String>) -> Self {
        Self::new("RuntimeError", message)
    }

    pub fn name_error(name: &str) -> Self {
        Self::new("NameError", format!("name '{name}' is not defined"))
    }

    pub fn attribute_error(value: &Value, attr: &str) -> Self {
        Self::new(
            "AttributeError",
            format!("'{}' object has no attribute '{attr}'", value.type_name()),
        )
    }

    pub fn key_error(key: &Value) -> Self {
        Self::new("KeyError", key.repr())
    }

    pub fn index_error(what: &str) -> Self {
        Self::new("IndexError", format!("{what} index out of range"))
    }

    pub fn zero_division() -> Self {
        Self::new("ZeroDivisionError", "division by zero")
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str(&self.class_name)
        } else {
            write!(f, "{}: {}", self.class_name, self.message)
        }
    }
}

impl fmt::Debug for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Exception({self})")
    }
}

impl std::error::Error for Exception {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_compare_across_types() {
        assert!(Value::Int(1).py_eq(&Value::Float(1.0)));
        assert!(Value::Bool(true).py_eq(&Value::Int(1)));
        assert_eq!(
            Value::Int(2).py_cmp(&Value::Float(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::str("a").py_cmp(&Value::Int(1)), None);
    }

    #[test]
    fn lists_share_interior() {
        let a = Value::list(vec![Value::Int(1)]);
        let b = a.clone();
        if let Value::List(items) = &b {
            items.borrow_mut().push(Value::Int(2));
        }
        assert_eq!(a.len(), Some(2));
        assert!(a.is_same(&b));
    }

    #[test]
    fn dict_keys_use_value_equality() {
        let d = Value::dict([(Value::Int(1), Value::str("one"))]);
        let Value::Dict(inner) = &d else { unreachable!() };
        assert_eq!(
            inner.borrow().get(&Value::Float(1.0)).map(|v| v.to_string()),
            Some("one".to_string())
        );
    }

    #[test]
    fn display_and_repr() {
        let v = Value::list(vec![Value::str("a"), Value::Float(2.0), Value::None]);
        assert_eq!(v.to_string(), "['a', 2.0, None]");
        assert_eq!(Value::tuple(vec![Value::Int(1)]).to_string(), "(1,)");
        assert_eq!(Value::str("x").repr(), "'x'");
    }

    #[test]
    fn negative_index_counts_from_end() {
        let v = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(v.index(-1), Some(Value::Int(2)));
        assert_eq!(v.index(2), None);
    }

    #[test]
    fn exception_display() {
        let e = Exception::type_error("multiple values for keyword argument 'a'");
        assert_eq!(e.to_string(), "TypeError: multiple values for keyword argument 'a'");
    }
}
