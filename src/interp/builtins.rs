//! Builtin exception classes, functions and container methods.

use super::eval::binop;
use super::Interpreter;
use crate::ast::BinOp;
use crate::value::{Class, Dict, Exception, KwArgs, Value};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

type BuiltinFn = fn(&Interpreter, &[Value], &KwArgs) -> Result<Value, Exception>;

/// Exception classes and their direct base, parents first.
const EXCEPTIONS: &[(&str, Option<&str>)] = &[
    ("BaseException", None),
    ("Exception", Some("BaseException")),
    ("ArithmeticError", Some("Exception")),
    ("ZeroDivisionError", Some("ArithmeticError")),
    ("OverflowError", Some("ArithmeticError")),
    ("LookupError", Some("Exception")),
    ("KeyError", Some("LookupError")),
    ("IndexError", Some("LookupError")),
    ("ValueError", Some("Exception")),
    ("TypeError", Some("Exception")),
    ("AttributeError", Some("Exception")),
    ("NameError", Some("Exception")),
    ("AssertionError", Some("Exception")),
    ("RuntimeError", Some("Exception")),
    ("NotImplementedError", Some("RuntimeError")),
    ("RecursionError", Some("RuntimeError")),
];

const FUNCTIONS: &[(&str, BuiltinFn)] = &[
    ("print", print),
    ("len", len),
    ("range", range),
    ("str", to_str),
    ("int", to_int),
    ("float", to_float),
    ("bool", to_bool),
    ("list", to_list),
    ("tuple", to_tuple),
    ("dict", to_dict),
    ("isinstance", isinstance),
    ("min", min),
    ("max", max),
    ("abs", abs),
    ("sum", sum),
    ("sorted", sorted),
    ("repr", repr),
    ("getattr", getattr),
    ("hasattr", hasattr),
    ("setattr", setattr),
    ("enumerate", enumerate),
    ("zip", zip),
];

pub(super) fn install() -> IndexMap<String, Value> {
    let mut out = IndexMap::new();
    let mut classes: IndexMap<&str, Rc<Class>> = IndexMap::new();
    for (name, parent) in EXCEPTIONS {
        let bases = parent
            .and_then(|p| classes.get(p).cloned())
            .into_iter()
            .collect();
        let class = Rc::new(Class::new(*name, bases));
        classes.insert(name, class.clone());
        out.insert(name.to_string(), Value::Class(class));
    }
    for (name, func) in FUNCTIONS {
        out.insert(name.to_string(), Value::builtin(*name, *func));
    }
    out
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), Exception> {
    let n = args.len();
    if (min..=max).contains(&n) {
        return Ok(());
    }
    Err(Exception::type_error(if min == max {
        format!("{name}() takes exactly {min} argument(s) ({n} given)")
    } else {
        format!("{name}() takes from {min} to {max} arguments ({n} given)")
    }))
}

fn kwarg<'a>(kwargs: &'a KwArgs, name: &str) -> Option<&'a Value> {
    kwargs.get(name).filter(|v| !v.is_none())
}

fn print(interp: &Interpreter, args: &[Value], kwargs: &KwArgs) -> Result<Value, Exception> {
    let sep = kwarg(kwargs, "sep").map(Value::to_string).unwrap_or_else(|| " ".into());
    let end = kwarg(kwargs, "end").map(Value::to_string).unwrap_or_else(|| "\n".into());
    let text = args.iter().map(Value::to_string).collect::<Vec<_>>().join(&sep);
    interp.write_output(&text);
    interp.write_output(&end);
    Ok(Value::None)
}

fn len(_: &Interpreter, args: &[Value], _: &KwArgs) -> Result<Value, Exception> {
    arity("len", args, 1, 1)?;
    args[0]
        .len()
        .map(|n| Value::Int(n as i64))
        .ok_or_else(|| {
            Exception::type_error(format!("object of type '{}' has no len()", args[0].type_name()))
        })
}

fn int_arg(name: &str, value: &Value) -> Result<i64, Exception> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(Exception::type_error(format!(
            "{name}() expects integer arguments, got '{}'",
            other.type_name()
        ))),
    }
}

fn range(_: &Interpreter, args: &[Value], _: &KwArgs) -> Result<Value, Exception> {
    arity("range", args, 1, 3)?;
    let ints = args
        .iter()
        .map(|a| int_arg("range", a))
        .collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => unreachable!("arity checked"),
    };
    if step == 0 {
        return Err(Exception::value_error("range() arg 3 must not be zero"));
    }
    let mut out = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        out.push(Value::Int(i));
        i += step;
    }
    Ok(Value::list(out))
}

fn to_str(_: &Interpreter, args: &[Value], _: &KwArgs) -> Result<Value, Exception> {
    arity("str", args, 0, 1)?;
    Ok(Value::str(args.first().map(Value::to_string).unwrap_or_default()))
}

fn to_int(_: &Interpreter, args: &[Value], _: &KwArgs) -> Result<Value, Exception> {
    arity("int", args, 0, 1)?;
    let Some(value) = args.first() else {
        return Ok(Value::Int(0));
    };
    match value {
        Value::Int(_) | Value::Bool(_) => Ok(Value::Int(value.as_int().unwrap_or(0))),
        Value::Float(x) if x.is_finite() && x.abs() < 9.2e18 => Ok(Value::Int(x.trunc() as i64)),
        Value::Float(_) => Err(Exception::new("OverflowError", "cannot convert float to integer")),
        Value::Str(s) => s
            .trim()
            .replace('_', "")
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| {
                Exception::value_error(format!("invalid literal for int() with base 10: {}", value.repr()))
            }),
        other => Err(Exception::type_error(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn to_float(_: &Interpreter, args: &[Value], _: &KwArgs) -> Result<Value, Exception> {
    arity("float", args, 0, 1)?;
    let Some(value) = args.first() else {
        return Ok(Value::Float(0.0));
    };
    match value {
        Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            Exception::value_error(format!("could not convert string to float: {}", value.repr()))
        }),
        other => other.as_float().map(Value::Float).ok_or_else(|| {
            Exception::type_error(format!(
                "float() argument must be a string or a number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

fn to_bool(_: &Interpreter, args: &[Value], _: &KwArgs) -> Result<Value, Exception> {
    arity("bool", args, 0, 1)?;
    Ok(Value::Bool(args.first().map(Value::truthy).unwrap_or(false)))
}

fn to_list(interp: &Interpreter, args: &[Value], _: &KwArgs) -> Result<Value, Exception> {
    arity("list", args, 0, 1)?;
    match args.first() {
        Some(v) => Ok(Value::list(interp.iterate(v)?)),
        None => Ok(Value::list(Vec::new())),
    }
}

fn to_tuple(interp: &Interpreter, args: &[Value], _: &KwArgs) -> Result<Value, Exception> {
    arity("tuple", args, 0, 1)?;
    match args.first() {
        Some(v) => Ok(Value::tuple(interp.iterate(v)?)),
        None => Ok(Value::tuple(Vec::new())),
    }
}

fn to_dict(interp: &Interpreter, args: &[Value], kwargs: &KwArgs) -> Result<Value, Exception> {
    arity("dict", args, 0, 1)?;
    let mut dict = Dict::new();
    if let Some(source) = args.first() {
        merge_into(interp, &mut dict, source)?;
    }
    for (k, v) in kwargs {
        dict.insert(Value::str(k.as_str()), v.clone());
    }
    Ok(Value::Dict(Rc::new(RefCell::new(dict))))
}

/// Copy a mapping or a sequence of pairs into `dict`.
fn merge_into(interp: &Interpreter, dict: &mut Dict, source: &Value) -> Result<(), Exception> {
    if let Value::Dict(d) = source {
        let entries: Vec<(Value, Value)> = d.borrow().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        for (k, v) in entries {
            dict.insert(k, v);
        }
        return Ok(());
    }
    for pair in interp.iterate(source)? {
        match interp.iterate(&pair)?.as_slice() {
            [k, v] => dict.insert(k.clone(), v.clone()),
            _ => {
                return Err(Exception::value_error(
                    "dictionary update sequence element has wrong length; 2 is required",
                ))
            }
        }
    }
    Ok(())
}

pub(super) fn is_instance(value: &Value, class: &Value) -> Result<bool, Exception> {
    match class {
        Value::Class(class) => Ok(match value {
            Value::Instance(inst) => inst.class.is_subclass_of(class),
            _ => false,
        }),
        Value::Builtin(b) => Ok(match b.name.as_str() {
            "int" => matches!(value, Value::Int(_) | Value::Bool(_)),
            name => value.type_name() == name,
        }),
        Value::Tuple(items) => {
            for item in items.iter() {
                if is_instance(value, item)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        _ => Err(Exception::type_error(
            "isinstance() arg 2 must be a type or tuple of types",
        )),
    }
}

fn isinstance(_: &Interpreter, args: &[Value], _: &KwArgs) -> Result<Value, Exception> {
    arity("isinstance", args, 2, 2)?;
    is_instance(&args[0], &args[1]).map(Value::Bool)
}

fn candidates(interp: &Interpreter, name: &str, args: &[Value]) -> Result<Vec<Value>, Exception> {
    let items = match args {
        [] => return Err(Exception::type_error(format!("{name} expected at least 1 argument, got 0"))),
        [single] => interp.iterate(single)?,
        many => many.to_vec(),
    };
    if items.is_empty() {
        return Err(Exception::value_error(format!("{name}() arg is an empty sequence")));
    }
    Ok(items)
}

fn keyed(interp: &Interpreter, items: Vec<Value>, key: Option<&Value>) -> Result<Vec<(Value, Value)>, Exception> {
    items
        .into_iter()
        .map(|item| {
            let k = match key {
                Some(f) => interp.call(f, vec![item.clone()], KwArgs::new())?,
                None => item.clone(),
            };
            Ok((k, item))
        })
        .collect()
}

fn order(a: &Value, b: &Value) -> Result<Ordering, Exception> {
    a.py_cmp(b).ok_or_else(|| {
        Exception::type_error(format!(
            "'<' not supported between instances of '{}' and '{}'",
            a.type_name(),
            b.type_name()
        ))
    })
}

fn extreme(interp: &Interpreter, name: &str, args: &[Value], kwargs: &KwArgs, want: Ordering) -> Result<Value, Exception> {
    let items = keyed(interp, candidates(interp, name, args)?, kwarg(kwargs, "key"))?;
    let mut iter = items.into_iter();
    let Some(mut best) = iter.next() else {
        return Err(Exception::value_error(format!("{name}() arg is an empty sequence")));
    };
    for item in iter {
        if order(&item.0, &best.0)? == want {
            best = item;
        }
    }
    Ok(best.1)
}

fn min(interp: &Interpreter, args: &[Value], kwargs: &KwArgs) -> Result<Value, Exception> {
    extreme(interp, "min", args, kwargs, Ordering::Less)
}

fn max(interp: &Interpreter, args: &[Value], kwargs: &KwArgs) -> Result<Value, Exception> {
    extreme(interp, "max", args, kwargs, Ordering::Greater)
}

fn abs(_: &Interpreter, args: &[Value], _: &KwArgs) -> Result<Value, Exception> {
    arity("abs", args, 1, 1)?;
    match &args[0] {
        Value::Float(x) => Ok(Value::Float(x.abs())),
        Value::Int(_) | Value::Bool(_) => args[0]
            .as_int()
            .and_then(i64::checked_abs)
            .map(Value::Int)
            .ok_or_else(|| Exception::new("OverflowError", "integer result out of range")),
        other => Err(Exception::type_error(format!(
            "bad operand type for abs(): '{}'",
            other.type_name()
        ))),
    }
}

fn sum(interp: &Interpreter, args: &[Value], kwargs: &KwArgs) -> Result<Value, Exception> {
    arity("sum", args, 1, 2)?;
    let mut total = args
        .get(1)
        .or_else(|| kwarg(kwargs, "start"))
        .cloned()
        .unwrap_or(Value::Int(0));
    for item in interp.iterate(&args[0])? {
        total = binop(&total, BinOp::Add, &item)?;
    }
    Ok(total)
}

fn sorted(interp: &Interpreter, args: &[Value], kwargs: &KwArgs) -> Result<Value, Exception> {
    arity("sorted", args, 1, 1)?;
    let reverse = kwarg(kwargs, "reverse").map(Value::truthy).unwrap_or(false);
    let mut items = keyed(interp, interp.iterate(&args[0])?, kwarg(kwargs, "key"))?;
    let mut error = None;
    items.sort_by(|a, b| match order(&a.0, &b.0) {
        Ok(ord) if reverse => ord.reverse(),
        Ok(ord) => ord,
        Err(err) => {
            error.get_or_insert(err);
            Ordering::Equal
        }
    });
    if let Some(err) = error {
        return Err(err);
    }
    Ok(Value::list(items.into_iter().map(|(_, v)| v).collect()))
}

fn repr(_: &Interpreter, args: &[Value], _: &KwArgs) -> Result<Value, Exception> {
    arity("repr", args, 1, 1)?;
    Ok(Value::str(args[0].repr()))
}

fn attr_name<'a>(fname: &str, value: &'a Value) -> Result<&'a str, Exception> {
    value
        .as_str()
        .ok_or_else(|| Exception::type_error(format!("{fname}(): attribute name must be string")))
}

fn getattr(interp: &Interpreter, args: &[Value], _: &KwArgs) -> Result<Value, Exception> {
    arity("getattr", args, 2, 3)?;
    let name = attr_name("getattr", &args[1])?;
    match interp.get_attribute(&args[0], name) {
        Err(err) if err.class_name == "AttributeError" && args.len() == 3 => Ok(args[2].clone()),
        other => other,
    }
}

fn hasattr(interp: &Interpreter, args: &[Value], _: &KwArgs) -> Result<Value, Exception> {
    arity("hasattr", args, 2, 2)?;
    let name = attr_name("hasattr", &args[1])?;
    Ok(Value::Bool(interp.get_attribute(&args[0], name).is_ok()))
}

fn setattr(_: &Interpreter, args: &[Value], _: &KwArgs) -> Result<Value, Exception> {
    arity("setattr", args, 3, 3)?;
    let name = attr_name("setattr", &args[1])?;
    if args[0].set_attr(name, args[2].clone()) {
        Ok(Value::None)
    } else {
        Err(Exception::attribute_error(&args[0], name))
    }
}

fn enumerate(interp: &Interpreter, args: &[Value], kwargs: &KwArgs) -> Result<Value, Exception> {
    arity("enumerate", args, 1, 2)?;
    let start = match args.get(1).or_else(|| kwarg(kwargs, "start")) {
        Some(v) => int_arg("enumerate", v)?,
        None => 0,
    };
    let items = interp.iterate(&args[0])?;
    Ok(Value::list(
        items
            .into_iter()
            .zip(start..)
            .map(|(item, i)| Value::tuple(vec![Value::Int(i), item]))
            .collect(),
    ))
}

fn zip(interp: &Interpreter, args: &[Value], _: &KwArgs) -> Result<Value, Exception> {
    let columns = args
        .iter()
        .map(|a| interp.iterate(a))
        .collect::<Result<Vec<_>, _>>()?;
    let len = columns.iter().map(Vec::len).min().unwrap_or(0);
    Ok(Value::list(
        (0..len)
            .map(|i| Value::tuple(columns.iter().map(|c| c[i].clone()).collect()))
            .collect(),
    ))
}

/// Bound method of a list, dict or str, when `name` is one we provide.
pub(super) fn method(receiver: &Value, name: &str) -> Option<Value> {
    let known = match receiver {
        Value::List(_) => matches!(
            name,
            "append" | "pop" | "extend" | "insert" | "index" | "count" | "remove" | "clear" | "copy"
        ),
        Value::Dict(_) => matches!(
            name,
            "get" | "keys" | "values" | "items" | "pop" | "update" | "setdefault" | "clear" | "copy"
        ),
        Value::Str(_) => matches!(
            name,
            "upper" | "lower" | "strip" | "startswith" | "endswith" | "split" | "join" | "replace"
        ),
        _ => false,
    };
    if !known {
        return None;
    }
    let bound = receiver.clone();
    let method = name.to_string();
    Some(Value::builtin(name, move |interp, args, kwargs| {
        match &bound {
            Value::List(items) => list_method(interp, items, &method, args),
            Value::Dict(dict) => dict_method(interp, dict, &method, args, kwargs),
            Value::Str(s) => str_method(interp, s, &method, args),
            other => Err(Exception::attribute_error(other, &method)),
        }
    }))
}

fn list_method(
    interp: &Interpreter,
    items: &Rc<RefCell<Vec<Value>>>,
    name: &str,
    args: &[Value],
) -> Result<Value, Exception> {
    match name {
        "append" => {
            arity("append", args, 1, 1)?;
            items.borrow_mut().push(args[0].clone());
            Ok(Value::None)
        }
        "extend" => {
            arity("extend", args, 1, 1)?;
            let extra = interp.iterate(&args[0])?;
            items.borrow_mut().extend(extra);
            Ok(Value::None)
        }
        "insert" => {
            arity("insert", args, 2, 2)?;
            let mut items = items.borrow_mut();
            let len = items.len() as i64;
            let i = int_arg("insert", &args[0])?;
            let i = if i < 0 { (len + i).max(0) } else { i.min(len) };
            items.insert(i as usize, args[1].clone());
            Ok(Value::None)
        }
        "pop" => {
            arity("pop", args, 0, 1)?;
            let mut items = items.borrow_mut();
            if items.is_empty() {
                return Err(Exception::new("IndexError", "pop from empty list"));
            }
            let len = items.len() as i64;
            let i = match args.first() {
                Some(v) => int_arg("pop", v)?,
                None => -1,
            };
            let i = if i < 0 { len + i } else { i };
            if !(0..len).contains(&i) {
                return Err(Exception::index_error("pop"));
            }
            Ok(items.remove(i as usize))
        }
        "index" => {
            arity("index", args, 1, 1)?;
            items
                .borrow()
                .iter()
                .position(|v| v.py_eq(&args[0]))
                .map(|i| Value::Int(i as i64))
                .ok_or_else(|| Exception::value_error(format!("{} is not in list", args[0].repr())))
        }
        "count" => {
            arity("count", args, 1, 1)?;
            let n = items.borrow().iter().filter(|v| v.py_eq(&args[0])).count();
            Ok(Value::Int(n as i64))
        }
        "remove" => {
            arity("remove", args, 1, 1)?;
            let mut items = items.borrow_mut();
            let i = items
                .iter()
                .position(|v| v.py_eq(&args[0]))
                .ok_or_else(|| Exception::value_error("list.remove(x): x not in list"))?;
            items.remove(i);
            Ok(Value::None)
        }
        "clear" => {
            items.borrow_mut().clear();
            Ok(Value::None)
        }
        _ => Ok(Value::list(items.borrow().clone())),
    }
}

fn dict_method(
    interp: &Interpreter,
    dict: &Rc<RefCell<Dict>>,
    name: &str,
    args: &[Value],
    kwargs: &KwArgs,
) -> Result<Value, Exception> {
    match name {
        "get" => {
            arity("get", args, 1, 2)?;
            let found = dict.borrow().get(&args[0]).cloned();
            Ok(found.unwrap_or_else(|| args.get(1).cloned().unwrap_or_default()))
        }
        "keys" => Ok(Value::list(dict.borrow().keys())),
        "values" => Ok(Value::list(dict.borrow().values())),
        "items" => Ok(Value::list(
            dict.borrow()
                .iter()
                .map(|(k, v)| Value::tuple(vec![k.clone(), v.clone()]))
                .collect(),
        )),
        "pop" => {
            arity("pop", args, 1, 2)?;
            let removed = dict.borrow_mut().remove(&args[0]);
            match (removed, args.get(1)) {
                (Some(v), _) => Ok(v),
                (None, Some(default)) => Ok(default.clone()),
                (None, None) => Err(Exception::key_error(&args[0])),
            }
        }
        "update" => {
            arity("update", args, 0, 1)?;
            let mut updated = dict.borrow().clone();
            if let Some(source) = args.first() {
                merge_into(interp, &mut updated, source)?;
            }
            for (k, v) in kwargs {
                updated.insert(Value::str(k.as_str()), v.clone());
            }
            *dict.borrow_mut() = updated;
            Ok(Value::None)
        }
        "setdefault" => {
            arity("setdefault", args, 1, 2)?;
            let mut d = dict.borrow_mut();
            if let Some(v) = d.get(&args[0]) {
                return Ok(v.clone());
            }
            let value = args.get(1).cloned().unwrap_or_default();
            d.insert(args[0].clone(), value.clone());
            Ok(value)
        }
        "clear" => {
            *dict.borrow_mut() = Dict::new();
            Ok(Value::None)
        }
        _ => Ok(Value::Dict(Rc::new(RefCell::new(dict.borrow().clone())))),
    }
}

fn str_arg<'a>(name: &str, value: &'a Value) -> Result<&'a str, Exception> {
    value.as_str().ok_or_else(|| {
        Exception::type_error(format!(
            "{name}() argument must be str, not {}",
            value.type_name()
        ))
    })
}

fn str_method(interp: &Interpreter, s: &str, name: &str, args: &[Value]) -> Result<Value, Exception> {
    match name {
        "upper" => Ok(Value::str(s.to_uppercase())),
        "lower" => Ok(Value::str(s.to_lowercase())),
        "strip" => {
            arity("strip", args, 0, 1)?;
            match args.first().filter(|v| !v.is_none()) {
                Some(chars) => {
                    let chars = str_arg("strip", chars)?;
                    Ok(Value::str(s.trim_matches(|c| chars.contains(c))))
                }
                None => Ok(Value::str(s.trim())),
            }
        }
        "startswith" => {
            arity("startswith", args, 1, 1)?;
            Ok(Value::Bool(s.starts_with(str_arg("startswith", &args[0])?)))
        }
        "endswith" => {
            arity("endswith", args, 1, 1)?;
            Ok(Value::Bool(s.ends_with(str_arg("endswith", &args[0])?)))
        }
        "split" => {
            arity("split", args, 0, 1)?;
            let parts: Vec<Value> = match args.first().filter(|v| !v.is_none()) {
                Some(sep) => {
                    let sep = str_arg("split", sep)?;
                    if sep.is_empty() {
                        return Err(Exception::value_error("empty separator"));
                    }
                    s.split(sep).map(Value::str).collect()
                }
                None => s.split_whitespace().map(Value::str).collect(),
            };
            Ok(Value::list(parts))
        }
        "join" => {
            arity("join", args, 1, 1)?;
            let parts = interp
                .iterate(&args[0])?
                .iter()
                .map(|v| str_arg("join", v).map(str::to_string))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::str(parts.join(s)))
        }
        _ => {
            arity("replace", args, 2, 2)?;
            let old = str_arg("replace", &args[0])?;
            let new = str_arg("replace", &args[1])?;
            Ok(Value::str(s.replace(old, new)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ModuleServices;

    fn interp() -> Interpreter {
        Interpreter::new("t", Rc::new(ModuleServices::default()))
    }

    fn call(name: &str, args: Vec<Value>, kwargs: KwArgs) -> Result<Value, Exception> {
        let interp = interp();
        let f = interp.builtin(name).unwrap();
        interp.call(&f, args, kwargs)
    }

    #[test]
    fn exception_hierarchy() {
        let builtins = install();
        let Some(Value::Class(key_error)) = builtins.get("KeyError") else { panic!() };
        assert!(key_error.inherits_named("LookupError"));
        assert!(key_error.inherits_named("BaseException"));
        assert!(!key_error.inherits_named("ValueError"));
    }

    #[test]
    fn conversions() {
        assert_eq!(call("int", vec![Value::str(" 42 ")], KwArgs::new()).unwrap(), Value::Int(42));
        assert_eq!(call("int", vec![Value::Float(-2.7)], KwArgs::new()).unwrap(), Value::Int(-2));
        let err = call("int", vec![Value::str("x")], KwArgs::new()).unwrap_err();
        assert_eq!(err.message, "invalid literal for int() with base 10: 'x'");
        assert_eq!(call("float", vec![Value::str("1.5")], KwArgs::new()).unwrap(), Value::Float(1.5));
        assert_eq!(call("bool", vec![Value::list(vec![])], KwArgs::new()).unwrap(), Value::Bool(false));
    }

    #[test]
    fn range_and_sorting() {
        let r = call("range", vec![Value::Int(5), Value::Int(0), Value::Int(-2)], KwArgs::new()).unwrap();
        assert_eq!(r.to_string(), "[5, 3, 1]");
        let sorted = call(
            "sorted",
            vec![Value::list(vec![Value::Int(2), Value::Int(3), Value::Int(1)])],
            KwArgs::from([("reverse".to_string(), Value::Bool(true))]),
        )
        .unwrap();
        assert_eq!(sorted.to_string(), "[3, 2, 1]");
        let mixed = Value::list(vec![Value::Int(1), Value::str("a")]);
        assert!(call("sorted", vec![mixed], KwArgs::new()).is_err());
    }

    #[test]
    fn min_max_sum() {
        let nums = Value::list(vec![Value::Int(4), Value::Int(-1), Value::Float(2.5)]);
        assert_eq!(call("min", vec![nums.clone()], KwArgs::new()).unwrap(), Value::Int(-1));
        assert_eq!(call("max", vec![Value::Int(1), Value::Int(9)], KwArgs::new()).unwrap(), Value::Int(9));
        assert_eq!(call("sum", vec![nums], KwArgs::new()).unwrap(), Value::Float(5.5));
        let err = call("max", vec![Value::list(vec![])], KwArgs::new()).unwrap_err();
        assert_eq!(err.class_name, "ValueError");
    }

    #[test]
    fn container_methods() {
        let list = Value::list(vec![Value::Int(1)]);
        let append = method(&list, "append").unwrap();
        let interp = interp();
        interp.call(&append, vec![Value::Int(2)], KwArgs::new()).unwrap();
        let pop = method(&list, "pop").unwrap();
        assert_eq!(interp.call(&pop, vec![Value::Int(0)], KwArgs::new()).unwrap(), Value::Int(1));
        assert_eq!(list.to_string(), "[2]");

        let d = Value::dict([(Value::str("a"), Value::Int(1))]);
        let get = method(&d, "get").unwrap();
        assert_eq!(
            interp.call(&get, vec![Value::str("b"), Value::Int(0)], KwArgs::new()).unwrap(),
            Value::Int(0)
        );

        let s = Value::str("a,b");
        let split = method(&s, "split").unwrap();
        assert_eq!(
            interp.call(&split, vec![Value::str(",")], KwArgs::new()).unwrap().to_string(),
            "['a', 'b']"
        );
        assert!(method(&Value::Int(1), "append").is_none());
    }

    #[test]
    fn isinstance_with_builtin_types() {
        let int = install().get("int").cloned().unwrap();
        assert!(is_instance(&Value::Bool(true), &int).unwrap());
        assert!(!is_instance(&Value::str("1"), &int).unwrap());
        assert!(is_instance(&Value::Int(1), &Value::Int(1)).is_err());
    }
}
