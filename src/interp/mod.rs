//! Tree-walking interpreter for woven modules.
//!
//! The interpreter executes the value-typed tree directly. Hook nodes left by
//! the weaver are evaluated in [`hooks`] against the module's
//! [`ModuleServices`] handle; everything else is ordinary evaluation.
//!
//! Generators run eagerly and return the list of produced values. Calling an
//! `async def` runs it to completion, so `await` simply yields its operand.

mod builtins;
mod eval;
mod hooks;
mod scope;

pub use scope::Scope;

use crate::ast::{ClassDef, ExceptHandler, Expr, ExprKind, FunctionDef, Module, Stmt, StmtKind};
use crate::runtime::ModuleServices;
use crate::value::{Class, Exception, Function, FunctionBody, Instance, KwArgs, Value};
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

/// Nested call limit before `RecursionError`.
const MAX_DEPTH: usize = 48;

/// Executes one module. Cloning shares the module state.
#[derive(Clone)]
pub struct Interpreter {
    inner: Rc<State>,
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("module_name", &self.inner.module_name)
            .finish_non_exhaustive()
    }
}

struct State {
    module_name: String,
    globals: Scope,
    builtins: IndexMap<String, Value>,
    output: RefCell<String>,
    services: Rc<ModuleServices>,
    depth: Cell<usize>,
}

pub(crate) enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

pub(crate) struct Frame {
    /// Where assignments bind.
    scope: Scope,
    /// What nested `def`s close over; differs from `scope` in class bodies.
    def_scope: Scope,
    qualprefix: String,
    func: Option<Rc<Function>>,
    produced: Option<Vec<Value>>,
    /// Exceptions being handled, innermost last; a bare `raise` re-raises it.
    handling: Vec<Exception>,
}

impl Frame {
    fn module(globals: Scope) -> Self {
        Self {
            scope: globals.clone(),
            def_scope: globals,
            qualprefix: String::new(),
            func: None,
            produced: None,
            handling: Vec::new(),
        }
    }

    fn function(scope: Scope, func: Rc<Function>) -> Self {
        Self {
            scope: scope.clone(),
            def_scope: scope,
            qualprefix: format!("{}.<locals>.", func.qualname),
            produced: func.is_generator.then(Vec::new),
            func: Some(func),
            handling: Vec::new(),
        }
    }
}

impl Interpreter {
    pub fn new(module_name: impl Into<String>, services: Rc<ModuleServices>) -> Self {
        let module_name = module_name.into();
        let globals = Scope::new();
        globals.set("__name__", Value::str(module_name.as_str()));
        Self {
            inner: Rc::new(State {
                module_name,
                globals,
                builtins: builtins::install(),
                output: RefCell::new(String::new()),
                services,
                depth: Cell::new(0),
            }),
        }
    }

    pub fn module_name(&self) -> &str {
        &self.inner.module_name
    }

    pub fn services(&self) -> &ModuleServices {
        &self.inner.services
    }

    pub fn globals(&self) -> &Scope {
        &self.inner.globals
    }

    /// A module-level name, or `Class.attr` for a class attribute.
    pub fn get_global(&self, name: &str) -> Option<Value> {
        let mut parts = name.split('.');
        let mut value = self.inner.globals.get_local(parts.next()?)?;
        for part in parts {
            value = value.get_attr(part)?;
        }
        Some(value)
    }

    /// Everything `print` wrote so far.
    pub fn output(&self) -> String {
        self.inner.output.borrow().clone()
    }

    pub fn take_output(&self) -> String {
        std::mem::take(&mut *self.inner.output.borrow_mut())
    }

    pub(crate) fn write_output(&self, text: &str) {
        self.inner.output.borrow_mut().push_str(text);
    }

    pub(crate) fn builtin(&self, name: &str) -> Option<Value> {
        self.inner.builtins.get(name).cloned()
    }

    /// Execute the module body in the module's global scope.
    pub fn run_module(&self, module: &Module) -> Result<(), Exception> {
        let mut frame = Frame::module(self.inner.globals.clone());
        self.exec_block(&module.body, &mut frame)?;
        tracing::debug!(module = %self.inner.module_name, "module executed");
        Ok(())
    }

    pub fn call(&self, callee: &Value, args: Vec<Value>, kwargs: KwArgs) -> Result<Value, Exception> {
        match callee {
            Value::Function(func) => self.call_function(func, args, kwargs),
            Value::BoundMethod(method) => {
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(method.receiver.clone());
                full.extend(args);
                self.call(&method.function, full, kwargs)
            }
            Value::Class(class) => self.instantiate(class, args, kwargs),
            Value::Builtin(builtin) => (builtin.func)(self, &args, &kwargs),
            other => Err(Exception::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    /// Look up `name` on `receiver` and call it.
    pub fn call_method(
        &self,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
        kwargs: KwArgs,
    ) -> Result<Value, Exception> {
        let method = self.get_attribute(receiver, name)?;
        self.call(&method, args, kwargs)
    }

    pub fn instantiate(&self, class: &Rc<Class>, args: Vec<Value>, kwargs: KwArgs) -> Result<Value, Exception> {
        let instance = Value::Instance(Rc::new(Instance {
            class: class.clone(),
            attrs: RefCell::new(IndexMap::new()),
        }));
        let is_exception = class.inherits_named("BaseException");
        if is_exception {
            instance.set_attr("args", Value::tuple(args.clone()));
        }
        match class.lookup("__init__") {
            Some(init) => {
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(instance.clone());
                full.extend(args);
                self.call(&init, full, kwargs)?;
            }
            None if !is_exception && (!args.is_empty() || !kwargs.is_empty()) => {
                return Err(Exception::type_error(format!("{}() takes no arguments", class.name)));
            }
            None => {}
        }
        Ok(instance)
    }

    /// The instance behind an exception, creating one for host-raised errors.
    pub fn exception_value(&self, exc: &Exception) -> Value {
        if let Value::Instance(_) = &exc.value {
            return exc.value.clone();
        }
        let class = match self.builtin(&exc.class_name) {
            Some(Value::Class(class)) => class,
            _ => {
                let base = match self.builtin("Exception") {
                    Some(Value::Class(base)) => vec![base],
                    _ => Vec::new(),
                };
                Rc::new(Class::new(exc.class_name.as_str(), base))
            }
        };
        let args = if exc.message.is_empty() {
            Vec::new()
        } else {
            vec![Value::str(exc.message.as_str())]
        };
        let instance = Value::Instance(Rc::new(Instance {
            class,
            attrs: RefCell::new(IndexMap::new()),
        }));
        instance.set_attr("args", Value::tuple(args));
        instance
    }

    fn call_function(&self, func: &Rc<Function>, args: Vec<Value>, kwargs: KwArgs) -> Result<Value, Exception> {
        let depth = self.inner.depth.get();
        if depth >= MAX_DEPTH {
            return Err(Exception::new("RecursionError", "maximum recursion depth exceeded"));
        }
        self.inner.depth.set(depth + 1);
        let result = self.run_function(func, args, kwargs);
        self.inner.depth.set(depth);
        result
    }

    fn run_function(&self, func: &Rc<Function>, args: Vec<Value>, kwargs: KwArgs) -> Result<Value, Exception> {
        let scope = func.closure.child();
        self.bind_arguments(func, &scope, args, kwargs)?;
        let mut frame = Frame::function(scope, func.clone());
        match &func.body {
            FunctionBody::Lambda(expr) => self.eval(expr, &mut frame),
            FunctionBody::Block(body) => {
                let flow = self.exec_block(body, &mut frame)?;
                if let Some(produced) = frame.produced.take() {
                    return Ok(Value::list(produced));
                }
                match flow {
                    Flow::Return(value) => Ok(value),
                    _ => Ok(Value::None),
                }
            }
        }
    }

    fn bind_arguments(
        &self,
        func: &Function,
        scope: &Scope,
        args: Vec<Value>,
        kwargs: KwArgs,
    ) -> Result<(), Exception> {
        let params = &func.params;
        let name = &func.name;
        let given = args.len();
        let mut bound: HashSet<String> = HashSet::new();

        let mut args = args.into_iter();
        for param in &params.positional {
            let Some(value) = args.next() else { break };
            scope.set(param.name.as_str(), value);
            bound.insert(param.name.clone());
        }
        let extra: Vec<Value> = args.collect();
        match &params.vararg {
            Some(vararg) => scope.set(vararg.as_str(), Value::tuple(extra)),
            None if !extra.is_empty() => {
                return Err(Exception::type_error(format!(
                    "{name}() takes {} positional arguments but {given} were given",
                    params.positional.len()
                )));
            }
            None => {}
        }

        let mut rest = KwArgs::new();
        for (key, value) in kwargs {
            let known = params
                .positional
                .iter()
                .chain(&params.kwonly)
                .any(|p| p.name == key);
            if known {
                if bound.contains(&key) {
                    return Err(Exception::type_error(format!(
                        "{name}() got multiple values for argument '{key}'"
                    )));
                }
                scope.set(key.as_str(), value);
                bound.insert(key);
            } else if params.kwarg.is_some() {
                rest.insert(key, value);
            } else {
                return Err(Exception::type_error(format!(
                    "{name}() got an unexpected keyword argument '{key}'"
                )));
            }
        }

        for param in params.positional.iter().chain(&params.kwonly) {
            if bound.contains(&param.name) {
                continue;
            }
            match func.defaults.get(&param.name) {
                Some(default) => scope.set(param.name.as_str(), default.clone()),
                None => {
                    return Err(Exception::type_error(format!(
                        "{name}() missing required argument: '{}'",
                        param.name
                    )))
                }
            }
        }
        if let Some(kwarg) = &params.kwarg {
            scope.set(kwarg.as_str(), Value::from_kwargs(&rest));
        }
        Ok(())
    }

    pub(crate) fn exec_block(&self, body: &[Stmt], frame: &mut Frame) -> Result<Flow, Exception> {
        for stmt in body {
            match self.exec_stmt(stmt, frame)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&self, stmt: &Stmt, frame: &mut Frame) -> Result<Flow, Exception> {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval(expr, frame)?;
            }
            StmtKind::Assign { targets, value } => {
                let value = self.eval(value, frame)?;
                for target in targets {
                    self.assign(target, value.clone(), frame)?;
                }
            }
            StmtKind::AnnAssign { target, value, .. } => {
                if let Some(value) = value {
                    let value = self.eval(value, frame)?;
                    self.assign(target, value, frame)?;
                }
            }
            StmtKind::AugAssign { target, op, value } => {
                let current = self.eval(target, frame)?;
                let operand = self.eval(value, frame)?;
                let updated = self.augmented(current, *op, operand)?;
                self.assign(target, updated, frame)?;
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, frame)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::If { test, body, orelse } => {
                let branch = if self.eval(test, frame)?.truthy() { body } else { orelse };
                return self.exec_block(branch, frame);
            }
            StmtKind::While { test, body, orelse } => {
                while self.eval(test, frame)?.truthy() {
                    match self.exec_block(body, frame)? {
                        Flow::Break => return Ok(Flow::Normal),
                        Flow::Normal | Flow::Continue => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                return self.exec_block(orelse, frame);
            }
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                let iterable = self.eval(iter, frame)?;
                for item in self.iterate(&iterable)? {
                    self.assign(target, item, frame)?;
                    match self.exec_block(body, frame)? {
                        Flow::Break => return Ok(Flow::Normal),
                        Flow::Normal | Flow::Continue => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                return self.exec_block(orelse, frame);
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Pass => {}
            StmtKind::Raise { exc, cause } => {
                let Some(expr) = exc else {
                    return Err(frame
                        .handling
                        .last()
                        .cloned()
                        .unwrap_or_else(|| Exception::runtime_error("No active exception to reraise")));
                };
                let value = self.eval(expr, frame)?;
                if let Some(cause) = cause {
                    self.eval(cause, frame)?;
                }
                return Err(self.raise_value(value));
            }
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                let outcome = match self.exec_block(body, frame) {
                    Ok(Flow::Normal) => self.exec_block(orelse, frame),
                    Ok(flow) => Ok(flow),
                    Err(exc) => self.handle_exception(exc, handlers, frame),
                };
                if finalbody.is_empty() {
                    return outcome;
                }
                return match self.exec_block(finalbody, frame)? {
                    Flow::Normal => outcome,
                    flow => Ok(flow),
                };
            }
            StmtKind::Assert { test, msg } => {
                if !self.eval(test, frame)?.truthy() {
                    let message = match msg {
                        Some(msg) => self.eval(msg, frame)?.to_string(),
                        None => String::new(),
                    };
                    return Err(Exception::new("AssertionError", message));
                }
            }
            StmtKind::FunctionDef(def) => {
                let value = self.define_function(def, frame)?;
                frame.scope.set(def.name.as_str(), value);
            }
            StmtKind::ClassDef(def) => {
                let value = self.define_class(def, frame)?;
                frame.scope.set(def.name.as_str(), value);
            }
            StmtKind::Hook(hook) => return self.exec_hook(hook, frame),
        }
        Ok(Flow::Normal)
    }

    fn handle_exception(
        &self,
        exc: Exception,
        handlers: &[ExceptHandler],
        frame: &mut Frame,
    ) -> Result<Flow, Exception> {
        let value = self.exception_value(&exc);
        for handler in handlers {
            if let Some(class_expr) = &handler.class {
                let classes = self.eval(class_expr, frame)?;
                if !exception_matches(&value, &classes)? {
                    continue;
                }
            }
            if let Some(name) = &handler.name {
                frame.scope.set(name.as_str(), value.clone());
            }
            frame.handling.push(Exception {
                value: value.clone(),
                ..exc
            });
            let result = self.exec_block(&handler.body, frame);
            frame.handling.pop();
            return result;
        }
        Err(exc)
    }

    /// Turn the operand of `raise` into an exception.
    fn raise_value(&self, value: Value) -> Exception {
        let value = match value {
            Value::Class(class) if class.inherits_named("BaseException") => {
                match self.instantiate(&class, Vec::new(), KwArgs::new()) {
                    Ok(instance) => instance,
                    Err(err) => return err,
                }
            }
            other => other,
        };
        match &value {
            Value::Instance(inst) if inst.class.inherits_named("BaseException") => {
                Exception::from_instance(value)
            }
            _ => Exception::type_error("exceptions must derive from BaseException"),
        }
    }

    fn define_function(&self, def: &FunctionDef, frame: &mut Frame) -> Result<Value, Exception> {
        let mut defaults = IndexMap::new();
        for param in def.params.positional.iter().chain(&def.params.kwonly) {
            if let Some(default) = &param.default {
                defaults.insert(param.name.clone(), self.eval(default, frame)?);
            }
        }
        let func = Value::Function(Rc::new(Function {
            name: def.name.clone(),
            qualname: format!("{}{}", frame.qualprefix, def.name),
            params: Rc::new(def.params.clone()),
            body: FunctionBody::Block(Rc::new(def.body.clone())),
            defaults,
            is_async: def.is_async,
            is_generator: def.is_generator,
            closure: frame.def_scope.clone(),
        }));
        self.decorate(func, &def.decorators, frame)
    }

    fn define_class(&self, def: &ClassDef, frame: &mut Frame) -> Result<Value, Exception> {
        let mut bases = Vec::with_capacity(def.bases.len());
        for base in &def.bases {
            match self.eval(base, frame)? {
                Value::Class(class) => bases.push(class),
                other => {
                    return Err(Exception::type_error(format!(
                        "class bases must be classes, got '{}'",
                        other.type_name()
                    )))
                }
            }
        }
        let class_scope = frame.scope.child();
        let mut body_frame = Frame {
            scope: class_scope.clone(),
            def_scope: frame.def_scope.clone(),
            qualprefix: format!("{}{}.", frame.qualprefix, def.name),
            func: None,
            produced: None,
            handling: Vec::new(),
        };
        self.exec_block(&def.body, &mut body_frame)?;
        let class = Rc::new(Class::new(def.name.as_str(), bases));
        class.attrs.borrow_mut().extend(class_scope.snapshot());
        self.decorate(Value::Class(class), &def.decorators, frame)
    }

    fn decorate(&self, mut value: Value, decorators: &[Expr], frame: &mut Frame) -> Result<Value, Exception> {
        for decorator in decorators.iter().rev() {
            let decorator = self.eval(decorator, frame)?;
            value = self.call(&decorator, vec![value], KwArgs::new())?;
        }
        Ok(value)
    }

    pub(crate) fn assign(&self, target: &Expr, value: Value, frame: &mut Frame) -> Result<(), Exception> {
        match &target.kind {
            ExprKind::Name(name) => {
                frame.scope.set(name.as_str(), value);
                Ok(())
            }
            ExprKind::Attribute { value: object, attr } => {
                let object = self.eval(object, frame)?;
                if object.set_attr(attr, value) {
                    Ok(())
                } else {
                    Err(Exception::attribute_error(&object, attr))
                }
            }
            ExprKind::Subscript { value: container, index } => {
                let container = self.eval(container, frame)?;
                let index = self.eval(index, frame)?;
                self.set_item(&container, index, value)
            }
            ExprKind::Tuple(items) | ExprKind::List(items) => {
                let values = self.iterate(&value)?;
                if values.len() < items.len() {
                    return Err(Exception::value_error(format!(
                        "not enough values to unpack (expected {}, got {})",
                        items.len(),
                        values.len()
                    )));
                }
                if values.len() > items.len() {
                    return Err(Exception::value_error(format!(
                        "too many values to unpack (expected {})",
                        items.len()
                    )));
                }
                for (item, value) in items.iter().zip(values) {
                    self.assign(item, value, frame)?;
                }
                Ok(())
            }
            _ => Err(Exception::type_error("cannot assign to expression")),
        }
    }
}

fn exception_matches(value: &Value, classes: &Value) -> Result<bool, Exception> {
    match classes {
        Value::Class(class) => Ok(match value {
            Value::Instance(inst) => inst.class.is_subclass_of(class),
            _ => false,
        }),
        Value::Tuple(items) => {
            for item in items.iter() {
                if exception_matches(value, item)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        _ => Err(Exception::type_error(
            "catching classes that do not inherit from BaseException is not allowed",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ts::parse_module;

    fn run(source: &str) -> Interpreter {
        let module = parse_module(source).unwrap();
        let interp = Interpreter::new("test", Rc::new(ModuleServices::default()));
        interp.run_module(&module).unwrap();
        interp
    }

    fn call(interp: &Interpreter, name: &str, args: Vec<Value>) -> Result<Value, Exception> {
        let f = interp.get_global(name).unwrap();
        interp.call(&f, args, KwArgs::new())
    }

    #[test]
    fn classes_methods_and_init() {
        let interp = run(
            "class Player:\n    def __init__(self, health):\n        self.health = health\n\n    def hit(self, n=1):\n        self.health -= n\n        return self.health\n\n\ndef main():\n    p = Player(10)\n    p.hit()\n    return p.hit(4)\n",
        );
        assert_eq!(call(&interp, "main", vec![]).unwrap(), Value::Int(5));
    }

    #[test]
    fn argument_binding_errors() {
        let interp = run("def f(a, b=2, *rest, c, **kw):\n    return [a, b, rest, c, kw]\n");
        let f = interp.get_global("f").unwrap();
        let out = interp
            .call(
                &f,
                vec![Value::Int(1), Value::Int(3), Value::Int(4)],
                KwArgs::from([("c".to_string(), Value::Int(5)), ("z".to_string(), Value::Int(6))]),
            )
            .unwrap();
        assert_eq!(out.to_string(), "[1, 3, (4,), 5, {'z': 6}]");

        let err = interp.call(&f, vec![Value::Int(1)], KwArgs::new()).unwrap_err();
        assert_eq!(err.message, "f() missing required argument: 'c'");
        let err = interp
            .call(&f, vec![Value::Int(1)], KwArgs::from([("a".to_string(), Value::Int(1))]))
            .unwrap_err();
        assert_eq!(err.message, "f() got multiple values for argument 'a'");
    }

    #[test]
    fn try_except_finally_and_reraise() {
        let interp = run(
            "log = []\n\ndef risky(x):\n    try:\n        if x:\n            raise ValueError('bad')\n        log.append('ok')\n    except (KeyError, ValueError) as e:\n        log.append(str(e))\n        return 1\n    else:\n        log.append('else')\n    finally:\n        log.append('finally')\n    return 0\n\n\ndef again():\n    try:\n        {}['k']\n    except KeyError:\n        raise\n",
        );
        assert_eq!(call(&interp, "risky", vec![Value::Bool(true)]).unwrap(), Value::Int(1));
        assert_eq!(call(&interp, "risky", vec![Value::Bool(false)]).unwrap(), Value::Int(0));
        assert_eq!(
            interp.get_global("log").unwrap().to_string(),
            "['bad', 'finally', 'ok', 'else', 'finally']"
        );
        let err = call(&interp, "again", vec![]).unwrap_err();
        assert_eq!(err.class_name, "KeyError");
    }

    #[test]
    fn generators_run_eagerly() {
        let interp = run("def gen(n):\n    for i in range(n):\n        if i % 2 == 0:\n            yield i * 10\n");
        assert_eq!(call(&interp, "gen", vec![Value::Int(5)]).unwrap().to_string(), "[0, 20, 40]");
    }

    #[test]
    fn async_functions_complete_synchronously() {
        let interp = run("async def fetch(x):\n    return x + 1\n\nasync def main():\n    v = await fetch(1)\n    return v * 2\n");
        assert_eq!(call(&interp, "main", vec![]).unwrap(), Value::Int(4));
    }

    #[test]
    fn closures_and_recursion_limit() {
        let interp = run(
            "def counter():\n    total = [0]\n    def bump(n):\n        total[0] += n\n        return total[0]\n    return bump\n\n\ndef forever(n):\n    return forever(n + 1)\n",
        );
        let bump = call(&interp, "counter", vec![]).unwrap();
        interp.call(&bump, vec![Value::Int(2)], KwArgs::new()).unwrap();
        assert_eq!(interp.call(&bump, vec![Value::Int(3)], KwArgs::new()).unwrap(), Value::Int(5));
        let err = call(&interp, "forever", vec![Value::Int(0)]).unwrap_err();
        assert_eq!(err.class_name, "RecursionError");
    }

    #[test]
    fn inheritance_and_custom_exceptions() {
        let interp = run(
            "class GameError(Exception):\n    pass\n\nclass Base:\n    def name(self):\n        return 'base'\n\n    def greet(self):\n        return 'hi ' + self.name()\n\nclass Child(Base):\n    def name(self):\n        return 'child'\n\n\ndef main():\n    try:\n        raise GameError('boom')\n    except Exception as e:\n        return [Child().greet(), isinstance(e, GameError), str(e)]\n",
        );
        assert_eq!(
            call(&interp, "main", vec![]).unwrap().to_string(),
            "['hi child', True, 'boom']"
        );
    }

    #[test]
    fn print_is_captured() {
        let interp = run("print('a', 1, sep='-')\nprint('b', end='')\n");
        assert_eq!(interp.take_output(), "a-1\nb");
        assert_eq!(interp.output(), "");
    }

    #[test]
    fn unpacking_and_loops() {
        let interp = run(
            "def f():\n    a, b = 1, 2\n    out = []\n    for i, v in enumerate(['x', 'y']):\n        if i == 1:\n            break\n        out.append(v)\n    else:\n        out.append('never')\n    while a < 4:\n        a += 1\n        if a == 3:\n            continue\n        out.append(a)\n    return [a, b, out]\n",
        );
        assert_eq!(call(&interp, "f", vec![]).unwrap().to_string(), "[4, 2, ['x', 2, 4]]");
    }
}
