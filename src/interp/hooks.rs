//! Evaluation of the hook nodes left by the weaver.
//!
//! Each hook builds a context for its point, runs the point's chain from the
//! module's [`crate::runtime::InjectorMap`] and applies the decision. A point
//! without callbacks costs one map lookup.

use super::{Flow, Frame, Interpreter};
use crate::ast::{HookCall, HookExpr, HookStmt};
use crate::model::{InjectionKind, PointKey};
use crate::runtime::{dispatch, dispatch_async, CallbackInfo, Context, Invocation, OriginalFn};
use crate::value::{Exception, KwArgs, Value};
use std::rc::Rc;

/// The running function as callbacks see it.
#[derive(Clone, Default)]
struct Caller {
    owner: Value,
    args: Vec<Value>,
    kwargs: KwArgs,
    locals: Value,
}

impl Caller {
    fn context(&self) -> Context {
        let mut ctx = Context::new();
        ctx.insert("self".into(), self.owner.clone());
        ctx.insert("args".into(), Value::list(self.args.clone()));
        ctx.insert("kwargs".into(), Value::from_kwargs(&self.kwargs));
        ctx.insert("locals".into(), self.locals.clone());
        ctx
    }
}

/// Value at an expression point after the chain ran.
fn decide(info: &CallbackInfo, original: Value) -> Value {
    if info.is_cancelled() {
        info.result().clone()
    } else if info.value_set() {
        info.new_value().clone()
    } else {
        original
    }
}

impl Interpreter {
    /// Owner, arguments and locals of the function executing `frame`.
    ///
    /// The owner is the first positional parameter; it is left out of `args`
    /// only when it is spelled `self`.
    fn caller(&self, frame: &Frame) -> Caller {
        let locals = Value::dict(
            frame
                .scope
                .snapshot()
                .into_iter()
                .map(|(k, v)| (Value::str(k), v)),
        );
        let Some(func) = &frame.func else {
            return Caller {
                locals,
                ..Caller::default()
            };
        };
        let params = &func.params;
        let get = |name: &str| frame.scope.get_local(name).unwrap_or_default();

        let owner = params
            .positional
            .first()
            .map(|p| get(&p.name))
            .unwrap_or_default();
        let mut args: Vec<Value> = params
            .positional
            .iter()
            .enumerate()
            .filter(|(i, p)| !(*i == 0 && p.name == "self"))
            .map(|(_, p)| get(&p.name))
            .collect();
        if let Some(items) = params.vararg.as_deref().and_then(|v| get(v).as_items()) {
            args.extend(items);
        }
        let kwargs = match params.kwarg.as_deref().map(get) {
            Some(Value::Dict(d)) => d
                .borrow()
                .iter()
                .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), v.clone())))
                .collect(),
            _ => KwArgs::new(),
        };
        Caller {
            owner,
            args,
            kwargs,
            locals,
        }
    }

    fn has_callbacks(&self, point: &PointKey) -> bool {
        !self.services().injectors.chain(point).is_empty()
    }

    fn run_point(
        &self,
        point: &PointKey,
        is_async: bool,
        info: &mut CallbackInfo,
        ctx: Context,
        invocation: Invocation<'_>,
    ) -> Result<Value, Exception> {
        let chain = self.services().injectors.chain(point);
        if is_async {
            dispatch_async(chain, info, ctx, invocation)
        } else {
            dispatch(chain, info, ctx, invocation)
        }
    }

    /// ENTRY, PARAMETER and EXCEPTION points.
    pub(super) fn exec_hook(&self, hook: &HookStmt, frame: &mut Frame) -> Result<Flow, Exception> {
        if !self.has_callbacks(&hook.point) {
            return Ok(Flow::Normal);
        }
        let subject = match &hook.subject {
            Some(expr) => self.eval(expr, frame)?,
            None => Value::None,
        };
        let caller = self.caller(frame);
        let mut ctx = caller.context();
        let mut args = caller.args.clone();
        match hook.point.kind() {
            InjectionKind::Parameter => {
                let name = hook.point.descriptor.target_name().unwrap_or_default();
                ctx.insert("param".into(), Value::str(name));
                ctx.insert("value".into(), subject);
            }
            InjectionKind::Exception => {
                ctx.insert("exception".into(), subject);
                args = Vec::new();
            }
            _ => {}
        }

        let mut info = CallbackInfo::new(&hook.point);
        let invocation = Invocation {
            owner: &caller.owner,
            args: &args,
            kwargs: &caller.kwargs,
        };
        let result = self.run_point(&hook.point, hook.is_async, &mut info, ctx, invocation)?;
        if info.is_cancelled() {
            return Ok(Flow::Return(result));
        }
        if let Some(name) = &hook.rebind {
            if info.value_set() {
                frame.scope.set(name.clone(), info.new_value().clone());
            }
        }
        Ok(Flow::Normal)
    }

    /// CONSTANT, ATTRIBUTE_WRITE, PRODUCED_VALUE and PRE_RETURN points.
    pub(super) fn eval_hook(&self, hook: &HookExpr, frame: &mut Frame) -> Result<Value, Exception> {
        let value = self.eval(&hook.value, frame)?;
        if !self.has_callbacks(&hook.point) {
            return Ok(value);
        }
        let caller = self.caller(frame);
        // Constant callbacks get no positional or keyword arguments.
        let no_kwargs = KwArgs::new();
        let (ctx, args, kwargs) = match hook.point.kind() {
            InjectionKind::PreReturn => {
                let mut ctx = caller.context();
                ctx.insert("return_value".into(), value.clone());
                ctx.insert("value".into(), value.clone());
                (ctx, caller.args.clone(), &caller.kwargs)
            }
            InjectionKind::Constant => {
                let mut ctx = Context::new();
                ctx.insert("value".into(), value.clone());
                ctx.insert("const_value".into(), value.clone());
                (ctx, Vec::new(), &no_kwargs)
            }
            InjectionKind::AttributeWrite => {
                let attr = hook.point.descriptor.target_name().unwrap_or_default();
                let mut ctx = Context::new();
                ctx.insert("value".into(), value.clone());
                ctx.insert("attr".into(), Value::str(attr));
                (ctx, vec![value.clone()], &caller.kwargs)
            }
            _ => {
                let mut ctx = Context::new();
                ctx.insert("value".into(), value.clone());
                ctx.insert("yield_value".into(), value.clone());
                (ctx, vec![value.clone()], &caller.kwargs)
            }
        };

        let mut info = CallbackInfo::new(&hook.point);
        let invocation = Invocation {
            owner: &caller.owner,
            args: &args,
            kwargs,
        };
        self.run_point(&hook.point, hook.is_async, &mut info, ctx, invocation)?;
        Ok(decide(&info, value))
    }

    /// CALL_SITE points. The callee and arguments are evaluated once.
    pub(super) fn eval_hook_call(&self, hook: &HookCall, frame: &mut Frame) -> Result<Value, Exception> {
        let (callee, args, kwargs) = self.eval_call_parts(&hook.call, frame)?;
        let caller = self.caller(frame);
        self.invoke_points(&hook.points, hook.is_async, &callee, args, kwargs, &caller)
    }

    /// Run the outermost point; its original is the remaining points around
    /// the real call.
    fn invoke_points(
        &self,
        points: &[PointKey],
        is_async: bool,
        callee: &Value,
        args: Vec<Value>,
        kwargs: KwArgs,
        caller: &Caller,
    ) -> Result<Value, Exception> {
        let Some((point, rest)) = points.split_first() else {
            return self.call(callee, args, kwargs);
        };
        if !self.has_callbacks(point) {
            return self.invoke_points(rest, is_async, callee, args, kwargs, caller);
        }

        let original: OriginalFn = {
            let interp = self.clone();
            let rest = rest.to_vec();
            let callee = callee.clone();
            let caller = caller.clone();
            Rc::new(move |args: &[Value], kwargs: &KwArgs| {
                interp.invoke_points(&rest, is_async, &callee, args.to_vec(), kwargs.clone(), &caller)
            })
        };
        let mut info = CallbackInfo::for_call(point, original, args.clone(), kwargs.clone());
        let mut ctx = caller.context();
        ctx.shift_remove("args");
        ctx.shift_remove("kwargs");
        let invocation = Invocation {
            owner: &caller.owner,
            args: &args,
            kwargs: &kwargs,
        };
        let result = self.run_point(point, is_async, &mut info, ctx, invocation)?;
        if info.is_cancelled() {
            return Ok(result);
        }
        if let Some(result) = info.original_result() {
            return Ok(result.clone());
        }
        info.call_original()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::WeaveConfig;
    use crate::interp::Interpreter;
    use crate::model::{InjectionDescriptor, InjectionKind};
    use crate::registry::{Injection, Registry};
    use crate::runtime::{Callback, ModuleServices};
    use crate::value::Value;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn unwoven_code_never_dispatches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let mut reg = Registry::new();
        reg.group("g", "m")
            .add(Injection::new(
                "f",
                InjectionDescriptor::new(InjectionKind::Entry),
                Callback::sync(move |_, _, _, _| {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            ))
            .register()
            .unwrap();
        let services = ModuleServices::new(&reg, "m", WeaveConfig::default());
        assert_eq!(services.injectors.len(), 1);

        let interp = Interpreter::new("m", Rc::new(services));
        let module = crate::ts::parse_module("def f():\n    return 1\nx = f()\n").unwrap();
        interp.run_module(&module).unwrap();
        assert_eq!(interp.get_global("x"), Some(Value::Int(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
