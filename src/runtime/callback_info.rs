use crate::model::{InjectionKind, PointKey};
use crate::value::{Exception, KwArgs, Value};
use indexmap::IndexMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Named values visible to callbacks and conditions.
pub type Context = IndexMap<String, Value>;

/// Invokes the intercepted call with the given arguments.
pub type OriginalFn = Rc<dyn Fn(&[Value], &KwArgs) -> Result<Value, Exception>>;

static TRACE_IDS: AtomicU64 = AtomicU64::new(1);

/// Decision object handed to every callback of one dispatch.
///
/// `cancel` stops the chain and makes the point return its result.
/// `set_value` replaces the value at the point but lets later callbacks run;
/// the last writer wins.
pub struct CallbackInfo {
    kind: InjectionKind,
    target: String,
    method: String,
    point: String,
    trace_id: u64,
    cancelled: bool,
    result: Value,
    value_set: bool,
    new_value: Value,
    ctx: Context,
    call: Option<CallState>,
}

struct CallState {
    original: OriginalFn,
    args: Vec<Value>,
    kwargs: KwArgs,
    called: bool,
    result: Value,
}

impl CallbackInfo {
    pub fn new(point: &PointKey) -> Self {
        Self {
            kind: point.kind(),
            target: point.target.clone(),
            method: point.method.clone(),
            point: point.point_name(),
            trace_id: TRACE_IDS.fetch_add(1, Ordering::Relaxed),
            cancelled: false,
            result: Value::None,
            value_set: false,
            new_value: Value::None,
            ctx: Context::new(),
            call: None,
        }
    }

    /// Decision object for a call site, carrying the invoke-original capability.
    pub fn for_call(point: &PointKey, original: OriginalFn, args: Vec<Value>, kwargs: KwArgs) -> Self {
        let mut info = Self::new(point);
        info.call = Some(CallState {
            original,
            args,
            kwargs,
            called: false,
            result: Value::None,
        });
        info
    }

    pub fn kind(&self) -> InjectionKind {
        self.kind
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Name of the point: its target, or the kind when there is none.
    pub fn point(&self) -> &str {
        &self.point
    }

    pub fn trace_id(&self) -> u64 {
        self.trace_id
    }

    pub fn cancel(&mut self, result: impl Into<Value>) {
        self.cancelled = true;
        self.result = result.into();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn result(&self) -> &Value {
        &self.result
    }

    pub fn set_value(&mut self, value: impl Into<Value>) {
        self.value_set = true;
        self.new_value = value.into();
    }

    /// Replace the return value without cancelling later callbacks.
    pub fn set_return_value(&mut self, value: impl Into<Value>) {
        self.set_value(value);
    }

    pub fn value_set(&self) -> bool {
        self.value_set
    }

    pub fn new_value(&self) -> &Value {
        &self.new_value
    }

    /// The value at the point (`ctx["value"]`), `None` when the kind has none.
    pub fn value(&self) -> Value {
        self.ctx.get("value").cloned().unwrap_or_default()
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Snapshot of the function's locals at the point.
    pub fn locals(&self) -> IndexMap<String, Value> {
        match self.ctx.get("locals") {
            Some(Value::Dict(d)) => d
                .borrow()
                .iter()
                .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), v.clone())))
                .collect(),
            _ => IndexMap::new(),
        }
    }

    pub fn parameter_name(&self) -> Option<String> {
        match self.ctx.get("param") {
            Some(Value::None) | None => None,
            Some(v) => Some(v.to_string()),
        }
    }

    pub fn parameter(&self) -> Value {
        self.value()
    }

    pub fn set_parameter(&mut self, value: impl Into<Value>) {
        self.set_value(value);
    }

    /// Current positional and keyword arguments of the intercepted call.
    pub fn call_args(&self) -> Result<(Vec<Value>, KwArgs), Exception> {
        let call = self.call_state("call arguments")?;
        Ok((call.args.clone(), call.kwargs.clone()))
    }

    /// Replace the arguments the original call (and later callbacks) receive.
    pub fn set_call_args(&mut self, args: Vec<Value>, kwargs: KwArgs) -> Result<(), Exception> {
        let call = self
            .call
            .as_mut()
            .ok_or_else(|| unavailable("set_call_args"))?;
        call.args = args;
        call.kwargs = kwargs;
        self.refresh_call_context();
        Ok(())
    }

    /// Invoke the intercepted call with the current arguments.
    pub fn call_original(&mut self) -> Result<Value, Exception> {
        let (original, args, kwargs) = {
            let call = self.call_state("call_original")?;
            (call.original.clone(), call.args.clone(), call.kwargs.clone())
        };
        let result = original(&args, &kwargs)?;
        if let Some(call) = self.call.as_mut() {
            call.called = true;
            call.result = result.clone();
        }
        Ok(result)
    }

    /// Replace the arguments, then invoke the intercepted call.
    pub fn call_original_with(&mut self, args: Vec<Value>, kwargs: KwArgs) -> Result<Value, Exception> {
        self.set_call_args(args, kwargs)?;
        self.call_original()
    }

    /// Result of `call_original`, if a callback already invoked it.
    pub fn original_result(&self) -> Option<&Value> {
        self.call
            .as_ref()
            .filter(|c| c.called)
            .map(|c| &c.result)
    }

    fn call_state(&self, what: &str) -> Result<&CallState, Exception> {
        self.call.as_ref().ok_or_else(|| unavailable(what))
    }

    pub(crate) fn set_context(&mut self, ctx: Context) {
        self.ctx = ctx;
    }

    pub(crate) fn call_buffers(&self) -> Option<(Vec<Value>, KwArgs)> {
        self.call.as_ref().map(|c| (c.args.clone(), c.kwargs.clone()))
    }

    /// Mirror the argument buffers into the context.
    pub(crate) fn refresh_call_context(&mut self) {
        let Some((args, kwargs)) = self.call_buffers() else {
            return;
        };
        let args = Value::list(args);
        let kwargs = Value::from_kwargs(&kwargs);
        self.ctx.insert("args".into(), args.clone());
        self.ctx.insert("kwargs".into(), kwargs.clone());
        self.ctx.insert("call_args".into(), args);
        self.ctx.insert("call_kwargs".into(), kwargs);
    }
}

fn unavailable(what: &str) -> Exception {
    Exception::runtime_error(format!(
        "{what} is not available for this injection point (CALL_SITE only)"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InjectionDescriptor, InjectionKind};
    use std::cell::Cell;

    fn point(kind: InjectionKind) -> PointKey {
        PointKey::new("game.Player", "tick", InjectionDescriptor::new(kind))
    }

    #[test]
    fn cancel_and_value_are_independent() {
        let mut info = CallbackInfo::new(&point(InjectionKind::PreReturn));
        info.set_return_value(5);
        assert!(info.value_set());
        assert!(!info.is_cancelled());
        info.cancel(7);
        assert_eq!(info.result(), &Value::Int(7));
        assert_eq!(info.new_value(), &Value::Int(5));
    }

    #[test]
    fn call_capabilities_only_at_call_sites() {
        let mut info = CallbackInfo::new(&point(InjectionKind::Entry));
        let err = info.call_original().unwrap_err();
        assert_eq!(err.class_name, "RuntimeError");
        assert!(err.message.contains("not available for this injection point"));
        assert!(info.set_call_args(vec![], KwArgs::new()).is_err());
        assert!(info.call_args().is_err());
    }

    #[test]
    fn call_original_uses_replaced_args() {
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let original: OriginalFn = Rc::new(move |args, _| {
            seen.set(seen.get() + 1);
            Ok(Value::Int(args.iter().filter_map(Value::as_int).sum()))
        });
        let desc = InjectionDescriptor::new(InjectionKind::CallSite).with_target("add");
        let mut info = CallbackInfo::for_call(
            &PointKey::new("m", "f", desc),
            original,
            vec![Value::Int(1), Value::Int(2)],
            KwArgs::new(),
        );
        let out = info
            .call_original_with(vec![Value::Int(10), Value::Int(20)], KwArgs::new())
            .unwrap();
        assert_eq!(out, Value::Int(30));
        assert_eq!(calls.get(), 1);
        assert_eq!(info.original_result(), Some(&Value::Int(30)));
        assert_eq!(info.context().get("call_args"), Some(&Value::list(vec![Value::Int(10), Value::Int(20)])));
    }

    #[test]
    fn trace_ids_are_unique() {
        let a = CallbackInfo::new(&point(InjectionKind::Entry));
        let b = CallbackInfo::new(&point(InjectionKind::Entry));
        assert_ne!(a.trace_id(), b.trace_id());
    }
}
