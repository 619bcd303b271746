//! Callback chains and the dispatch algorithm.
//!
//! One algorithm serves both entry points. Every callback produces a
//! [`Step`]: synchronous callbacks finish immediately, asynchronous ones
//! hand back a future. [`dispatch`] drives the chain without ever
//! suspending; [`dispatch_async`] awaits each suspended step in order, so two
//! callbacks of the same point never run concurrently.

use super::callback_info::{CallbackInfo, Context};
use super::condition::evaluate;
use crate::model::Condition;
use crate::value::{Exception, KwArgs, Value};
use futures::future::LocalBoxFuture;
use futures::task::ArcWake;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

pub type SyncCallbackFn =
    dyn Fn(&Value, &mut CallbackInfo, &[Value], &KwArgs) -> Result<(), Exception> + Send + Sync;

pub type AsyncCallbackFn = dyn for<'a> Fn(
        &'a Value,
        &'a mut CallbackInfo,
        &'a [Value],
        &'a KwArgs,
    ) -> LocalBoxFuture<'a, Result<(), Exception>>
    + Send
    + Sync;

/// A registered callback: `(owner, info, args, kwargs)`.
#[derive(Clone)]
pub enum Callback {
    Sync(Arc<SyncCallbackFn>),
    Async(Arc<AsyncCallbackFn>),
}

/// Outcome of starting one callback.
pub enum Step<'a> {
    Ready(Result<(), Exception>),
    Suspend(LocalBoxFuture<'a, Result<(), Exception>>),
}

impl Callback {
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&Value, &mut CallbackInfo, &[Value], &KwArgs) -> Result<(), Exception>
            + Send
            + Sync
            + 'static,
    {
        Callback::Sync(Arc::new(f))
    }

    /// Wrap an asynchronous callback; the closure returns a boxed local future,
    /// e.g. `|owner, info, args, kwargs| async move { ... }.boxed_local()`.
    pub fn asynchronous<F>(f: F) -> Self
    where
        F: for<'a> Fn(
                &'a Value,
                &'a mut CallbackInfo,
                &'a [Value],
                &'a KwArgs,
            ) -> LocalBoxFuture<'a, Result<(), Exception>>
            + Send
            + Sync
            + 'static,
    {
        Callback::Async(Arc::new(f))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Callback::Async(_))
    }

    pub fn step<'a>(
        &'a self,
        owner: &'a Value,
        info: &'a mut CallbackInfo,
        args: &'a [Value],
        kwargs: &'a KwArgs,
    ) -> Step<'a> {
        match self {
            Callback::Sync(f) => Step::Ready(f(owner, info, args, kwargs)),
            Callback::Async(f) => Step::Suspend(f(owner, info, args, kwargs)),
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callback::Sync(_) => f.write_str("Callback::Sync"),
            Callback::Async(_) => f.write_str("Callback::Async"),
        }
    }
}

/// One entry of a runtime chain.
#[derive(Debug, Clone)]
pub struct Injector {
    pub name: String,
    pub group: String,
    pub callback: Callback,
    /// Runtime guard; the callback is skipped when it evaluates false.
    pub condition: Option<Condition>,
}

/// Ordered callbacks registered for one point.
#[derive(Debug, Clone, Copy)]
pub struct Chain<'a> {
    pub injectors: &'a [Injector],
    pub trace: bool,
}

impl<'a> Chain<'a> {
    pub fn new(injectors: &'a [Injector]) -> Self {
        Self {
            injectors,
            trace: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.injectors.is_empty()
    }
}

/// The owner and arguments callbacks receive.
#[derive(Clone, Copy)]
pub struct Invocation<'a> {
    pub owner: &'a Value,
    pub args: &'a [Value],
    pub kwargs: &'a KwArgs,
}

/// Run a chain synchronously and return the cancellation result, if any.
///
/// An asynchronous callback whose future does not complete on first poll
/// raises `RuntimeError`.
pub fn dispatch(
    chain: Chain<'_>,
    info: &mut CallbackInfo,
    ctx: Context,
    invocation: Invocation<'_>,
) -> Result<Value, Exception> {
    prepare(info, ctx, &invocation);
    match run_chain(chain, info, invocation).now_or_never() {
        Some(result) => result,
        None => Err(Exception::runtime_error(
            "asynchronous callback cannot complete at a synchronous injection point",
        )),
    }
}

/// Run a chain, awaiting asynchronous callbacks one after another.
pub fn dispatch_async(
    chain: Chain<'_>,
    info: &mut CallbackInfo,
    ctx: Context,
    invocation: Invocation<'_>,
) -> Result<Value, Exception> {
    prepare(info, ctx, &invocation);
    block_on(run_chain(chain, info, invocation))
}

struct Unpark(std::thread::Thread);

impl ArcWake for Unpark {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.0.unpark();
    }
}

/// Drive a future on the current thread. Unlike the executor in `futures`,
/// this may be entered again from a callback that reaches another
/// asynchronous point.
fn block_on<F: Future>(future: F) -> F::Output {
    let mut future = std::pin::pin!(future);
    let waker = futures::task::waker(Arc::new(Unpark(std::thread::current())));
    let mut cx = std::task::Context::from_waker(&waker);
    loop {
        if let std::task::Poll::Ready(out) = future.as_mut().poll(&mut cx) {
            return out;
        }
        std::thread::park();
    }
}

fn prepare(info: &mut CallbackInfo, ctx: Context, invocation: &Invocation<'_>) {
    let ctx = normalize_context(info, ctx, invocation);
    info.set_context(ctx);
}

/// Fill in the keys every context carries, keeping values already present.
pub fn normalize_context(info: &CallbackInfo, mut ctx: Context, invocation: &Invocation<'_>) -> Context {
    let defaults = [
        ("type", Value::str(info.kind().as_str())),
        ("target", Value::str(info.target())),
        ("method", Value::str(info.method())),
        ("at", Value::str(info.point())),
        ("self", invocation.owner.clone()),
        ("args", Value::list(invocation.args.to_vec())),
        ("kwargs", Value::from_kwargs(invocation.kwargs)),
        ("locals", Value::dict([])),
    ];
    for (key, value) in defaults {
        ctx.entry(key.to_string()).or_insert(value);
    }
    ctx
}

async fn run_chain(
    chain: Chain<'_>,
    info: &mut CallbackInfo,
    invocation: Invocation<'_>,
) -> Result<Value, Exception> {
    for injector in chain.injectors {
        let (args, kwargs) = match info.call_buffers() {
            Some(buffers) => {
                info.refresh_call_context();
                buffers
            }
            None => (invocation.args.to_vec(), invocation.kwargs.clone()),
        };

        if let Some(condition) = &injector.condition {
            if !evaluate(condition, info.context()) {
                continue;
            }
        }

        if chain.trace {
            tracing::trace!(
                target_name = info.target(),
                method = info.method(),
                kind = %info.kind(),
                point = info.point(),
                callback = %injector.name,
                trace_id = info.trace_id(),
                "dispatch"
            );
        }

        match injector.callback.step(invocation.owner, info, &args, &kwargs) {
            Step::Ready(result) => result?,
            Step::Suspend(future) => future.await?,
        }

        if info.is_cancelled() {
            if chain.trace {
                tracing::trace!(result = ?info.result(), trace_id = info.trace_id(), "cancelled");
            }
            return Ok(info.result().clone());
        }
    }
    Ok(Value::None)
}
