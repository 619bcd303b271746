//! Runtime half of weaving: callback chains, decision objects and the
//! condition DSL. Woven code reaches this layer through the interpreter's
//! hook evaluation and a per-module [`ModuleServices`] handle.

pub mod callback_info;
pub mod condition;
pub mod dispatch;
pub mod injector_map;
pub mod kwargs;

pub use callback_info::{CallbackInfo, Context, OriginalFn};
pub use condition::{evaluate, resolve_path};
pub use dispatch::{
    dispatch, dispatch_async, normalize_context, Callback, Chain, Injector, Invocation, Step,
};
pub use injector_map::{InjectorMap, ModuleServices};
pub use kwargs::{duplicate_keyword, keywords_from_mapping, merge_keywords};
