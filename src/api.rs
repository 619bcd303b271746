//! Registration surface for patch authors.
//!
//! Each `at_*` function returns the descriptor of one injection-point kind;
//! refine it with [`InjectionDescriptor::with_location`] and attach it to a
//! method with [`Injection::new`].
//!
//! ```
//! use mixweave::api::*;
//!
//! let mut registry = Registry::new();
//! registry
//!     .group("combat", "game.player.Player")
//!     .add(
//!         Injection::new(
//!             "set_health",
//!             at_attribute("self.health").with_location(Location::new().when(Condition::lt("value", 0))),
//!             Callback::sync(|_, info, _, _| {
//!                 info.cancel(0);
//!                 Ok(())
//!             }),
//!         )
//!         .named("prevent_negative_health")
//!         .require(1),
//!     )
//!     .register()
//!     .unwrap();
//! assert_eq!(registry.len(), 1);
//! ```

pub use crate::model::{
    ArgPattern, CallSelector, CompareOp, Condition, InjectionDescriptor, InjectionKind, KeywordPattern, Literal,
    Location, Policy, PositionalMode, UnresolvedPolicy,
};
pub use crate::registry::{ClassMember, Injection, Registry};
pub use crate::runtime::{Callback, CallbackInfo};

pub fn at_entry() -> InjectionDescriptor {
    InjectionDescriptor::new(InjectionKind::Entry)
}

/// Every `return`, plus falling off the end of the body.
pub fn at_pre_return() -> InjectionDescriptor {
    InjectionDescriptor::new(InjectionKind::PreReturn)
}

pub fn at_parameter(name: &str) -> InjectionDescriptor {
    InjectionDescriptor::new(InjectionKind::Parameter).with_target(name)
}

/// Literal occurrences equal to `value`.
pub fn at_constant(value: impl Into<Literal>) -> InjectionDescriptor {
    InjectionDescriptor::new(InjectionKind::Constant).with_target(value)
}

/// Calls whose callee is the dotted `path`.
pub fn at_call_site(path: &str) -> InjectionDescriptor {
    InjectionDescriptor::new(InjectionKind::CallSite).with_target(path)
}

/// Calls accepted by a structural selector.
pub fn at_call_site_matching(selector: CallSelector) -> InjectionDescriptor {
    InjectionDescriptor::new(InjectionKind::CallSite).with_selector(selector)
}

/// Plain, annotated or augmented writes to the dotted `path`.
pub fn at_attribute(path: &str) -> InjectionDescriptor {
    InjectionDescriptor::new(InjectionKind::AttributeWrite).with_target(path)
}

pub fn at_exception() -> InjectionDescriptor {
    InjectionDescriptor::new(InjectionKind::Exception)
}

pub fn at_produced_value() -> InjectionDescriptor {
    InjectionDescriptor::new(InjectionKind::ProducedValue)
}
