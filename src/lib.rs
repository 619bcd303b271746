//! Mixweave: structural source weaving for Python-like modules
//!
//! Patch groups register callbacks against methods they do not own. When a
//! module is loaded its source is parsed with tree-sitter, every registered
//! injection point is located structurally and the tree is rewritten so the
//! point dispatches to its callback chain before resuming the original
//! control flow.
//!
//! # Architecture
//!
//! - [`model`]: injection descriptors, call selectors and refinements
//! - [`resolver`]: ordering and refining raw matches
//! - [`handlers`]: one finder/instrumenter per injection kind
//! - [`registry`]: ordered, freezable callback storage
//! - [`weave`]: per-module orchestration and match-count policies
//! - [`runtime`]: dispatch chains and the condition DSL
//! - [`interp`] and [`loader`]: executing woven modules
//!
//! # Example
//!
//! ```
//! use mixweave::api::*;
//! use mixweave::{ModuleLoader, WeaveConfig};
//!
//! let mut registry = Registry::new();
//! registry
//!     .group("speed", "game")
//!     .add(Injection::new(
//!         "base_speed",
//!         at_constant(1.0),
//!         Callback::sync(|_, info, _, _| {
//!             info.set_value(1.5);
//!             Ok(())
//!         }),
//!     ))
//!     .register()
//!     .unwrap();
//! registry.freeze();
//!
//! let mut loader = ModuleLoader::new(registry, WeaveConfig::default());
//! loader.add_source("game", "def base_speed():\n    return 1.0 * 2\n\nspeed = base_speed()\n");
//! let module = loader.load("game").unwrap();
//! assert_eq!(module.get_global("speed").and_then(|v| v.as_float()), Some(3.0));
//! ```

pub mod api;
pub mod ast;
pub mod cache;
pub mod config;
pub mod handlers;
pub mod interp;
pub mod loader;
pub mod manifest;
pub mod model;
pub mod pool;
pub mod registry;
pub mod resolver;
pub mod runtime;
pub mod ts;
pub mod value;
pub mod weave;

// Re-exports
pub use config::{SettingsError, WeaveConfig};
pub use interp::Interpreter;
pub use loader::{LoadError, ModuleLoader, TransformProvider};
pub use manifest::{Manifest, ManifestError};
pub use model::{ConfigError, InjectionDescriptor, InjectionKind, Location, Policy};
pub use registry::{global, ClassMember, Injection, Registry};
pub use runtime::{Callback, CallbackInfo};
pub use ts::{parse_module, TreeSitterError};
pub use value::{Exception, Value};
pub use weave::{WeaveError, WeaveReport, Weaver};
