//! Loading woven modules.
//!
//! A [`ModuleLoader`] owns module sources, asks a [`TransformProvider`] for the
//! woven tree, caches it under a content-plus-fingerprint key and executes it
//! in a fresh [`Interpreter`] wired to that module's [`ModuleServices`].
//! The first weave freezes the provider's registrations; see
//! [`ModuleLoader::with_registrations`] for changing them afterwards.

mod cache;
mod dump;

pub use cache::{cache_key, CacheStats, Woven, WovenCache};
pub use dump::{atomic_write, dump_module, dump_path, interface_stub};

use crate::ast::Module;
use crate::config::WeaveConfig;
use crate::interp::Interpreter;
use crate::registry::{ClassMember, Registry};
use crate::runtime::ModuleServices;
use crate::value::Value;
use crate::weave::{WeaveError, WeaveReport, Weaver};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("module '{0}' is not currently loaded")]
    NotLoaded(String),

    #[error("no source known for module '{0}'")]
    UnknownModule(String),

    #[error(transparent)]
    Weave(#[from] WeaveError),

    #[error("module '{module}' raised {message}")]
    Runtime { module: String, message: String },

    #[error("cannot add members to '{target}': {reason}")]
    MemberTarget { target: String, reason: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LoadError {
    fn io(path: &Path, source: io::Error) -> Self {
        LoadError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Turns source into a woven tree and builds the services woven code runs
/// against.
pub trait TransformProvider {
    fn transform(&self, source: &str, module_name: &str) -> Result<(Module, WeaveReport), WeaveError>;

    /// Changes whenever the registration set changes.
    fn fingerprint(&self) -> u64;

    fn services(&self, module_name: &str, config: &WeaveConfig) -> ModuleServices;

    /// Class members for targets inside `module_name`, by target.
    fn class_members(&self, module_name: &str) -> Vec<(String, Vec<(String, ClassMember)>)>;

    fn freeze(&mut self);

    fn unfreeze(&mut self);
}

impl TransformProvider for Registry {
    fn transform(&self, source: &str, module_name: &str) -> Result<(Module, WeaveReport), WeaveError> {
        Weaver::new(self).weave_source(source, module_name)
    }

    fn fingerprint(&self) -> u64 {
        Registry::fingerprint(self)
    }

    fn services(&self, module_name: &str, config: &WeaveConfig) -> ModuleServices {
        ModuleServices::new(self, module_name, config.clone())
    }

    fn class_members(&self, module_name: &str) -> Vec<(String, Vec<(String, ClassMember)>)> {
        Registry::class_members(self, module_name)
            .map(|(target, members)| (target.to_string(), members.to_vec()))
            .collect()
    }

    fn freeze(&mut self) {
        Registry::freeze(self);
    }

    fn unfreeze(&mut self) {
        Registry::unfreeze(self);
    }
}

/// The shared registry from [`crate::registry::global`].
impl TransformProvider for Arc<RwLock<Registry>> {
    fn transform(&self, source: &str, module_name: &str) -> Result<(Module, WeaveReport), WeaveError> {
        self.read().transform(source, module_name)
    }

    fn fingerprint(&self) -> u64 {
        self.read().fingerprint()
    }

    fn services(&self, module_name: &str, config: &WeaveConfig) -> ModuleServices {
        self.read().services(module_name, config)
    }

    fn class_members(&self, module_name: &str) -> Vec<(String, Vec<(String, ClassMember)>)> {
        TransformProvider::class_members(&*self.read(), module_name)
    }

    fn freeze(&mut self) {
        self.write().freeze();
    }

    fn unfreeze(&mut self) {
        self.write().unfreeze();
    }
}

#[derive(Debug, Clone)]
struct ModuleSource {
    text: String,
    path: Option<PathBuf>,
}

/// An executed module.
#[derive(Clone)]
pub struct LoadedModule {
    pub interpreter: Interpreter,
    pub woven: Rc<Woven>,
    pub key: u64,
}

pub struct ModuleLoader<P: TransformProvider = Registry> {
    provider: P,
    config: WeaveConfig,
    sources: IndexMap<String, ModuleSource>,
    cache: WovenCache,
    loaded: IndexMap<String, LoadedModule>,
}

impl<P: TransformProvider> ModuleLoader<P> {
    pub fn new(provider: P, config: WeaveConfig) -> Self {
        Self {
            provider,
            config,
            sources: IndexMap::new(),
            cache: WovenCache::new(),
            loaded: IndexMap::new(),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Registrations are frozen once anything has been woven; use
    /// [`Self::with_registrations`] to change them.
    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    /// Reopen the provider for registration, run `f`, then freeze again.
    /// Changes take effect on the next load or reload.
    pub fn with_registrations<R>(&mut self, f: impl FnOnce(&mut P) -> R) -> R {
        self.provider.unfreeze();
        let out = f(&mut self.provider);
        self.provider.freeze();
        tracing::debug!("registrations reopened and frozen again");
        out
    }

    pub fn config(&self) -> &WeaveConfig {
        &self.config
    }

    pub fn add_source(&mut self, module_name: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(
            module_name.into(),
            ModuleSource {
                text: source.into(),
                path: None,
            },
        );
    }

    /// Register a source file; `reload` re-reads it.
    pub fn add_file(&mut self, module_name: impl Into<String>, path: impl AsRef<Path>) -> Result<(), LoadError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
        self.sources.insert(
            module_name.into(),
            ModuleSource {
                text,
                path: Some(path.to_path_buf()),
            },
        );
        Ok(())
    }

    /// Register every `.py` file under `root`, named by its dotted path
    /// relative to `root` (`pkg/__init__.py` is `pkg`).
    pub fn add_tree(&mut self, root: impl AsRef<Path>) -> Result<Vec<String>, LoadError> {
        let root = root.as_ref();
        let mut names = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                LoadError::Io {
                    path,
                    source: e.into(),
                }
            })?;
            if !entry.file_type().is_file() || entry.path().extension().and_then(|e| e.to_str()) != Some("py") {
                continue;
            }
            let Some(name) = module_name_for(root, entry.path()) else {
                continue;
            };
            self.add_file(name.clone(), entry.path())?;
            names.push(name);
        }
        tracing::debug!(root = %root.display(), modules = names.len(), "source tree added");
        Ok(names)
    }

    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn is_loaded(&self, module_name: &str) -> bool {
        self.loaded.contains_key(module_name)
    }

    pub fn loaded(&self, module_name: &str) -> Option<&LoadedModule> {
        self.loaded.get(module_name)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Weave without executing.
    pub fn weave(&mut self, module_name: &str) -> Result<Rc<Woven>, LoadError> {
        self.weave_keyed(module_name).map(|(_, woven)| woven)
    }

    fn weave_keyed(&mut self, module_name: &str) -> Result<(u64, Rc<Woven>), LoadError> {
        self.provider.freeze();
        let source = self
            .sources
            .get(module_name)
            .ok_or_else(|| LoadError::UnknownModule(module_name.to_string()))?;
        let key = cache_key(&source.text, self.provider.fingerprint());
        let provider = &self.provider;
        let text = &source.text;
        let woven = self.cache.get_or_weave(module_name, key, || {
            let (module, report) = provider.transform(text, module_name)?;
            Ok(Woven { module, report })
        })?;
        Ok((key, woven))
    }

    /// Load `module_name`, weaving and executing it on first use.
    pub fn load(&mut self, module_name: &str) -> Result<Interpreter, LoadError> {
        if let Some(loaded) = self.loaded.get(module_name) {
            return Ok(loaded.interpreter.clone());
        }
        let (key, woven) = self.weave_keyed(module_name)?;

        if self.config.debug {
            dump_module(&self.config.dump_dir, module_name, &woven.module)
                .map_err(|e| LoadError::io(&self.config.dump_dir, e))?;
        }

        let services = self.provider.services(module_name, &self.config);
        let interpreter = Interpreter::new(module_name, Rc::new(services));
        interpreter
            .run_module(&woven.module)
            .map_err(|exc| LoadError::Runtime {
                module: module_name.to_string(),
                message: exc.to_string(),
            })?;
        self.install_members(&interpreter, module_name)?;

        tracing::info!(
            module = module_name,
            woven_points = woven.report.total_matches(),
            "module loaded"
        );
        self.loaded.insert(
            module_name.to_string(),
            LoadedModule {
                interpreter: interpreter.clone(),
                woven,
                key,
            },
        );
        Ok(interpreter)
    }

    /// Set registered class members on classes the module defined.
    fn install_members(&self, interpreter: &Interpreter, module_name: &str) -> Result<(), LoadError> {
        for (target, members) in self.provider.class_members(module_name) {
            let class = resolve_target(interpreter, module_name, &target)?;
            for (name, member) in &members {
                if !class.set_attr(name, member.to_value(name)) {
                    return Err(LoadError::MemberTarget {
                        target: target.clone(),
                        reason: format!("'{}' does not accept attributes", class.type_name()),
                    });
                }
            }
            tracing::debug!(target_name = %target, members = members.len(), "class members installed");
        }
        Ok(())
    }

    /// Re-read (when file-backed), re-weave if the key changed, and execute
    /// again in a fresh interpreter.
    pub fn reload(&mut self, module_name: &str) -> Result<Interpreter, LoadError> {
        if !self.loaded.contains_key(module_name) {
            return Err(LoadError::NotLoaded(module_name.to_string()));
        }
        if let Some(source) = self.sources.get_mut(module_name) {
            if let Some(path) = &source.path {
                source.text = fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
            }
        }
        self.loaded.shift_remove(module_name);
        self.load(module_name)
    }

    /// Forget a module: its source, cached trees and loaded state.
    pub fn unregister(&mut self, module_name: &str) -> bool {
        let known = self.sources.shift_remove(module_name).is_some();
        let loaded = self.loaded.shift_remove(module_name).is_some();
        self.cache.invalidate(module_name);
        known || loaded
    }

    /// Write a `.pyi` stub for every loaded module into `dir`.
    pub fn generate_interface_stubs(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, LoadError> {
        let dir = dir.as_ref();
        let mut written = Vec::with_capacity(self.loaded.len());
        for (name, loaded) in &self.loaded {
            let path = dump_path(dir, name, "pyi");
            atomic_write(&path, interface_stub(name, &loaded.woven).as_bytes())
                .map_err(|e| LoadError::io(&path, e))?;
            written.push(path);
        }
        Ok(written)
    }
}

/// Walk the dotted part of `target` below `module_name` from the module's
/// globals.
fn resolve_target(interpreter: &Interpreter, module_name: &str, target: &str) -> Result<Value, LoadError> {
    let missing = |reason: String| LoadError::MemberTarget {
        target: target.to_string(),
        reason,
    };
    let path = target
        .strip_prefix(module_name)
        .and_then(|rest| rest.strip_prefix('.'))
        .ok_or_else(|| missing("members must name a class inside the module".into()))?;
    let mut parts = path.split('.');
    let first = parts.next().unwrap_or_default();
    let mut current = interpreter
        .get_global(first)
        .ok_or_else(|| missing(format!("module has no attribute '{first}'")))?;
    for part in parts {
        current = current
            .get_attr(part)
            .ok_or_else(|| missing(format!("no attribute '{part}'")))?;
    }
    Ok(current)
}

/// Dotted module name of `path` relative to `root`.
fn module_name_for(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?.with_extension("");
    let mut parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_str().map(str::to_string))
        .collect::<Option<_>>()?;
    if parts.last().is_some_and(|last| last == "__init__") {
        parts.pop();
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{at_pre_return, Callback, Injection};
    use crate::model::{ConfigError, Literal};
    use crate::value::KwArgs;

    const SOURCE: &str = "def double(x):\n    return x * 2\n\nresult = double(4)\n";

    fn loader() -> ModuleLoader {
        let mut loader = ModuleLoader::new(Registry::new(), WeaveConfig::default());
        loader.add_source("calc", SOURCE);
        loader
    }

    #[test]
    fn load_executes_and_caches() {
        let mut loader = loader();
        let interp = loader.load("calc").unwrap();
        assert!(interp.get_global("result").unwrap().py_eq(&Value::Int(8)));
        loader.load("calc").unwrap();
        assert_eq!(loader.cache_stats().misses, 1);
        loader.reload("calc").unwrap();
        assert_eq!(loader.cache_stats().hits, 1);
    }

    #[test]
    fn reload_requires_a_loaded_module() {
        let mut loader = loader();
        let err = loader.reload("calc").unwrap_err();
        assert!(err.to_string().contains("not currently loaded"));
        assert!(matches!(loader.load("nope"), Err(LoadError::UnknownModule(_))));
    }

    #[test]
    fn new_registrations_invalidate_the_cache() {
        let mut loader = loader();
        loader.load("calc").unwrap();
        loader
            .with_registrations(|registry| {
                registry
                    .group("g", "calc")
                    .add(Injection::new(
                        "double",
                        at_pre_return(),
                        Callback::sync(|_, info, _, _| {
                            info.set_return_value(0);
                            Ok(())
                        }),
                    ))
                    .register()
            })
            .unwrap();
        assert!(loader.provider().is_frozen());
        let interp = loader.reload("calc").unwrap();
        assert!(interp.get_global("result").unwrap().py_eq(&Value::Int(0)));
        assert_eq!(loader.cache_stats().misses, 2);
    }

    #[test]
    fn loading_freezes_registrations() {
        let mut loader = loader();
        assert!(!loader.provider().is_frozen());
        loader.load("calc").unwrap();
        assert!(loader.provider().is_frozen());
        let err = loader
            .provider_mut()
            .group("late", "calc")
            .add(Injection::new("double", at_pre_return(), Callback::sync(|_, _, _, _| Ok(()))))
            .register()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Frozen { .. }));
    }

    #[test]
    fn class_members_are_installed_after_execution() {
        let mut registry = Registry::new();
        registry
            .group("mixin", "game.Player")
            .member("bonus", ClassMember::Attribute(Literal::Int(3)))
            .member(
                "double_health",
                ClassMember::method(|interp, args, _| {
                    let health = interp.get_attribute(&args[0], "health")?;
                    Ok(Value::Int(health.as_int().unwrap_or_default() * 2))
                }),
            )
            .register()
            .unwrap();
        let mut loader = ModuleLoader::new(registry, WeaveConfig::default());
        loader.add_source(
            "game",
            "class Player:\n    def __init__(self, health):\n        self.health = health\n\n\
             def make():\n    p = Player(7)\n    return [p.double_health(), p.bonus]\n",
        );
        let interp = loader.load("game").unwrap();
        let make = interp.get_global("make").unwrap();
        let out = interp.call(&make, Vec::new(), KwArgs::new()).unwrap();
        assert!(out.py_eq(&Value::list(vec![Value::Int(14), Value::Int(3)])));
    }

    #[test]
    fn members_for_missing_classes_fail_the_load() {
        let mut registry = Registry::new();
        registry
            .add_member("calc.Missing", "x", ClassMember::Attribute(Literal::None))
            .unwrap();
        let mut loader = ModuleLoader::new(registry, WeaveConfig::default());
        loader.add_source("calc", SOURCE);
        let err = loader.load("calc").unwrap_err();
        assert!(matches!(err, LoadError::MemberTarget { .. }));
        assert!(err.to_string().contains("no attribute 'Missing'"));
    }

    #[test]
    fn runtime_errors_name_the_module() {
        let mut loader = ModuleLoader::new(Registry::new(), WeaveConfig::default());
        loader.add_source("bad", "x = 1 / 0\n");
        let err = loader.load("bad").unwrap_err();
        assert!(err.to_string().starts_with("module 'bad' raised ZeroDivisionError"));
        assert!(!loader.is_loaded("bad"));
    }

    #[test]
    fn unregister_forgets_everything() {
        let mut loader = loader();
        loader.load("calc").unwrap();
        assert!(loader.unregister("calc"));
        assert!(!loader.unregister("calc"));
        assert_eq!(loader.cache_stats().entries, 0);
        assert!(matches!(loader.load("calc"), Err(LoadError::UnknownModule(_))));
    }

    #[test]
    fn module_names_follow_paths() {
        let root = Path::new("/src");
        assert_eq!(module_name_for(root, Path::new("/src/game/player.py")).as_deref(), Some("game.player"));
        assert_eq!(module_name_for(root, Path::new("/src/game/__init__.py")).as_deref(), Some("game"));
        assert_eq!(module_name_for(root, Path::new("/src/__init__.py")), None);
    }
}
