//! Ordered storage of patch groups and their injectors.
//!
//! The registry is open while patch modules register, then frozen before the
//! first module is woven. It stores registrations in dispatch order and
//! enforces nothing about match counts; that is the orchestrator's job.

use crate::interp::Interpreter;
use crate::model::{ConfigError, InjectionDescriptor, Literal, Policy};
use crate::runtime::Callback;
use crate::value::{Exception, KwArgs, Value};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, OnceLock};
use xxhash_rust::xxh3::xxh3_64;

pub const DEFAULT_PRIORITY: i32 = 100;

/// A named patch group attached to one target (`module` or `module.Class`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub target: String,
    pub priority: i32,
}

/// One callback bound to a method and an injection descriptor.
#[derive(Debug, Clone)]
pub struct Registration {
    pub group: String,
    pub target: String,
    pub method: String,
    pub descriptor: InjectionDescriptor,
    pub callback: Callback,
    pub callback_name: String,
    pub priority: i32,
    pub require: Option<usize>,
    pub expect: Option<usize>,
    pub policy: Policy,
    pub group_priority: i32,
    pub sequence: u64,
}

impl Registration {
    /// Dispatch order: group priority, priority, group, callback name, sequence.
    pub fn order_key(&self) -> (i32, i32, &str, &str, u64) {
        (
            self.group_priority,
            self.priority,
            &self.group,
            &self.callback_name,
            self.sequence,
        )
    }
}

/// Registration request built by patch authors.
///
/// ```
/// use mixweave::api::at_entry;
/// use mixweave::registry::{Injection, Registry};
/// use mixweave::runtime::Callback;
///
/// let mut registry = Registry::new();
/// registry
///     .group("audit", "game.Player")
///     .priority(10)
///     .add(Injection::new("tick", at_entry(), Callback::sync(|_, _, _, _| Ok(()))).named("log_tick"))
///     .register()
///     .unwrap();
/// assert_eq!(registry.get_injectors("game.Player", "tick").len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Injection {
    method: String,
    descriptor: InjectionDescriptor,
    callback: Callback,
    name: Option<String>,
    priority: i32,
    require: Option<usize>,
    expect: Option<usize>,
    policy: Policy,
}

impl Injection {
    pub fn new(method: impl Into<String>, descriptor: InjectionDescriptor, callback: Callback) -> Self {
        Self {
            method: method.into(),
            descriptor,
            callback,
            name: None,
            priority: DEFAULT_PRIORITY,
            require: None,
            expect: None,
            policy: Policy::default(),
        }
    }

    /// Name used in diagnostics and as an ordering tie-breaker.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Exact number of matches this injection must resolve to.
    pub fn require(mut self, count: usize) -> Self {
        self.require = Some(count);
        self
    }

    /// Number of matches this injection is expected to resolve to.
    pub fn expect(mut self, count: usize) -> Self {
        self.expect = Some(count);
        self
    }

    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }
}

pub type MemberFn = dyn Fn(&Interpreter, &[Value], &KwArgs) -> Result<Value, Exception> + Send + Sync;

/// Attribute set on a class after its defining module has executed.
///
/// Methods receive the instance as their first positional argument.
#[derive(Clone)]
pub enum ClassMember {
    Attribute(Literal),
    Method(Arc<MemberFn>),
}

impl ClassMember {
    pub fn method<F>(f: F) -> Self
    where
        F: Fn(&Interpreter, &[Value], &KwArgs) -> Result<Value, Exception> + Send + Sync + 'static,
    {
        ClassMember::Method(Arc::new(f))
    }

    /// Runtime value installed under `name`.
    pub fn to_value(&self, name: &str) -> Value {
        match self {
            ClassMember::Attribute(lit) => Value::from(lit),
            ClassMember::Method(f) => {
                let f = f.clone();
                Value::native_method(name, move |interp, args, kwargs| f(interp, args, kwargs))
            }
        }
    }
}

impl fmt::Debug for ClassMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassMember::Attribute(lit) => f.debug_tuple("Attribute").field(lit).finish(),
            ClassMember::Method(_) => f.write_str("Method(<native>)"),
        }
    }
}

/// Builder returned by [`Registry::group`].
pub struct GroupBuilder<'r> {
    registry: &'r mut Registry,
    name: String,
    target: String,
    priority: i32,
    injections: Vec<Injection>,
    members: Vec<(String, ClassMember)>,
}

impl GroupBuilder<'_> {
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn add(mut self, injection: Injection) -> Self {
        self.injections.push(injection);
        self
    }

    /// Add `name` to the group's target class.
    pub fn member(mut self, name: impl Into<String>, member: ClassMember) -> Self {
        self.members.push((name.into(), member));
        self
    }

    pub fn register(self) -> Result<(), ConfigError> {
        self.registry
            .register_group(&self.name, &self.target, self.priority)?;
        for injection in self.injections {
            self.registry.register_injector(&self.name, injection)?;
        }
        for (name, member) in self.members {
            self.registry.add_member(&self.target, &name, member)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    groups: IndexMap<String, Group>,
    injectors: IndexMap<(String, String), Vec<Registration>>,
    members: IndexMap<String, Vec<(String, ClassMember)>>,
    next_sequence: u64,
    frozen: bool,
}

#[derive(Serialize)]
struct FingerprintEntry<'a> {
    group: &'a str,
    target: &'a str,
    method: &'a str,
    descriptor: &'a InjectionDescriptor,
    callback: &'a str,
    priority: i32,
    group_priority: i32,
    require: Option<usize>,
    expect: Option<usize>,
    policy: Policy,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(&mut self, name: impl Into<String>, target: impl Into<String>) -> GroupBuilder<'_> {
        GroupBuilder {
            registry: self,
            name: name.into(),
            target: target.into(),
            priority: DEFAULT_PRIORITY,
            injections: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn register_group(&mut self, name: &str, target: &str, priority: i32) -> Result<(), ConfigError> {
        self.ensure_open(|| format!("group '{name}'"))?;
        let target = target.trim();
        if target.is_empty() {
            return Err(ConfigError::EmptyTarget);
        }
        self.groups.insert(
            name.to_string(),
            Group {
                name: name.to_string(),
                target: target.to_string(),
                priority,
            },
        );
        Ok(())
    }

    pub fn register_injector(&mut self, group: &str, injection: Injection) -> Result<(), ConfigError> {
        self.ensure_open(|| format!("an injector for group '{group}'"))?;
        let group = self
            .groups
            .get(group)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownGroup(group.to_string()))?;

        let method = injection.method.trim().to_string();
        if method.is_empty() {
            return Err(ConfigError::EmptyMethod);
        }
        injection.descriptor.validate()?;

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let callback_name = injection
            .name
            .unwrap_or_else(|| format!("{}.callback_{sequence:08}", group.name));

        let registration = Registration {
            group: group.name.clone(),
            target: group.target.clone(),
            method: method.clone(),
            descriptor: injection.descriptor,
            callback: injection.callback,
            callback_name,
            priority: injection.priority,
            require: injection.require,
            expect: injection.expect,
            policy: injection.policy,
            group_priority: group.priority,
            sequence,
        };
        tracing::debug!(
            group = %registration.group,
            target_name = %registration.target,
            method = %registration.method,
            descriptor = %registration.descriptor,
            "registered injector"
        );

        let chain = self.injectors.entry((group.target, method)).or_default();
        chain.push(registration);
        chain.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
        Ok(())
    }

    /// Attach an attribute or method to the class at `target` once its module
    /// has run. A later member with the same name replaces the earlier one.
    pub fn add_member(&mut self, target: &str, name: &str, member: ClassMember) -> Result<(), ConfigError> {
        self.ensure_open(|| format!("member '{name}' for '{target}'"))?;
        let target = target.trim();
        if target.is_empty() {
            return Err(ConfigError::EmptyTarget);
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::EmptyMember);
        }
        let members = self.members.entry(target.to_string()).or_default();
        members.retain(|(existing, _)| existing != name);
        members.push((name.to_string(), member));
        tracing::debug!(target_name = target, member = name, "registered class member");
        Ok(())
    }

    /// Members for targets inside `module`: the module itself or any dotted
    /// path below it.
    pub fn class_members<'a>(
        &'a self,
        module: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a [(String, ClassMember)])> + 'a {
        self.members.iter().filter_map(move |(target, members)| {
            let inside = target == module
                || target
                    .strip_prefix(module)
                    .is_some_and(|rest| rest.starts_with('.'));
            inside.then_some((target.as_str(), members.as_slice()))
        })
    }

    /// Registrations for one method, in dispatch order.
    pub fn get_injectors(&self, target: &str, method: &str) -> Vec<&Registration> {
        self.injectors
            .get(&(target.to_string(), method.to_string()))
            .map(|chain| chain.iter().collect())
            .unwrap_or_default()
    }

    /// Every registration, grouped by `(target, method)` in registration order.
    pub fn registrations(&self) -> impl Iterator<Item = &Registration> {
        self.injectors.values().flatten()
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    /// Targets with at least one injector.
    pub fn targets(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.injectors.keys().map(|(t, _)| t.as_str()).collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn unfreeze(&mut self) {
        self.frozen = false;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Remove a callback by name; returns whether anything was removed.
    pub fn unregister(&mut self, target: &str, method: &str, callback_name: &str) -> bool {
        let key = (target.to_string(), method.to_string());
        let Some(chain) = self.injectors.get_mut(&key) else {
            return false;
        };
        let before = chain.len();
        chain.retain(|r| r.callback_name != callback_name);
        let removed = chain.len() != before;
        if chain.is_empty() {
            self.injectors.shift_remove(&key);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.injectors.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.injectors.is_empty() && self.members.is_empty()
    }

    /// Hash of everything that affects weaving output.
    pub fn fingerprint(&self) -> u64 {
        let mut keys: Vec<&(String, String)> = self.injectors.keys().collect();
        keys.sort();
        let entries: Vec<FingerprintEntry<'_>> = keys
            .into_iter()
            .flat_map(|key| &self.injectors[key])
            .map(|r| FingerprintEntry {
                group: &r.group,
                target: &r.target,
                method: &r.method,
                descriptor: &r.descriptor,
                callback: &r.callback_name,
                priority: r.priority,
                group_priority: r.group_priority,
                require: r.require,
                expect: r.expect,
                policy: r.policy,
            })
            .collect();
        // Descriptors and policies always serialize; an empty payload is unreachable.
        let payload = serde_json::to_vec(&entries).unwrap_or_default();
        xxh3_64(&payload)
    }

    fn ensure_open(&self, what: impl FnOnce() -> String) -> Result<(), ConfigError> {
        if self.frozen {
            return Err(ConfigError::Frozen { what: what() });
        }
        Ok(())
    }
}

/// Process-wide registry used by the CLI and by hosts that do not pass one.
pub fn global() -> Arc<RwLock<Registry>> {
    static GLOBAL: OnceLock<Arc<RwLock<Registry>>> = OnceLock::new();
    GLOBAL
        .get_or_init(|| Arc::new(RwLock::new(Registry::new())))
        .clone()
}
