use super::dispatch::{Chain, Injector};
use crate::config::WeaveConfig;
use crate::model::PointKey;
use crate::registry::Registry;
use std::collections::HashMap;

/// Read-only map from woven point to its callback chain, built once per
/// module execution.
#[derive(Debug, Default)]
pub struct InjectorMap {
    chains: HashMap<PointKey, Vec<Injector>>,
    trace: bool,
}

impl InjectorMap {
    /// Collect the chains of every target inside `module` (the module itself
    /// and its classes).
    pub fn build(registry: &Registry, module: &str) -> Self {
        let nested = format!("{module}.");
        let mut chains: HashMap<PointKey, Vec<Injector>> = HashMap::new();
        for target in registry.targets() {
            if target != module && !target.starts_with(&nested) {
                continue;
            }
            for reg in registry.registrations().filter(|r| r.target == target) {
                let key = PointKey::new(&reg.target, &reg.method, reg.descriptor.clone());
                chains.entry(key).or_default().push(Injector {
                    name: reg.callback_name.clone(),
                    group: reg.group.clone(),
                    callback: reg.callback.clone(),
                    condition: reg
                        .descriptor
                        .location
                        .as_ref()
                        .and_then(|loc| loc.condition.clone()),
                });
            }
        }
        Self {
            chains,
            trace: false,
        }
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// The chain for a point; empty when nothing is registered there.
    pub fn chain(&self, point: &PointKey) -> Chain<'_> {
        Chain {
            injectors: self.chains.get(point).map(Vec::as_slice).unwrap_or(&[]),
            trace: self.trace,
        }
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

/// Explicit handle woven code dispatches through.
#[derive(Debug, Default)]
pub struct ModuleServices {
    pub injectors: InjectorMap,
    pub config: WeaveConfig,
}

impl ModuleServices {
    pub fn new(registry: &Registry, module: &str, config: WeaveConfig) -> Self {
        Self {
            injectors: InjectorMap::build(registry, module).with_trace(config.trace),
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Condition, InjectionDescriptor, InjectionKind, Location};
    use crate::registry::Injection;
    use crate::runtime::Callback;

    fn noop() -> Callback {
        Callback::sync(|_, _, _, _| Ok(()))
    }

    #[test]
    fn includes_module_and_class_targets_only() {
        let mut reg = Registry::new();
        let entry = InjectionDescriptor::new(InjectionKind::Entry);
        for (group, target) in [("a", "game"), ("b", "game.Player"), ("c", "gamer"), ("d", "other.game")] {
            reg.group(group, target)
                .add(Injection::new("f", entry.clone(), noop()))
                .register()
                .unwrap();
        }
        let map = InjectorMap::build(&reg, "game");
        assert_eq!(map.len(), 2);
        assert_eq!(map.chain(&PointKey::new("game.Player", "f", entry.clone())).injectors.len(), 1);
        assert!(map.chain(&PointKey::new("gamer", "f", entry)).is_empty());
    }

    #[test]
    fn refinements_key_separate_chains_and_carry_conditions() {
        let mut reg = Registry::new();
        let plain = InjectionDescriptor::new(InjectionKind::Parameter).with_target("amount");
        let guarded = plain
            .clone()
            .with_location(Location::new().when(Condition::lt("value", 0)));
        reg.group("g", "m")
            .add(Injection::new("f", plain.clone(), noop()).named("one"))
            .add(Injection::new("f", guarded.clone(), noop()).named("two"))
            .register()
            .unwrap();
        let map = InjectorMap::build(&reg, "m").with_trace(true);
        let chain = map.chain(&PointKey::new("m", "f", guarded));
        assert_eq!(chain.injectors.len(), 1);
        assert!(chain.trace);
        assert!(chain.injectors[0].condition.is_some());
        assert!(map.chain(&PointKey::new("m", "f", plain)).injectors[0].condition.is_none());
    }
}
