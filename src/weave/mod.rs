//! Module weaving.
//!
//! For every module-level function (target = the module) and every method
//! of a top-level class (target = `module.Class`) that has registrations,
//! the weaver groups registrations by descriptor, resolves each group once,
//! enforces `require` / `expect` and instruments the function. Any fatal
//! mismatch aborts the module: no partially woven tree is returned.

mod errors;
mod policy;
mod transformer;

pub use errors::{Hint, Mismatch, WeaveError};
pub use policy::{verdict, CountKind, Verdict};

use crate::ast::{FunctionDef, IdGen, Module, StmtKind};
use crate::handlers::HandlerTable;
use crate::model::InjectionDescriptor;
use crate::registry::{Registration, Registry};
use std::collections::BTreeSet;
use std::fmt;

/// Minimum similarity for a "did you mean" hint.
const SUGGESTION_THRESHOLD: f64 = 0.8;

/// One descriptor group woven into one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointReport {
    pub target: String,
    pub method: String,
    pub descriptor: InjectionDescriptor,
    /// Lines of the resolved matches.
    pub lines: Vec<usize>,
    pub callbacks: usize,
}

impl PointReport {
    pub fn matched(&self) -> usize {
        self.lines.len()
    }
}

/// What weaving one module did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeaveReport {
    pub module: String,
    pub points: Vec<PointReport>,
    pub warnings: Vec<String>,
}

impl WeaveReport {
    /// Whether any hook was inserted.
    pub fn is_woven(&self) -> bool {
        self.points.iter().any(|p| p.matched() > 0)
    }

    pub fn total_matches(&self) -> usize {
        self.points.iter().map(PointReport::matched).sum()
    }
}

impl fmt::Display for WeaveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "module {}: {} point(s)", self.module, self.points.len())?;
        for p in &self.points {
            let lines: Vec<String> = p.lines.iter().map(usize::to_string).collect();
            writeln!(
                f,
                "  {}.{} {} -> {} match(es) [{}], {} callback(s)",
                p.target,
                p.method,
                p.descriptor,
                p.matched(),
                lines.join(", "),
                p.callbacks
            )?;
        }
        for w in &self.warnings {
            writeln!(f, "  warning: {}", w.lines().next().unwrap_or_default())?;
        }
        Ok(())
    }
}

/// Weaves modules against one registry.
pub struct Weaver<'a> {
    registry: &'a Registry,
    handlers: HandlerTable,
}

impl<'a> Weaver<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            handlers: HandlerTable::standard(),
        }
    }

    pub fn with_handlers(mut self, handlers: HandlerTable) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }

    /// Parse and weave `source` as module `module_name`.
    pub fn weave_source(&self, source: &str, module_name: &str) -> Result<(Module, WeaveReport), WeaveError> {
        let module = crate::ts::parse_module(source).map_err(|source| WeaveError::Parse {
            module: module_name.to_string(),
            source,
        })?;
        self.weave(module, module_name)
    }

    pub fn weave(&self, mut module: Module, module_name: &str) -> Result<(Module, WeaveReport), WeaveError> {
        let mut report = WeaveReport {
            module: module_name.to_string(),
            ..WeaveReport::default()
        };
        self.check_missing(&module, module_name, &mut report)?;

        let Module { body, ids } = &mut module;
        for stmt in body.iter_mut() {
            match &mut stmt.kind {
                StmtKind::FunctionDef(func) => {
                    self.weave_one(func, module_name, ids, &mut report)?;
                }
                StmtKind::ClassDef(class) => {
                    let target = format!("{module_name}.{}", class.name);
                    for member in class.body.iter_mut() {
                        if let StmtKind::FunctionDef(func) = &mut member.kind {
                            self.weave_one(func, &target, ids, &mut report)?;
                        }
                    }
                }
                _ => {}
            }
        }
        tracing::debug!(
            module = module_name,
            points = report.points.len(),
            matches = report.total_matches(),
            "module woven"
        );
        Ok((module, report))
    }

    fn weave_one(
        &self,
        func: &mut FunctionDef,
        target: &str,
        ids: &mut IdGen,
        report: &mut WeaveReport,
    ) -> Result<(), WeaveError> {
        let registrations = self.registry.get_injectors(target, &func.name);
        if registrations.is_empty() {
            return Ok(());
        }
        transformer::weave_function(func, target, &registrations, &self.handlers, ids, report)
    }

    /// Registrations naming a function the module or one of its classes does
    /// not define count as zero matches. Targets that are neither (such as a
    /// submodule) are left to their own module.
    fn check_missing(&self, module: &Module, module_name: &str, report: &mut WeaveReport) -> Result<(), WeaveError> {
        let nested = format!("{module_name}.");
        let missing: Vec<&Registration> = self
            .registry
            .registrations()
            .filter(|r| r.target == module_name || r.target.starts_with(&nested))
            .filter(|r| {
                matches!(defined_names(module, module_name, &r.target), Some(names) if !names.contains(r.method.as_str()))
            })
            .collect();

        let mut warned = BTreeSet::new();
        for reg in missing {
            let known = defined_names(module, module_name, &reg.target).unwrap_or_default();
            let suggestion = suggest(&reg.method, known.iter().copied());
            if warned.insert((reg.target.as_str(), reg.method.as_str())) {
                let mut text = format!("no function '{}' in '{}'", reg.method, reg.target);
                if let Some(name) = &suggestion {
                    text.push_str(&format!("; did you mean '{name}'?"));
                }
                tracing::warn!("{text}");
                report.warnings.push(text);
            }
            let hint = suggestion.map(Hint::Method);
            transformer::check_counts(reg, 0, hint.as_ref(), report)?;
        }
        Ok(())
    }
}

/// Function names defined for `target`, or `None` when no such class exists.
fn defined_names<'m>(module: &'m Module, module_name: &str, target: &str) -> Option<BTreeSet<&'m str>> {
    if target == module_name {
        return Some(module.functions().map(|f| f.name.as_str()).collect());
    }
    let class_name = target.strip_prefix(module_name)?.strip_prefix('.')?;
    module
        .classes()
        .find(|c| c.name == class_name)
        .map(|c| c.methods().map(|f| f.name.as_str()).collect())
}

/// Closest candidate to `name` by Jaro-Winkler similarity.
pub fn suggest<'c>(name: &str, candidates: impl IntoIterator<Item = &'c str>) -> Option<String> {
    candidates
        .into_iter()
        .map(|c| (strsim::jaro_winkler(name, c), c))
        .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::unparse::unparse_module;
    use crate::model::{InjectionKind, Location, Policy};
    use crate::registry::Injection;
    use crate::runtime::Callback;

    const SOURCE: &str = "\
def helper(x):
    return x + 1

class Player:
    def tick(self, dt):
        self.t = dt
        return dt

    def heal(self, amount):
        return amount
";

    fn noop() -> Callback {
        Callback::sync(|_, _, _, _| Ok(()))
    }

    fn registry(target: &str, injection: Injection) -> Registry {
        let mut reg = Registry::new();
        reg.group("g", target).add(injection).register().unwrap();
        reg
    }

    #[test]
    fn unregistered_module_is_untouched() {
        let reg = Registry::new();
        let (module, report) = Weaver::new(&reg).weave_source(SOURCE, "game").unwrap();
        assert!(!report.is_woven());
        assert!(report.points.is_empty());
        let pristine = crate::ts::parse_module(SOURCE).unwrap();
        assert_eq!(unparse_module(&module), unparse_module(&pristine));
    }

    #[test]
    fn class_and_module_targets() {
        let mut reg = Registry::new();
        reg.group("a", "game.Player")
            .add(Injection::new("tick", InjectionDescriptor::new(InjectionKind::PreReturn), noop()))
            .register()
            .unwrap();
        reg.group("b", "game")
            .add(Injection::new("helper", InjectionDescriptor::new(InjectionKind::Entry), noop()))
            .register()
            .unwrap();
        let (_, report) = Weaver::new(&reg).weave_source(SOURCE, "game").unwrap();
        assert_eq!(report.points.len(), 2);
        assert_eq!(report.points[0].target, "game");
        assert_eq!(report.points[1].lines, vec![7, 7]);
    }

    #[test]
    fn pre_return_end_match_counts_toward_require() {
        let d = InjectionDescriptor::new(InjectionKind::PreReturn);
        let reg = registry("game.Player", Injection::new("heal", d.clone(), noop()).require(2));
        let (_, report) = Weaver::new(&reg).weave_source(SOURCE, "game").unwrap();
        assert_eq!(report.points[0].lines, vec![10, 10]);

        let reg = registry("game.Player", Injection::new("heal", d, noop()).require(1));
        let WeaveError::MatchCount(m) = Weaver::new(&reg).weave_source(SOURCE, "game").unwrap_err() else {
            panic!("expected a match-count error");
        };
        assert_eq!((m.matched, m.expected), (2, 1));
    }

    #[test]
    fn require_mismatch_is_fatal_under_error() {
        let d = InjectionDescriptor::new(InjectionKind::CallSite).with_target("self.missing");
        let reg = registry("game.Player", Injection::new("tick", d, noop()).require(1));
        let err = Weaver::new(&reg).weave_source(SOURCE, "game").unwrap_err();
        let WeaveError::MatchCount(m) = err else {
            panic!("expected a match-count error");
        };
        assert_eq!((m.matched, m.expected), (0, 1));
        assert!(m.to_string().contains("require mismatch for 'game.Player.tick'"));
    }

    #[test]
    fn expect_mismatch_warns_under_error() {
        let d = InjectionDescriptor::new(InjectionKind::PreReturn);
        let reg = registry("game.Player", Injection::new("tick", d, noop()).expect(5));
        let (_, report) = Weaver::new(&reg).weave_source(SOURCE, "game").unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert!(report.is_woven());

        let d = InjectionDescriptor::new(InjectionKind::PreReturn)
            .with_location(Location::new().ordinal(7));
        let reg = registry(
            "game.Player",
            Injection::new("tick", d, noop()).expect(1).policy(Policy::Strict),
        );
        assert!(Weaver::new(&reg).weave_source(SOURCE, "game").is_err());
    }

    #[test]
    fn misspelled_method_suggests_the_closest_name() {
        let d = InjectionDescriptor::new(InjectionKind::Entry);
        let reg = registry("game.Player", Injection::new("tik", d, noop()).require(1));
        let err = Weaver::new(&reg).weave_source(SOURCE, "game").unwrap_err();
        assert!(err.to_string().contains("did you mean 'tick'?"));

        let d = InjectionDescriptor::new(InjectionKind::Entry);
        let reg = registry("game.Player", Injection::new("tik", d, noop()).policy(Policy::Warn));
        let (_, report) = Weaver::new(&reg).weave_source(SOURCE, "game").unwrap();
        assert_eq!(report.warnings, vec!["no function 'tik' in 'game.Player'; did you mean 'tick'?"]);
    }

    #[test]
    fn unmatched_attribute_path_suggests_a_near_one() {
        let d = InjectionDescriptor::new(InjectionKind::AttributeWrite).with_target("self.tt");
        let reg = registry("game.Player", Injection::new("tick", d, noop()).require(1));
        let err = Weaver::new(&reg).weave_source(SOURCE, "game").unwrap_err();
        assert!(err.to_string().contains("no 'self.tt' here; did you mean 'self.t'?"));
    }

    #[test]
    fn suggestions_need_similarity() {
        assert_eq!(suggest("heal", ["heal_all", "tick"]), Some("heal_all".to_string()));
        assert_eq!(suggest("zzz", ["heal", "tick"]), None);
    }
}
