//! Applies location refinements to raw matches.
//!
//! Matches are ordered by `(statement index, position within the statement)`
//! where statements are flattened in structural order and positions count
//! pre-order over the statement's own expressions (the statement itself is
//! position 0). Anchors are descriptors resolved in full against the same
//! function; the first of their matches is the anchor position.

use crate::ast::walk::{flatten, stmt_exprs};
use crate::ast::{FunctionDef, NodeId};
use crate::handlers::{HandlerTable, Match, Site};
use crate::model::{InjectionDescriptor, Location, Occurrence};
use std::collections::HashMap;

/// `(statement index, position within the statement)`.
pub type OrderKey = (usize, usize);

/// Order keys of every node in one function.
#[derive(Debug, Clone)]
pub struct Positions {
    stmts: HashMap<NodeId, usize>,
    exprs: HashMap<NodeId, OrderKey>,
    len: usize,
}

impl Positions {
    pub fn of(func: &FunctionDef) -> Self {
        let flat = flatten(&func.body);
        let mut stmts = HashMap::new();
        let mut exprs = HashMap::new();
        for (i, stmt) in flat.iter().enumerate() {
            stmts.insert(stmt.id, i);
            for (j, expr) in stmt_exprs(stmt).into_iter().enumerate() {
                exprs.insert(expr.id, (i, j + 1));
            }
        }
        Self {
            stmts,
            exprs,
            len: flat.len(),
        }
    }

    pub fn key(&self, site: &Site) -> Option<OrderKey> {
        match site {
            Site::Body | Site::Param(_) => Some((0, 0)),
            Site::Stmt(id) => self.stmts.get(id).map(|&i| (i, 0)),
            Site::Expr(id) => self.exprs.get(id).copied(),
            Site::End => Some((self.len, 0)),
        }
    }
}

/// Resolves descriptors against one function.
pub struct Resolver<'a> {
    func: &'a FunctionDef,
    handlers: &'a HandlerTable,
    positions: Positions,
}

impl<'a> Resolver<'a> {
    pub fn new(func: &'a FunctionDef, handlers: &'a HandlerTable) -> Self {
        Self {
            func,
            handlers,
            positions: Positions::of(func),
        }
    }

    /// Find and refine in one step.
    pub fn matches(&self, descriptor: &InjectionDescriptor) -> Vec<Match> {
        let raw = self.handlers.find(self.func, descriptor);
        self.resolve(raw, descriptor)
    }

    /// Order `raw` and apply the descriptor's refinements.
    ///
    /// An empty result is never an error here; match counts are judged by
    /// the weaver.
    pub fn resolve(&self, raw: Vec<Match>, descriptor: &InjectionDescriptor) -> Vec<Match> {
        let mut keyed: Vec<(OrderKey, Match)> = raw
            .into_iter()
            .filter_map(|m| self.positions.key(&m.site).map(|k| (k, m)))
            .collect();
        keyed.sort_by_key(|(k, _)| *k);
        keyed.dedup_by(|a, b| a.1 == b.1);

        if let Some(location) = &descriptor.location {
            keyed = self.refine(keyed, location);
        }
        keyed.into_iter().map(|(_, m)| m).collect()
    }

    fn anchor(&self, descriptor: &InjectionDescriptor) -> Option<OrderKey> {
        self.matches(descriptor)
            .iter()
            .filter_map(|m| self.positions.key(&m.site))
            .min()
    }

    fn refine(&self, mut keyed: Vec<(OrderKey, Match)>, loc: &Location) -> Vec<(OrderKey, Match)> {
        if let Some(slice) = &loc.slice {
            let from = slice.from.as_deref().and_then(|d| self.anchor(d));
            let to = slice.to.as_deref().and_then(|d| self.anchor(d));
            keyed.retain(|(k, _)| {
                let after = match from {
                    Some(f) if slice.include_from => *k >= f,
                    Some(f) => *k > f,
                    None => true,
                };
                let before = match to {
                    Some(t) if slice.include_to => *k <= t,
                    Some(t) => *k < t,
                    None => true,
                };
                after && before
            });
        }

        if let Some(near) = &loc.near {
            match self.anchor(&near.anchor) {
                Some((anchor_stmt, _)) => {
                    keyed.retain(|((stmt, _), _)| stmt.abs_diff(anchor_stmt) <= near.max_distance)
                }
                None => keyed.clear(),
            }
        }

        if let Some(spec) = &loc.anchor {
            keyed = match self.anchor(&spec.anchor) {
                Some(a) => {
                    let picked = if spec.offset >= 0 {
                        let pick = spec.offset as usize;
                        keyed
                            .into_iter()
                            .filter(|(k, _)| if spec.inclusive { *k >= a } else { *k > a })
                            .nth(pick)
                    } else {
                        let pick = spec.offset.unsigned_abs() as usize - 1;
                        keyed
                            .into_iter()
                            .filter(|(k, _)| if spec.inclusive { *k <= a } else { *k < a })
                            .rev()
                            .nth(pick)
                    };
                    picked.into_iter().collect()
                }
                None => Vec::new(),
            };
        }

        if let Some(line) = &loc.line {
            keyed.retain(|(_, m)| line.contains(m.line));
        }

        match loc.occurrence {
            Occurrence::All => {}
            Occurrence::First => keyed.truncate(1),
            Occurrence::Last => {
                let skip = keyed.len().saturating_sub(1);
                keyed.drain(..skip);
            }
        }

        if let Some(n) = loc.ordinal {
            keyed = keyed.into_iter().nth(n).into_iter().collect();
        }
        keyed
    }
}

/// Resolve one descriptor against `func` with the given handlers.
pub fn resolve(func: &FunctionDef, descriptor: &InjectionDescriptor, handlers: &HandlerTable) -> Vec<Match> {
    Resolver::new(func, handlers).matches(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InjectionKind, Location};

    const SOURCE: &str = "\
def f(self, x):
    self.log('start')
    a = self.calc(x)
    self.log('mid')
    b = self.calc(a)
    if b:
        self.log('branch')
    c = self.calc(b)
    return c
";

    fn func() -> FunctionDef {
        let module = crate::ts::parse_module(SOURCE).unwrap();
        module.find_function("f").unwrap().clone()
    }

    fn call(path: &str) -> InjectionDescriptor {
        InjectionDescriptor::new(InjectionKind::CallSite).with_target(path)
    }

    fn lines(func: &FunctionDef, d: &InjectionDescriptor) -> Vec<usize> {
        resolve(func, d, &HandlerTable::standard())
            .iter()
            .map(|m| m.line)
            .collect()
    }

    fn logged(text: &str) -> InjectionDescriptor {
        use crate::model::{ArgPattern, CallSelector};
        InjectionDescriptor::new(InjectionKind::CallSite).with_selector(
            CallSelector::callee("self.log")
                .with_positional(vec![ArgPattern::Const(text.into())], Default::default()),
        )
    }

    #[test]
    fn no_location_keeps_structural_order() {
        let f = func();
        assert_eq!(lines(&f, &call("self.calc")), vec![3, 5, 8]);
    }

    #[test]
    fn ordinal_and_occurrence() {
        let f = func();
        let d = call("self.calc");
        assert_eq!(lines(&f, &d.clone().with_location(Location::new().ordinal(1))), vec![5]);
        assert_eq!(lines(&f, &d.clone().with_location(Location::new().ordinal(9))), Vec::<usize>::new());
        assert_eq!(lines(&f, &d.clone().with_location(Location::new().last())), vec![8]);
        let first = lines(&f, &d.clone().with_location(Location::new().first()));
        let zeroth = lines(&f, &d.with_location(Location::new().ordinal(0)));
        assert_eq!(first, zeroth);
    }

    #[test]
    fn slice_bounds() {
        let f = func();
        let d = call("self.calc");
        let open_end = d
            .clone()
            .with_location(Location::new().slice(Some(logged("mid")), None, false, false));
        assert_eq!(lines(&f, &open_end), vec![5, 8]);

        let window = d.clone().with_location(Location::new().slice(
            Some(logged("start")),
            Some(logged("branch")),
            false,
            false,
        ));
        assert_eq!(lines(&f, &window), vec![3, 5]);

        let unbounded = d.clone().with_location(Location::new().slice(None, None, false, false));
        assert_eq!(lines(&f, &unbounded), lines(&f, &d));

        let missing = d.clone().with_location(Location::new().slice(Some(logged("nope")), None, false, false));
        assert_eq!(lines(&f, &missing), vec![3, 5, 8]);
    }

    #[test]
    fn near_counts_statements_only() {
        let f = func();
        let d = call("self.calc").with_location(Location::new().near(logged("mid"), 1));
        assert_eq!(lines(&f, &d), vec![3, 5]);
        let gone = call("self.calc").with_location(Location::new().near(logged("nope"), 10));
        assert!(lines(&f, &gone).is_empty());
    }

    #[test]
    fn anchor_offsets() {
        let f = func();
        let after = call("self.calc").with_location(Location::new().anchored(logged("mid"), 0, false));
        assert_eq!(lines(&f, &after), vec![5]);
        let second_after = call("self.calc").with_location(Location::new().anchored(logged("mid"), 1, false));
        assert_eq!(lines(&f, &second_after), vec![8]);
        let before = call("self.calc").with_location(Location::new().anchored(logged("mid"), -1, false));
        assert_eq!(lines(&f, &before), vec![3]);
        let too_far = call("self.calc").with_location(Location::new().anchored(logged("mid"), -2, false));
        assert!(lines(&f, &too_far).is_empty());
    }

    #[test]
    fn line_filter_runs_before_ordinal() {
        let f = func();
        let d = call("self.calc").with_location(Location::new().lines(4, 9).ordinal(0));
        assert_eq!(lines(&f, &d), vec![5]);
    }

    #[test]
    fn resolving_twice_is_stable() {
        let f = func();
        let table = HandlerTable::standard();
        let d = call("self.calc").with_location(Location::new().near(logged("branch"), 2).last());
        let resolver = Resolver::new(&f, &table);
        assert_eq!(resolver.matches(&d), resolver.matches(&d));
    }
}
