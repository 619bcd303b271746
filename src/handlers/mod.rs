//! One handler per injection kind.
//!
//! A handler finds the raw matches of a descriptor in a function and later
//! rewrites the function at the resolved matches. Matches name nodes by
//! [`NodeId`], so several groups can be found against the pristine function
//! and instrumented one after another.

mod attribute;
mod call_site;
mod constant;
mod entry;
mod exception;
mod parameter;
mod pre_return;
mod produced;

pub use attribute::AttributeWriteHandler;
pub use call_site::CallSiteHandler;
pub use constant::ConstantHandler;
pub use entry::EntryHandler;
pub use exception::ExceptionHandler;
pub use parameter::ParameterHandler;
pub use pre_return::PreReturnHandler;
pub use produced::ProducedValueHandler;

use crate::ast::walk::{for_each_expr_mut, for_each_stmt_mut};
use crate::ast::{Expr, ExprKind, FunctionDef, HookExpr, HookStmt, IdGen, NodeId, Stmt, StmtKind};
use crate::model::{InjectionDescriptor, InjectionKind, PointKey};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// What a match refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Site {
    /// The start of the function body.
    Body,
    /// A parameter, by name.
    Param(String),
    Stmt(NodeId),
    Expr(NodeId),
    /// Falling off the end of the body.
    End,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Match {
    pub site: Site,
    /// Source line used by line refinements.
    pub line: usize,
}

impl Match {
    pub fn new(site: Site, line: usize) -> Self {
        Self { site, line }
    }
}

/// Per-group state handed to [`Handler::instrument`].
pub struct Instrument<'a> {
    pub point: &'a PointKey,
    pub ids: &'a mut IdGen,
    pub is_async: bool,
}

impl Instrument<'_> {
    pub fn expr(&mut self, line: usize, kind: ExprKind) -> Expr {
        Expr::new(self.ids.next_id(), line, kind)
    }

    pub fn stmt(&mut self, line: usize, kind: StmtKind) -> Stmt {
        Stmt {
            id: self.ids.next_id(),
            line,
            kind,
        }
    }

    /// Value hook around `value`.
    pub fn hook(&mut self, value: Expr) -> Expr {
        let line = value.line;
        let kind = ExprKind::Hook(HookExpr {
            point: self.point.clone(),
            value: Box::new(value),
            is_async: self.is_async,
        });
        self.expr(line, kind)
    }

    /// Replace `expr` by a value hook around it. The hook takes over the
    /// node's id so later groups still find it.
    pub fn wrap_in_place(&mut self, expr: &mut Expr) {
        let mut inner = std::mem::replace(expr, Expr::detached());
        let id = inner.id;
        inner.id = self.ids.next_id();
        let mut hooked = self.hook(inner);
        hooked.id = id;
        *expr = hooked;
    }

    pub fn hook_stmt(&mut self, line: usize, subject: Option<Expr>, rebind: Option<String>) -> Stmt {
        let kind = StmtKind::Hook(HookStmt {
            point: self.point.clone(),
            subject,
            rebind,
            is_async: self.is_async,
        });
        self.stmt(line, kind)
    }

    /// Copy of `expr` with fresh ids.
    pub fn renumber(&mut self, expr: &Expr) -> Expr {
        let mut copy = expr.clone();
        crate::ast::walk::walk_expr_mut(&mut copy, &mut |e| e.id = self.ids.next_id());
        copy
    }
}

pub trait Handler: Send + Sync {
    fn kind(&self) -> InjectionKind;

    /// Raw matches in structural order; refinements are not applied.
    fn find(&self, func: &FunctionDef, descriptor: &InjectionDescriptor) -> Vec<Match>;

    /// Rewrite `func` at `matches`.
    fn instrument(&self, func: &mut FunctionDef, matches: &[Match], cx: &mut Instrument<'_>);

    /// Targets this kind could match in `func`, for "did you mean" hints.
    fn candidates(&self, _func: &FunctionDef) -> Vec<String> {
        Vec::new()
    }
}

/// Handlers keyed by kind.
pub struct HandlerTable {
    handlers: HashMap<InjectionKind, Box<dyn Handler>>,
}

impl HandlerTable {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// A table with the built-in handler for every kind.
    pub fn standard() -> Self {
        let mut table = Self::empty();
        table.register(Box::new(EntryHandler));
        table.register(Box::new(PreReturnHandler));
        table.register(Box::new(ParameterHandler));
        table.register(Box::new(ConstantHandler));
        table.register(Box::new(CallSiteHandler));
        table.register(Box::new(AttributeWriteHandler));
        table.register(Box::new(ExceptionHandler));
        table.register(Box::new(ProducedValueHandler));
        table
    }

    /// Install a handler, replacing the one for its kind.
    pub fn register(&mut self, handler: Box<dyn Handler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    pub fn get(&self, kind: InjectionKind) -> Option<&dyn Handler> {
        self.handlers.get(&kind).map(Box::as_ref)
    }

    pub fn find(&self, func: &FunctionDef, descriptor: &InjectionDescriptor) -> Vec<Match> {
        self.get(descriptor.kind)
            .map(|h| h.find(func, descriptor))
            .unwrap_or_default()
    }

    pub fn candidates(&self, func: &FunctionDef, kind: InjectionKind) -> Vec<String> {
        self.get(kind).map(|h| h.candidates(func)).unwrap_or_default()
    }
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.handlers.keys().collect();
        kinds.sort();
        f.debug_struct("HandlerTable").field("kinds", &kinds).finish()
    }
}

/// Line of the first statement, or of the `def` for an empty body.
pub(crate) fn body_line(func: &FunctionDef) -> usize {
    func.body.first().map(|s| s.line).unwrap_or(func.line)
}

pub(crate) fn expr_ids(matches: &[Match]) -> HashSet<NodeId> {
    matches
        .iter()
        .filter_map(|m| match m.site {
            Site::Expr(id) => Some(id),
            _ => None,
        })
        .collect()
}

pub(crate) fn stmt_ids(matches: &[Match]) -> HashSet<NodeId> {
    matches
        .iter()
        .filter_map(|m| match m.site {
            Site::Stmt(id) => Some(id),
            _ => None,
        })
        .collect()
}

/// Apply `f` to every expression of the function whose id was matched.
pub(crate) fn rewrite_exprs(func: &mut FunctionDef, matches: &[Match], f: &mut dyn FnMut(&mut Expr)) {
    let wanted = expr_ids(matches);
    if wanted.is_empty() {
        return;
    }
    for_each_expr_mut(&mut func.body, &mut |e| {
        if wanted.contains(&e.id) {
            f(e);
        }
    });
}

/// Apply `f` to every statement of the function whose id was matched.
pub(crate) fn rewrite_stmts(func: &mut FunctionDef, matches: &[Match], f: &mut dyn FnMut(&mut Stmt)) {
    let wanted = stmt_ids(matches);
    if wanted.is_empty() {
        return;
    }
    for_each_stmt_mut(&mut func.body, &mut |s| {
        if wanted.contains(&s.id) {
            f(s);
        }
    });
}

/// Index after the statement hooks already inserted at the top of the body,
/// so hooks run in the order their groups were instrumented.
pub(crate) fn after_leading_hooks(body: &[Stmt]) -> usize {
    body.iter()
        .take_while(|s| matches!(s.kind, StmtKind::Hook(_)))
        .count()
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::ast::{FunctionDef, Module};
    use crate::model::{InjectionDescriptor, PointKey};

    use super::{HandlerTable, Instrument, Match};

    pub fn module(source: &str) -> Module {
        crate::ts::parse_module(source).unwrap()
    }

    pub fn function(module: &Module, name: &str) -> FunctionDef {
        module.find_function(name).unwrap().clone()
    }

    /// Find and instrument `descriptor` in `name`, returning the raw matches.
    pub fn weave_one(module: &mut Module, name: &str, descriptor: InjectionDescriptor) -> Vec<Match> {
        let table = HandlerTable::standard();
        let mut func = function(module, name);
        let matches = table.find(&func, &descriptor);
        let point = PointKey::new("m", name, descriptor.clone());
        let mut cx = Instrument {
            point: &point,
            ids: &mut module.ids,
            is_async: func.is_async,
        };
        table
            .get(descriptor.kind)
            .unwrap()
            .instrument(&mut func, &matches, &mut cx);
        for stmt in &mut module.body {
            if let crate::ast::StmtKind::FunctionDef(f) = &mut stmt.kind {
                if f.name == name {
                    *f = func.clone();
                }
            }
        }
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_covers_every_kind() {
        let table = HandlerTable::standard();
        for kind in InjectionKind::ALL {
            assert_eq!(table.get(kind).map(|h| h.kind()), Some(kind));
        }
        assert!(HandlerTable::empty().get(InjectionKind::Entry).is_none());
    }
}
