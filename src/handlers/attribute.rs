use super::{rewrite_stmts, Handler, Instrument, Match, Site};
use crate::ast::walk::flatten;
use crate::ast::{Expr, ExprKind, FunctionDef, Stmt, StmtKind};
use crate::model::{InjectionDescriptor, InjectionKind};

/// Assignments whose left-hand side is the target attribute path.
///
/// The right-hand side goes through a value hook. Augmented assignment is
/// desugared to `target = target <op> value` first.
pub struct AttributeWriteHandler;

fn writes(stmt: &Stmt, path: &str) -> bool {
    let is_path = |e: &Expr| e.dotted_name().as_deref() == Some(path);
    match &stmt.kind {
        StmtKind::Assign { targets, .. } => targets.iter().any(is_path),
        StmtKind::AnnAssign {
            target,
            value: Some(_),
            ..
        } => is_path(target),
        StmtKind::AugAssign { target, .. } => is_path(target),
        _ => false,
    }
}

impl Handler for AttributeWriteHandler {
    fn kind(&self) -> InjectionKind {
        InjectionKind::AttributeWrite
    }

    fn find(&self, func: &FunctionDef, descriptor: &InjectionDescriptor) -> Vec<Match> {
        let Some(path) = descriptor.target_name() else {
            return Vec::new();
        };
        flatten(&func.body)
            .into_iter()
            .filter(|s| writes(s, path))
            .map(|s| Match::new(Site::Stmt(s.id), s.line))
            .collect()
    }

    fn instrument(&self, func: &mut FunctionDef, matches: &[Match], cx: &mut Instrument<'_>) {
        rewrite_stmts(func, matches, &mut |stmt| {
            let line = stmt.line;
            match &mut stmt.kind {
                StmtKind::Assign { value, .. } => cx.wrap_in_place(value),
                StmtKind::AnnAssign {
                    value: Some(value), ..
                } => cx.wrap_in_place(value),
                StmtKind::AugAssign { target, op, value } => {
                    let current = cx.renumber(target);
                    let operand = std::mem::replace(value, Expr::detached());
                    let combined = cx.expr(
                        line,
                        ExprKind::BinOp {
                            left: Box::new(current),
                            op: *op,
                            right: Box::new(operand),
                        },
                    );
                    let target = std::mem::replace(target, Expr::detached());
                    stmt.kind = StmtKind::Assign {
                        targets: vec![target],
                        value: cx.hook(combined),
                    };
                }
                _ => {}
            }
        });
    }

    fn candidates(&self, func: &FunctionDef) -> Vec<String> {
        let mut paths = Vec::new();
        for stmt in flatten(&func.body) {
            let written: Vec<&Expr> = match &stmt.kind {
                StmtKind::Assign { targets, .. } => targets.iter().collect(),
                StmtKind::AnnAssign { target, .. } | StmtKind::AugAssign { target, .. } => vec![target],
                _ => Vec::new(),
            };
            paths.extend(
                written
                    .into_iter()
                    .filter(|e| matches!(e.kind, ExprKind::Attribute { .. }))
                    .filter_map(Expr::dotted_name),
            );
        }
        paths.sort();
        paths.dedup();
        paths
    }
}
