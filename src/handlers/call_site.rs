use super::{rewrite_exprs, Handler, Instrument, Match, Site};
use crate::ast::walk::{flatten, stmt_exprs};
use crate::ast::{CallExpr, Expr, ExprKind, FunctionDef, HookCall};
use crate::model::{CallShape, InjectionDescriptor, InjectionKind};

/// Calls selected by a structural selector, or by dotted callee path.
///
/// The call is replaced by a call hook that evaluates the callee and
/// arguments once and lets callbacks redirect, inspect or skip the call.
/// A call selected by several groups carries one point per group, the first
/// instrumented outermost.
pub struct CallSiteHandler;

fn selects(descriptor: &InjectionDescriptor, call: &CallExpr) -> bool {
    let target = descriptor.target_name();
    let dotted_ok = || match target {
        Some(path) => call.func.dotted_name().as_deref() == Some(path),
        None => true,
    };
    match &descriptor.selector {
        Some(selector) => selector.matches(&CallShape::of(call)) && dotted_ok(),
        None => target.is_some() && dotted_ok(),
    }
}

impl Handler for CallSiteHandler {
    fn kind(&self) -> InjectionKind {
        InjectionKind::CallSite
    }

    fn find(&self, func: &FunctionDef, descriptor: &InjectionDescriptor) -> Vec<Match> {
        flatten(&func.body)
            .into_iter()
            .flat_map(stmt_exprs)
            .filter(|e| matches!(&e.kind, ExprKind::Call(call) if selects(descriptor, call)))
            .map(|e| Match::new(Site::Expr(e.id), e.line))
            .collect()
    }

    fn instrument(&self, func: &mut FunctionDef, matches: &[Match], cx: &mut Instrument<'_>) {
        rewrite_exprs(func, matches, &mut |e: &mut Expr| {
            if let ExprKind::HookCall(hook) = &mut e.kind {
                hook.points.push(cx.point.clone());
                return;
            }
            if !matches!(e.kind, ExprKind::Call(_)) {
                return;
            }
            let ExprKind::Call(call) = std::mem::replace(&mut e.kind, ExprKind::Name(String::new()))
            else {
                return;
            };
            e.kind = ExprKind::HookCall(HookCall {
                points: vec![cx.point.clone()],
                call,
                is_async: cx.is_async,
            });
        });
    }

    fn candidates(&self, func: &FunctionDef) -> Vec<String> {
        let mut paths: Vec<String> = flatten(&func.body)
            .into_iter()
            .flat_map(stmt_exprs)
            .filter_map(|e| match &e.kind {
                ExprKind::Call(call) => call.func.dotted_name(),
                ExprKind::HookCall(hook) => hook.call.func.dotted_name(),
                _ => None,
            })
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }
}
