use super::{rewrite_exprs, Handler, Instrument, Match, Site};
use crate::ast::walk::{flatten, stmt_exprs};
use crate::ast::{ExprKind, FunctionDef};
use crate::model::{InjectionDescriptor, InjectionKind, Literal};

/// Every `yield` value passes through a value hook before it is produced.
pub struct ProducedValueHandler;

impl Handler for ProducedValueHandler {
    fn kind(&self) -> InjectionKind {
        InjectionKind::ProducedValue
    }

    fn find(&self, func: &FunctionDef, _descriptor: &InjectionDescriptor) -> Vec<Match> {
        flatten(&func.body)
            .into_iter()
            .flat_map(stmt_exprs)
            .filter(|e| matches!(e.kind, ExprKind::Yield(_)))
            .map(|e| Match::new(Site::Expr(e.id), e.line))
            .collect()
    }

    fn instrument(&self, func: &mut FunctionDef, matches: &[Match], cx: &mut Instrument<'_>) {
        rewrite_exprs(func, matches, &mut |e| {
            let line = e.line;
            let ExprKind::Yield(value) = &mut e.kind else {
                return;
            };
            match value {
                Some(inner) => cx.wrap_in_place(inner),
                None => {
                    let none = cx.expr(line, ExprKind::Constant(Literal::None));
                    *value = Some(Box::new(cx.hook(none)));
                }
            }
        });
    }
}
