use super::{rewrite_exprs, Handler, Instrument, Match, Site};
use crate::ast::walk::{flatten, stmt_exprs};
use crate::ast::{ExprKind, FunctionDef};
use crate::model::{InjectionDescriptor, InjectionKind};

/// Literal nodes equal to the target value, replaced in place by a value
/// hook.
pub struct ConstantHandler;

impl Handler for ConstantHandler {
    fn kind(&self) -> InjectionKind {
        InjectionKind::Constant
    }

    fn find(&self, func: &FunctionDef, descriptor: &InjectionDescriptor) -> Vec<Match> {
        let Some(target) = &descriptor.target else {
            return Vec::new();
        };
        flatten(&func.body)
            .into_iter()
            .flat_map(stmt_exprs)
            .filter(|e| matches!(&e.kind, ExprKind::Constant(lit) if lit == target))
            .map(|e| Match::new(Site::Expr(e.id), e.line))
            .collect()
    }

    fn instrument(&self, func: &mut FunctionDef, matches: &[Match], cx: &mut Instrument<'_>) {
        rewrite_exprs(func, matches, &mut |e| cx.wrap_in_place(e));
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{function, module, weave_one};
    use super::*;
    use crate::ast::StmtKind;

    #[test]
    fn matches_equal_literals_in_order() {
        let mut m = module("def f():\n    a = 10\n    b = [10, 20]\n    return a + 10.5\n");
        let d = InjectionDescriptor::new(InjectionKind::Constant).with_target(10);
        let found = weave_one(&mut m, "f", d);
        let lines: Vec<usize> = found.iter().map(|m| m.line).collect();
        assert_eq!(lines, vec![2, 3]);

        let body = function(&m, "f").body;
        let StmtKind::Assign { value, .. } = &body[0].kind else {
            panic!("expected assignment");
        };
        assert_eq!(found[0].site, Site::Expr(value.id));
        assert!(matches!(value.kind, ExprKind::Hook(_)));
    }
}
