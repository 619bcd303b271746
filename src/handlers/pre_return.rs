use super::{rewrite_stmts, Handler, Instrument, Match, Site};
use crate::ast::walk::flatten;
use crate::ast::{ExprKind, FunctionDef, Stmt, StmtKind};
use crate::model::{InjectionDescriptor, InjectionKind, Literal};

/// Line of the return appended for the fall-through point. Parsed
/// statements start at line 1.
const FALL_THROUGH_LINE: usize = 0;

/// Every `return` of the function's own scope, plus falling off the end.
///
/// A cancel returns the decision's result; a replaced value is returned
/// instead of the original without stopping later callbacks.
pub struct PreReturnHandler;

impl Handler for PreReturnHandler {
    fn kind(&self) -> InjectionKind {
        InjectionKind::PreReturn
    }

    fn find(&self, func: &FunctionDef, _descriptor: &InjectionDescriptor) -> Vec<Match> {
        let mut out: Vec<Match> = flatten(&func.body)
            .into_iter()
            .filter(|s| matches!(s.kind, StmtKind::Return(_)) && s.line != FALL_THROUGH_LINE)
            .map(|s| Match::new(Site::Stmt(s.id), s.line))
            .collect();
        out.push(Match::new(Site::End, func.end_line));
        out
    }

    fn instrument(&self, func: &mut FunctionDef, matches: &[Match], cx: &mut Instrument<'_>) {
        rewrite_stmts(func, matches, &mut |stmt| hook_return(stmt, cx));

        if !matches.iter().any(|m| m.site == Site::End) {
            return;
        }
        match func.body.last_mut() {
            Some(last) if last.line == FALL_THROUGH_LINE && matches!(last.kind, StmtKind::Return(_)) => {
                hook_return(last, cx)
            }
            _ => {
                let none = cx.expr(func.end_line, ExprKind::Constant(Literal::None));
                let value = cx.hook(none);
                let ret = cx.stmt(FALL_THROUGH_LINE, StmtKind::Return(Some(value)));
                func.body.push(ret);
            }
        }
    }
}

fn hook_return(stmt: &mut Stmt, cx: &mut Instrument<'_>) {
    let StmtKind::Return(value) = &mut stmt.kind else {
        return;
    };
    match value {
        Some(expr) => cx.wrap_in_place(expr),
        None => {
            let none = cx.expr(stmt.line, ExprKind::Constant(Literal::None));
            *value = Some(cx.hook(none));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{function, module, weave_one};
    use super::*;

    const SOURCE: &str = "def f(x):\n    if x:\n        return 1\n    for i in x:\n        return\n    y = 2\n";

    #[test]
    fn finds_nested_returns_and_the_end() {
        let m = module(SOURCE);
        let found = PreReturnHandler.find(&function(&m, "f"), &InjectionDescriptor::new(InjectionKind::PreReturn));
        let lines: Vec<usize> = found.iter().map(|m| m.line).collect();
        assert_eq!(lines, vec![3, 5, 6]);
        assert_eq!(found[2].site, Site::End);
    }

    #[test]
    fn second_group_reuses_the_fall_through_return() {
        let mut m = module(SOURCE);
        let d = InjectionDescriptor::new(InjectionKind::PreReturn);
        weave_one(&mut m, "f", d.clone());
        let again = weave_one(&mut m, "f", d);
        assert_eq!(again.len(), 3);
        let body = function(&m, "f").body;
        assert_eq!(body.len(), 4);
        let StmtKind::Return(Some(outer)) = &body[3].kind else {
            panic!("expected fall-through return");
        };
        let ExprKind::Hook(outer) = &outer.kind else {
            panic!("expected hook");
        };
        assert!(matches!(outer.value.kind, ExprKind::Hook(_)));
    }
}
