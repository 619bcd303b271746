use super::{body_line, Handler, Instrument, Match, Site};
use crate::ast::{ExceptHandler, ExprKind, FunctionDef, StmtKind};
use crate::model::{InjectionDescriptor, InjectionKind};

/// Name the caught exception is bound to inside the catch-all.
pub const EXCEPTION_VAR: &str = "__weave_exc";

/// Wrap the whole body in a catch-all. The handler dispatches with the
/// exception under `exception`; a cancel returns its result, otherwise the
/// exception is re-raised unchanged.
pub struct ExceptionHandler;

impl Handler for ExceptionHandler {
    fn kind(&self) -> InjectionKind {
        InjectionKind::Exception
    }

    fn find(&self, func: &FunctionDef, _descriptor: &InjectionDescriptor) -> Vec<Match> {
        vec![Match::new(Site::Body, body_line(func))]
    }

    fn instrument(&self, func: &mut FunctionDef, matches: &[Match], cx: &mut Instrument<'_>) {
        if matches.is_empty() || func.body.is_empty() {
            return;
        }
        let line = body_line(func);
        let caught = cx.expr(line, ExprKind::Name(EXCEPTION_VAR.to_string()));
        let dispatch = cx.hook_stmt(line, Some(caught), None);
        let reraise = cx.stmt(
            line,
            StmtKind::Raise {
                exc: None,
                cause: None,
            },
        );
        let body = std::mem::take(&mut func.body);
        let wrapped = cx.stmt(
            line,
            StmtKind::Try {
                body,
                handlers: vec![ExceptHandler {
                    line,
                    class: None,
                    name: Some(EXCEPTION_VAR.to_string()),
                    body: vec![dispatch, reraise],
                }],
                orelse: Vec::new(),
                finalbody: Vec::new(),
            },
        );
        func.body.push(wrapped);
    }
}
