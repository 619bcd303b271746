use super::{after_leading_hooks, body_line, Handler, Instrument, Match, Site};
use crate::ast::{ExprKind, FunctionDef};
use crate::model::{InjectionDescriptor, InjectionKind};

/// Dispatch exposing one parameter at function start. A replaced value is
/// rebound to the parameter before the body runs.
pub struct ParameterHandler;

impl Handler for ParameterHandler {
    fn kind(&self) -> InjectionKind {
        InjectionKind::Parameter
    }

    fn find(&self, func: &FunctionDef, descriptor: &InjectionDescriptor) -> Vec<Match> {
        let Some(name) = descriptor.target_name() else {
            return Vec::new();
        };
        let params = &func.params;
        let line = params
            .positional
            .iter()
            .chain(&params.kwonly)
            .find(|p| p.name == name)
            .map(|p| p.line)
            .or_else(|| {
                let starred = params.vararg.as_deref() == Some(name)
                    || params.kwarg.as_deref() == Some(name);
                starred.then_some(func.line)
            });
        line.map(|line| Match::new(Site::Param(name.to_string()), line))
            .into_iter()
            .collect()
    }

    fn instrument(&self, func: &mut FunctionDef, matches: &[Match], cx: &mut Instrument<'_>) {
        let line = body_line(func);
        for m in matches {
            let Site::Param(name) = &m.site else {
                continue;
            };
            let subject = cx.expr(line, ExprKind::Name(name.clone()));
            let hook = cx.hook_stmt(line, Some(subject), Some(name.clone()));
            let at = after_leading_hooks(&func.body);
            func.body.insert(at, hook);
        }
    }
}
