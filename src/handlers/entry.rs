use super::{after_leading_hooks, body_line, Handler, Instrument, Match, Site};
use crate::ast::FunctionDef;
use crate::model::{InjectionDescriptor, InjectionKind};

/// Dispatch before the first statement; a cancel returns its result.
pub struct EntryHandler;

impl Handler for EntryHandler {
    fn kind(&self) -> InjectionKind {
        InjectionKind::Entry
    }

    fn find(&self, func: &FunctionDef, _descriptor: &InjectionDescriptor) -> Vec<Match> {
        vec![Match::new(Site::Body, body_line(func))]
    }

    fn instrument(&self, func: &mut FunctionDef, matches: &[Match], cx: &mut Instrument<'_>) {
        if matches.is_empty() {
            return;
        }
        let hook = cx.hook_stmt(body_line(func), None, None);
        let at = after_leading_hooks(&func.body);
        func.body.insert(at, hook);
    }
}
