use super::errors::{Hint, Mismatch, WeaveError};
use super::policy::{verdict, CountKind, Verdict};
use super::{PointReport, WeaveReport};
use crate::ast::{FunctionDef, IdGen};
use crate::handlers::{HandlerTable, Instrument, Match};
use crate::model::{InjectionDescriptor, PointKey};
use crate::registry::Registration;
use crate::resolver::Resolver;
use indexmap::IndexMap;

/// Registrations of one function, grouped by descriptor in dispatch order.
fn group_by_descriptor<'r>(registrations: &[&'r Registration]) -> IndexMap<&'r InjectionDescriptor, Vec<&'r Registration>> {
    let mut groups: IndexMap<&InjectionDescriptor, Vec<&Registration>> = IndexMap::new();
    for reg in registrations {
        groups.entry(&reg.descriptor).or_default().push(reg);
    }
    groups
}

/// Closest path the descriptor's kind does match in `func`.
fn path_suggestion(func: &FunctionDef, descriptor: &InjectionDescriptor, handlers: &HandlerTable) -> Option<Hint> {
    let wanted = descriptor.target_name()?;
    let candidates = handlers.candidates(func, descriptor.kind);
    let found = super::suggest(wanted, candidates.iter().map(String::as_str).filter(|c| *c != wanted))?;
    Some(Hint::Path {
        wanted: wanted.to_string(),
        found,
    })
}

/// Check one registration's counts; fatal mismatches are returned, warnings
/// are logged and recorded.
pub(super) fn check_counts(
    reg: &Registration,
    matched: usize,
    suggestion: Option<&Hint>,
    report: &mut WeaveReport,
) -> Result<(), WeaveError> {
    let wanted = [
        (CountKind::Require, reg.require),
        (CountKind::Expect, reg.expect),
    ];
    for (kind, expected) in wanted {
        let Some(expected) = expected else {
            continue;
        };
        if expected == matched {
            continue;
        }
        let mismatch = Mismatch {
            kind,
            target: reg.target.clone(),
            method: reg.method.clone(),
            group: reg.group.clone(),
            callback: reg.callback_name.clone(),
            matched,
            expected,
            policy: reg.policy,
            descriptor: reg.descriptor.clone(),
            suggestion: suggestion.cloned(),
        };
        match verdict(kind, reg.policy) {
            Verdict::Fatal => return Err(WeaveError::MatchCount(Box::new(mismatch))),
            Verdict::Warn => {
                let text = mismatch.to_string();
                tracing::warn!("{text}");
                report.warnings.push(text);
            }
            Verdict::Silent => {}
        }
    }
    Ok(())
}

/// Weave every registration of one function.
///
/// All descriptors are resolved against the function as written and every
/// count is checked before the first rewrite.
pub(super) fn weave_function(
    func: &mut FunctionDef,
    target: &str,
    registrations: &[&Registration],
    handlers: &HandlerTable,
    ids: &mut IdGen,
    report: &mut WeaveReport,
) -> Result<(), WeaveError> {
    let groups = group_by_descriptor(registrations);

    let mut plans: Vec<(&InjectionDescriptor, Vec<Match>, usize)> = Vec::with_capacity(groups.len());
    {
        let resolver = Resolver::new(func, handlers);
        for (descriptor, regs) in &groups {
            let matches = resolver.matches(descriptor);
            let suggestion = if matches.is_empty() {
                path_suggestion(func, descriptor, handlers)
            } else {
                None
            };
            for reg in regs {
                check_counts(reg, matches.len(), suggestion.as_ref(), report)?;
            }
            plans.push((*descriptor, matches, regs.len()));
        }
    }

    for (descriptor, matches, callbacks) in plans {
        report.points.push(PointReport {
            target: target.to_string(),
            method: func.name.clone(),
            descriptor: descriptor.clone(),
            lines: matches.iter().map(|m| m.line).collect(),
            callbacks,
        });
        if matches.is_empty() {
            continue;
        }
        let Some(handler) = handlers.get(descriptor.kind) else {
            continue;
        };
        let point = PointKey::new(target, &func.name, descriptor.clone());
        let mut cx = Instrument {
            point: &point,
            ids: &mut *ids,
            is_async: func.is_async,
        };
        handler.instrument(func, &matches, &mut cx);
        tracing::debug!(
            target_name = target,
            method = %func.name,
            descriptor = %descriptor,
            matched = matches.len(),
            "instrumented"
        );
    }
    Ok(())
}
