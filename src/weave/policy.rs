use crate::model::Policy;

/// Which count a mismatch violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountKind {
    Require,
    Expect,
}

impl CountKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CountKind::Require => "require",
            CountKind::Expect => "expect",
        }
    }
}

/// How a mismatch is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Fatal,
    Warn,
    Silent,
}

/// `require` is fatal under STRICT and ERROR; `expect` only under STRICT.
pub fn verdict(kind: CountKind, policy: Policy) -> Verdict {
    match (kind, policy) {
        (_, Policy::Strict) => Verdict::Fatal,
        (CountKind::Require, Policy::Error) => Verdict::Fatal,
        (CountKind::Expect, Policy::Error) => Verdict::Warn,
        (_, Policy::Warn) => Verdict::Warn,
        (_, Policy::Ignore) => Verdict::Silent,
    }
}
