use super::policy::CountKind;
use crate::model::{InjectionDescriptor, Policy};
use crate::ts::TreeSitterError;
use std::fmt;
use thiserror::Error;

/// A registration whose descriptor matched a different number of sites than
/// it asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub kind: CountKind,
    pub target: String,
    pub method: String,
    pub group: String,
    pub callback: String,
    pub matched: usize,
    pub expected: usize,
    pub policy: Policy,
    pub descriptor: InjectionDescriptor,
    pub suggestion: Option<Hint>,
}

/// A near miss worth naming in a mismatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hint {
    /// The method does not exist; this one does.
    Method(String),
    /// The target path matched nothing; this path exists in the method.
    Path { wanted: String, found: String },
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hint::Method(name) => write!(f, "did you mean '{name}'?"),
            Hint::Path { wanted, found } => write!(f, "no '{wanted}' here; did you mean '{found}'?"),
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.kind.as_str();
        writeln!(
            f,
            "[mixweave] {kind} mismatch for '{}.{}' (group={})",
            self.target, self.method, self.group
        )?;
        writeln!(f, "  injector : {}", self.callback)?;
        writeln!(f, "  matched  : {}  (expected {kind}={})", self.matched, self.expected)?;
        writeln!(f, "  at       : {}", self.descriptor)?;
        match &self.suggestion {
            Some(Hint::Method(name)) => {
                writeln!(f, "  hint     : no method '{}'; did you mean '{name}'?", self.method)?
            }
            Some(hint) => writeln!(f, "  hint     : {hint}")?,
            None => {}
        }
        write!(
            f,
            "  Tip: Check that the method signature and injection type match the target source."
        )
    }
}

#[derive(Error, Debug)]
pub enum WeaveError {
    #[error("failed to parse module '{module}': {source}")]
    Parse {
        module: String,
        #[source]
        source: TreeSitterError,
    },

    #[error("{0}")]
    MatchCount(Box<Mismatch>),
}
