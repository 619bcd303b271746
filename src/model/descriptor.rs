use super::{CallSelector, ConfigError, Literal, Location};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of structural injection point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InjectionKind {
    Entry,
    PreReturn,
    Parameter,
    Constant,
    CallSite,
    AttributeWrite,
    Exception,
    ProducedValue,
}

impl InjectionKind {
    pub const ALL: [InjectionKind; 8] = [
        InjectionKind::Entry,
        InjectionKind::PreReturn,
        InjectionKind::Parameter,
        InjectionKind::Constant,
        InjectionKind::CallSite,
        InjectionKind::AttributeWrite,
        InjectionKind::Exception,
        InjectionKind::ProducedValue,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InjectionKind::Entry => "ENTRY",
            InjectionKind::PreReturn => "PRE_RETURN",
            InjectionKind::Parameter => "PARAMETER",
            InjectionKind::Constant => "CONSTANT",
            InjectionKind::CallSite => "CALL_SITE",
            InjectionKind::AttributeWrite => "ATTRIBUTE_WRITE",
            InjectionKind::Exception => "EXCEPTION",
            InjectionKind::ProducedValue => "PRODUCED_VALUE",
        }
    }

    /// Whether descriptors of this kind need a `target`.
    pub fn needs_target(self) -> bool {
        matches!(
            self,
            InjectionKind::Parameter
                | InjectionKind::Constant
                | InjectionKind::CallSite
                | InjectionKind::AttributeWrite
        )
    }
}

impl fmt::Display for InjectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InjectionKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InjectionKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownKind(s.to_string()))
    }
}

/// Where to inject: kind, disambiguating target, optional call selector and
/// refinements. Two descriptors group together iff every field is equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InjectionDescriptor {
    pub kind: InjectionKind,
    /// Parameter name, dotted call/attribute path, or literal value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Literal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<CallSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl InjectionDescriptor {
    pub fn new(kind: InjectionKind) -> Self {
        Self {
            kind,
            target: None,
            selector: None,
            location: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<Literal>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_selector(mut self, selector: CallSelector) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Target as a name or dotted path, when it is a string.
    pub fn target_name(&self) -> Option<&str> {
        self.target.as_ref().and_then(Literal::as_str)
    }

    /// Display name of the point: the target, else the kind.
    pub fn point_name(&self) -> String {
        match (&self.target, &self.selector) {
            (Some(Literal::Str(s)), _) => s.clone(),
            (Some(lit), _) => lit.to_string(),
            (None, Some(sel)) => sel
                .callee_dotted()
                .unwrap_or_else(|| self.kind.as_str().to_string()),
            (None, None) => self.kind.as_str().to_string(),
        }
    }

    /// The descriptor without its refinements, used when it serves as anchor.
    pub fn without_location(&self) -> Self {
        Self {
            location: None,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kind.needs_target() && self.target.is_none() {
            let call_by_selector = self.kind == InjectionKind::CallSite && self.selector.is_some();
            if !call_by_selector {
                return Err(ConfigError::MalformedDescriptor(format!(
                    "{} requires a target",
                    self.kind
                )));
            }
        }
        if self.kind != InjectionKind::Constant {
            if let Some(target) = &self.target {
                let name = target.as_str().ok_or_else(|| {
                    ConfigError::MalformedDescriptor(format!(
                        "{} target must be a name, got {target}",
                        self.kind
                    ))
                })?;
                if name.is_empty() || name.split('.').any(str::is_empty) {
                    return Err(ConfigError::MalformedDescriptor(format!(
                        "{} target '{name}' is not a valid dotted path",
                        self.kind
                    )));
                }
            }
        }
        if self.selector.is_some() && self.kind != InjectionKind::CallSite {
            return Err(ConfigError::MalformedDescriptor(format!(
                "{} does not take a call selector",
                self.kind
            )));
        }
        if let Some(location) = &self.location {
            for anchor in location.anchors() {
                anchor.validate()?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for InjectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if self.target.is_some() || self.selector.is_some() {
            write!(f, "({})", self.point_name())?;
        }
        if let Some(loc) = &self.location {
            let mut parts = Vec::new();
            if let Some(n) = loc.ordinal {
                parts.push(format!("ordinal={n}"));
            }
            if loc.occurrence != super::Occurrence::All {
                let occurrence = format!("{:?}", loc.occurrence).to_uppercase();
                parts.push(format!("occurrence={occurrence}"));
            }
            if let Some(line) = loc.line {
                match line.end {
                    Some(end) => parts.push(format!("line={}..={end}", line.start)),
                    None => parts.push(format!("line={}", line.start)),
                }
            }
            if let Some(near) = &loc.near {
                parts.push(format!("near={}~{}", near.anchor, near.max_distance));
            }
            if let Some(anchor) = &loc.anchor {
                parts.push(format!("anchor={}{:+}", anchor.anchor, anchor.offset));
            }
            if loc.slice.is_some() {
                parts.push("slice".to_string());
            }
            if let Some(cond) = &loc.condition {
                parts.push(format!("when {cond}"));
            }
            if !parts.is_empty() {
                write!(f, "[{}]", parts.join(", "))?;
            }
        }
        Ok(())
    }
}

/// Runtime lookup key of one woven point.
///
/// The full descriptor is part of the key, so two descriptors of the same
/// kind and target that differ only in refinements never share a chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PointKey {
    pub target: String,
    pub method: String,
    pub descriptor: InjectionDescriptor,
}

impl PointKey {
    pub fn new(
        target: impl Into<String>,
        method: impl Into<String>,
        descriptor: InjectionDescriptor,
    ) -> Self {
        Self {
            target: target.into(),
            method: method.into(),
            descriptor,
        }
    }

    pub fn kind(&self) -> InjectionKind {
        self.descriptor.kind
    }

    pub fn point_name(&self) -> String {
        self.descriptor.point_name()
    }
}

impl fmt::Display for PointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}@{}", self.target, self.method, self.descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Occurrence;

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("call_site".parse::<InjectionKind>().unwrap(), InjectionKind::CallSite);
        assert!("HEAD".parse::<InjectionKind>().is_err());
    }

    #[test]
    fn grouping_key_includes_location() {
        let a = InjectionDescriptor::new(InjectionKind::Constant).with_target(5);
        let b = a.clone().with_location(Location::new().ordinal(0));
        assert_ne!(a, b);
        assert_eq!(a, InjectionDescriptor::new(InjectionKind::Constant).with_target(5));
    }

    #[test]
    fn validate_rejects_missing_target() {
        let err = InjectionDescriptor::new(InjectionKind::Parameter)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("requires a target"));
        assert!(InjectionDescriptor::new(InjectionKind::Entry).validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_path() {
        let d = InjectionDescriptor::new(InjectionKind::AttributeWrite).with_target("self..x");
        assert!(d.validate().is_err());
        let d = InjectionDescriptor::new(InjectionKind::CallSite).with_target(3);
        assert!(d.validate().is_err());
    }

    #[test]
    fn display_lists_refinements() {
        let d = InjectionDescriptor::new(InjectionKind::CallSite)
            .with_target("self.fetch")
            .with_location(Location {
                ordinal: Some(1),
                occurrence: Occurrence::All,
                ..Location::default()
            });
        assert_eq!(d.to_string(), "CALL_SITE(self.fetch)[ordinal=1]");
    }
}
