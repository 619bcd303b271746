use super::{Condition, InjectionDescriptor};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Occurrence {
    #[default]
    All,
    First,
    Last,
}

/// Window between two anchor points; a missing side is unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SliceSpec {
    pub from: Option<Box<InjectionDescriptor>>,
    pub to: Option<Box<InjectionDescriptor>>,
    pub include_from: bool,
    pub include_to: bool,
}

/// Keep matches within `max_distance` statements of the anchor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NearSpec {
    pub anchor: Box<InjectionDescriptor>,
    #[serde(default = "default_near_distance")]
    pub max_distance: usize,
}

pub const DEFAULT_NEAR_DISTANCE: usize = 3;

fn default_near_distance() -> usize {
    DEFAULT_NEAR_DISTANCE
}

/// Pick the Nth match after (offset >= 0) or before (offset < 0) an anchor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnchorSpec {
    pub anchor: Box<InjectionDescriptor>,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub inclusive: bool,
}

/// One source line, or an inclusive range when `end` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineSpec {
    pub start: usize,
    #[serde(default)]
    pub end: Option<usize>,
}

impl LineSpec {
    pub fn contains(&self, line: usize) -> bool {
        match self.end {
            None => line == self.start,
            Some(end) => self.start <= line && line <= end,
        }
    }
}

/// Refinements narrowing the raw matches of a descriptor.
///
/// Stages are applied in a fixed order regardless of how the value was
/// built: slice, near, anchor, line, occurrence, ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    pub ordinal: Option<usize>,
    pub occurrence: Occurrence,
    pub condition: Option<Condition>,
    pub slice: Option<SliceSpec>,
    pub near: Option<NearSpec>,
    pub anchor: Option<AnchorSpec>,
    pub line: Option<LineSpec>,
}

impl Location {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ordinal(mut self, n: usize) -> Self {
        self.ordinal = Some(n);
        self
    }

    pub fn first(mut self) -> Self {
        self.occurrence = Occurrence::First;
        self
    }

    pub fn last(mut self) -> Self {
        self.occurrence = Occurrence::Last;
        self
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn slice(
        mut self,
        from: Option<InjectionDescriptor>,
        to: Option<InjectionDescriptor>,
        include_from: bool,
        include_to: bool,
    ) -> Self {
        self.slice = Some(SliceSpec {
            from: from.map(Box::new),
            to: to.map(Box::new),
            include_from,
            include_to,
        });
        self
    }

    pub fn near(mut self, anchor: InjectionDescriptor, max_distance: usize) -> Self {
        self.near = Some(NearSpec {
            anchor: Box::new(anchor),
            max_distance,
        });
        self
    }

    pub fn anchored(mut self, anchor: InjectionDescriptor, offset: i64, inclusive: bool) -> Self {
        self.anchor = Some(AnchorSpec {
            anchor: Box::new(anchor),
            offset,
            inclusive,
        });
        self
    }

    pub fn line(mut self, line: usize) -> Self {
        self.line = Some(LineSpec {
            start: line,
            end: None,
        });
        self
    }

    pub fn lines(mut self, start: usize, end: usize) -> Self {
        self.line = Some(LineSpec {
            start,
            end: Some(end),
        });
        self
    }

    /// Whether any positional stage is set (condition alone does not count).
    pub fn narrows(&self) -> bool {
        self.ordinal.is_some()
            || self.occurrence != Occurrence::All
            || self.slice.is_some()
            || self.near.is_some()
            || self.anchor.is_some()
            || self.line.is_some()
    }

    /// Anchors this refinement refers to, in pipeline order.
    pub fn anchors(&self) -> Vec<&InjectionDescriptor> {
        let mut out = Vec::new();
        if let Some(slice) = &self.slice {
            out.extend(slice.from.as_deref());
            out.extend(slice.to.as_deref());
        }
        if let Some(near) = &self.near {
            out.push(&*near.anchor);
        }
        if let Some(anchor) = &self.anchor {
            out.push(&*anchor.anchor);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_spec_contains() {
        let exact = LineSpec {
            start: 4,
            end: None,
        };
        assert!(exact.contains(4));
        assert!(!exact.contains(5));
        let range = LineSpec {
            start: 4,
            end: Some(6),
        };
        assert!(range.contains(6));
        assert!(!range.contains(7));
    }

    #[test]
    fn near_distance_defaults_in_json() {
        let loc: Location =
            serde_json::from_str(r#"{"near": {"anchor": {"kind": "ENTRY"}}}"#).unwrap();
        assert_eq!(loc.near.unwrap().max_distance, DEFAULT_NEAR_DISTANCE);
    }

    #[test]
    fn condition_alone_does_not_narrow() {
        let loc = Location::new().when(Condition::lt("value", 0));
        assert!(!loc.narrows());
        assert!(Location::new().first().narrows());
    }
}
