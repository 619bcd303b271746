//! Declarative registrations read from TOML.
//!
//! A manifest lets tooling register injections without Rust callbacks; each
//! injection runs one built-in [`Action`].
//!
//! ```toml
//! [[groups]]
//! name = "combat"
//! target = "game.player.Player"
//! priority = 10
//!
//! [[groups.inject]]
//! method = "set_health"
//! name = "prevent_negative_health"
//! at = { kind = "ATTRIBUTE_WRITE", target = "self.health" }
//! action = "cancel"
//! value = 0
//! require = 1
//! ```

use crate::model::{ConfigError, InjectionDescriptor, Literal, Policy};
use crate::registry::{Injection, Registry, DEFAULT_PRIORITY};
use crate::runtime::Callback;
use crate::value::Value;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub groups: Vec<GroupSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupSpec {
    pub name: String,
    pub target: String,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub inject: Vec<InjectSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InjectSpec {
    pub method: String,
    #[serde(default)]
    pub name: Option<String>,
    pub at: InjectionDescriptor,
    #[serde(default)]
    pub action: Action,
    #[serde(default = "none_literal")]
    pub value: Literal,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub require: Option<usize>,
    #[serde(default)]
    pub expect: Option<usize>,
    #[serde(default)]
    pub policy: Policy,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

fn none_literal() -> Literal {
    Literal::None
}

/// What a manifest callback does when its point is reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Log the point and continue.
    #[default]
    Trace,
    /// Stop the chain and return `value`.
    Cancel,
    /// Replace the point's value with `value`.
    SetValue,
}

impl Action {
    pub fn callback(self, value: Literal) -> Callback {
        Callback::sync(move |_, info, args, _| {
            match self {
                Action::Trace => tracing::info!(
                    point = %info.point(),
                    target_name = %info.target(),
                    method = %info.method(),
                    args = args.len(),
                    "point reached"
                ),
                Action::Cancel => info.cancel(Value::from(&value)),
                Action::SetValue => info.set_value(Value::from(&value)),
            }
            Ok(())
        })
    }
}

#[derive(Debug)]
pub enum ManifestError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Registration {
        group: String,
        source: ConfigError,
    },
}

impl ManifestError {
    fn with_path(self, path: &Path) -> Self {
        match self {
            ManifestError::Toml { path: None, source } => ManifestError::Toml {
                path: Some(path.to_path_buf()),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestError::Io { path, source } => {
                write!(f, "failed to read manifest from {}: {}", path.display(), source)
            }
            ManifestError::Toml { path, source } => match path {
                Some(path) => write!(f, "failed to parse manifest TOML ({}): {}", path.display(), source),
                None => write!(f, "failed to parse manifest TOML: {}", source),
            },
            ManifestError::Registration { group, source } => {
                write!(f, "group '{group}' could not be registered: {source}")
            }
        }
    }
}

impl std::error::Error for ManifestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ManifestError::Io { source, .. } => Some(source),
            ManifestError::Toml { source, .. } => Some(source),
            ManifestError::Registration { source, .. } => Some(source),
        }
    }
}

impl Manifest {
    pub fn load_from_str(input: &str) -> Result<Self, ManifestError> {
        toml_edit::de::from_str(input).map_err(|source| ManifestError::Toml { path: None, source })
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load_from_str(&contents).map_err(|error| error.with_path(path))
    }

    pub fn injection_count(&self) -> usize {
        self.groups.iter().map(|g| g.inject.len()).sum()
    }

    /// Register every group; returns the number of injections added.
    pub fn apply(&self, registry: &mut Registry) -> Result<usize, ManifestError> {
        for group in &self.groups {
            let mut builder = registry.group(group.name.as_str(), group.target.as_str()).priority(group.priority);
            for spec in &group.inject {
                let mut injection = Injection::new(
                    spec.method.as_str(),
                    spec.at.clone(),
                    spec.action.callback(spec.value.clone()),
                )
                .priority(spec.priority)
                .policy(spec.policy);
                if let Some(name) = &spec.name {
                    injection = injection.named(name.as_str());
                }
                if let Some(count) = spec.require {
                    injection = injection.require(count);
                }
                if let Some(count) = spec.expect {
                    injection = injection.expect(count);
                }
                builder = builder.add(injection);
            }
            builder.register().map_err(|source| ManifestError::Registration {
                group: group.name.clone(),
                source,
            })?;
        }
        Ok(self.injection_count())
    }
}
