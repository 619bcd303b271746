//! Loader configuration: debug dumps, dispatch tracing and the dump directory.
//!
//! Settings come from an optional TOML file and the environment; environment
//! variables win.
//!
//! ```toml
//! debug = true
//! trace = false
//! dump_dir = ".weaved"
//! ```

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_DEBUG: &str = "MIXWEAVE_DEBUG";
pub const ENV_TRACE: &str = "MIXWEAVE_TRACE";
pub const ENV_DUMP_DIR: &str = "MIXWEAVE_DUMP_DIR";
pub const DEFAULT_DUMP_DIR: &str = ".weaved";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeaveConfig {
    /// Write woven source of every loaded module to `dump_dir`.
    pub debug: bool,
    /// Emit a `trace` event for every callback dispatch.
    pub trace: bool,
    pub dump_dir: PathBuf,
}

impl Default for WeaveConfig {
    fn default() -> Self {
        Self {
            debug: false,
            trace: false,
            dump_dir: PathBuf::from(DEFAULT_DUMP_DIR),
        }
    }
}

#[derive(Debug)]
pub enum SettingsError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
}

impl SettingsError {
    fn with_path(self, path: &Path) -> Self {
        match self {
            SettingsError::Toml { path: None, source } => SettingsError::Toml {
                path: Some(path.to_path_buf()),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io { path, source } => {
                write!(f, "failed to read settings from {}: {}", path.display(), source)
            }
            SettingsError::Toml { path, source } => match path {
                Some(path) => write!(f, "failed to parse settings TOML ({}): {}", path.display(), source),
                None => write!(f, "failed to parse settings TOML: {}", source),
            },
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SettingsError::Io { source, .. } => Some(source),
            SettingsError::Toml { source, .. } => Some(source),
        }
    }
}

impl WeaveConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    pub fn load_from_str(input: &str) -> Result<Self, SettingsError> {
        toml_edit::de::from_str(input).map_err(|source| SettingsError::Toml { path: None, source })
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load_from_str(&contents).map_err(|error| error.with_path(path))
    }

    /// Settings file (when given) overridden by the process environment.
    pub fn resolve(path: Option<&Path>) -> Result<Self, SettingsError> {
        let base = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::default(),
        };
        Ok(base.with_overrides(|key| std::env::var(key).ok()))
    }

    /// Apply `MIXWEAVE_*` overrides from `lookup`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(flag) = lookup(ENV_DEBUG).and_then(|v| parse_flag(&v)) {
            self.debug = flag;
        }
        if let Some(flag) = lookup(ENV_TRACE).and_then(|v| parse_flag(&v)) {
            self.trace = flag;
        }
        if let Some(dir) = lookup(ENV_DUMP_DIR).filter(|v| !v.trim().is_empty()) {
            self.dump_dir = PathBuf::from(dir);
        }
        self
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        other => {
            tracing::warn!(value = other, "ignoring unrecognised boolean setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parses_toml() {
        let cfg = WeaveConfig::load_from_str("debug = true\ndump_dir = \"out\"\n").unwrap();
        assert!(cfg.debug);
        assert!(!cfg.trace);
        assert_eq!(cfg.dump_dir, PathBuf::from("out"));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = WeaveConfig::load_from_str("verbose = true\n").unwrap_err();
        assert!(err.to_string().contains("failed to parse settings TOML"));
    }

    #[test]
    fn environment_overrides_file() {
        let env: HashMap<&str, &str> =
            HashMap::from([(ENV_DEBUG, "False"), (ENV_TRACE, "1"), (ENV_DUMP_DIR, "dumps")]);
        let cfg = WeaveConfig::load_from_str("debug = true\n")
            .unwrap()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert!(!cfg.debug);
        assert!(cfg.trace);
        assert_eq!(cfg.dump_dir, PathBuf::from("dumps"));
    }

    #[test]
    fn garbage_flag_keeps_value() {
        let cfg = WeaveConfig {
            debug: true,
            ..WeaveConfig::default()
        }
        .with_overrides(|k| (k == ENV_DEBUG).then(|| "maybe".to_string()));
        assert!(cfg.debug);
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = WeaveConfig::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }
}
