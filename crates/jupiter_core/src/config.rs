//! Core configuration loaded from a kebab-case TOML file.
//!
//! # Invariants
//! - Every key is optional; missing keys take the documented defaults.
//! - Loading never panics; unreadable or malformed files surface as
//!   `ConfigError`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DEFAULT_WORKING_MEM_GC_DAYS: u32 = 14;
pub const DEFAULT_GEN_MODIFIED_LOOKBACK_HOURS: u32 = 24;
pub const DEFAULT_BIRTHDAY_PREPARATION_DAYS: u32 = 14;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct CoreConfig {
    /// Database file; the CLI requires it from here or `--db`.
    pub db_path: Option<PathBuf>,
    /// `trace|debug|info|warn|error`; build default when absent.
    pub log_level: Option<String>,
    /// Absolute log directory; file logging stays off when absent.
    pub log_dir: Option<PathBuf>,
    /// Working-mem entries this many days old are garbage collected.
    pub working_mem_gc_days: u32,
    /// Templates modified within this window get their instances resynced.
    pub gen_modified_lookback_hours: u32,
    /// Days before a birthday its reminder task becomes actionable.
    pub birthday_preparation_days: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: None,
            log_dir: None,
            working_mem_gc_days: DEFAULT_WORKING_MEM_GC_DAYS,
            gen_modified_lookback_hours: DEFAULT_GEN_MODIFIED_LOOKBACK_HOURS,
            birthday_preparation_days: DEFAULT_BIRTHDAY_PREPARATION_DAYS,
        }
    }
}

impl CoreConfig {
    /// Reads and parses a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: Some(path.to_path_buf()),
                source,
            },
            other => other,
        })
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse { path: None, source })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: Option<PathBuf>,
        source: toml::de::Error,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse {
                path: Some(path),
                source,
            } => write!(f, "invalid config `{}`: {source}", path.display()),
            Self::Parse { path: None, source } => write!(f, "invalid config: {source}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig};
    use std::io::Write;

    #[test]
    fn empty_file_takes_defaults() {
        let config = CoreConfig::parse("").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.working_mem_gc_days, 14);
        assert_eq!(config.gen_modified_lookback_hours, 24);
    }

    #[test]
    fn kebab_case_keys_override_defaults() {
        let config = CoreConfig::parse(
            "db-path = \"/tmp/jupiter.db\"\nworking-mem-gc-days = 7\nlog-level = \"warn\"\n",
        )
        .unwrap();
        assert_eq!(config.working_mem_gc_days, 7);
        assert_eq!(config.log_level.as_deref(), Some("warn"));
        assert_eq!(config.birthday_preparation_days, 14);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = CoreConfig::parse("working_mem_gc_days = 7\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { path: None, .. }));
    }

    #[test]
    fn load_reports_the_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jupiter.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "working-mem-gc-days = \"soon\"").unwrap();

        let err = CoreConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("jupiter.toml"));

        let missing = CoreConfig::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));
    }
}
