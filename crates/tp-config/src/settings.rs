//! Daemon settings.
//!
//! Settings are a small TOML document. Every field has a default, so an
//! empty file (or no file at all) is a valid configuration.
//!
//! ```toml
//! watch_config = "/etc/tableprov/tableprov.conf"
//! backup_dir = "/var/lib/tableprov/backup"
//! max_metric_bytes = 900000
//! interval_secs = 60
//! host_ip = "10.0.0.7"
//! threads = 0
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default chunk budget in bytes.
pub const DEFAULT_MAX_METRIC_BYTES: usize = 900_000;

/// Default delay between the end of one cycle and the start of the next.
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Default location of the watch config.
pub const DEFAULT_WATCH_CONFIG: &str = "/etc/tableprov/tableprov.conf";

/// Default backup directory holding `.valid` / `.invalid` siblings.
pub const DEFAULT_BACKUP_DIR: &str = "/var/lib/tableprov/backup";

/// Resolved daemon settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Watch config listing the `[watch]` blocks.
    pub watch_config: PathBuf,

    /// Directory for temp and backup copies of every watched table.
    pub backup_dir: PathBuf,

    /// Upper bound on the size of one emitted chunk.
    pub max_metric_bytes: usize,

    /// Pause between poll cycles.
    pub interval_secs: u64,

    /// Host IP reported in summary rows (overridden by `MYPRVIP`).
    pub host_ip: Option<String>,

    /// Worker threads for the per-table fan-out (0 = one per core).
    pub threads: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            watch_config: PathBuf::from(DEFAULT_WATCH_CONFIG),
            backup_dir: PathBuf::from(DEFAULT_BACKUP_DIR),
            max_metric_bytes: DEFAULT_MAX_METRIC_BYTES,
            interval_secs: DEFAULT_INTERVAL_SECS,
            host_ip: None,
            threads: 0,
        }
    }
}

impl Settings {
    /// Parse settings from TOML text. `origin` is only used in messages.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load and validate settings from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Semantic checks that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_metric_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_metric_bytes",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.backup_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "backup_dir",
                reason: "must not be empty".to_string(),
            });
        }
        if self.watch_config.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "watch_config",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.max_metric_bytes, 900_000);
        assert_eq!(settings.interval(), Duration::from_secs(60));
        assert!(settings.host_ip.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_empty_document_is_default() {
        let settings = Settings::from_toml_str("", Path::new("mem")).expect("parse");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_partial_document_keeps_other_defaults() {
        let text = "max_metric_bytes = 1024\nbackup_dir = \"/tmp/bk\"\n";
        let settings = Settings::from_toml_str(text, Path::new("mem")).expect("parse");
        assert_eq!(settings.max_metric_bytes, 1024);
        assert_eq!(settings.backup_dir, PathBuf::from("/tmp/bk"));
        assert_eq!(settings.interval_secs, DEFAULT_INTERVAL_SECS);
    }

    #[test]
    fn test_zero_budget_rejected() {
        let err = Settings::from_toml_str("max_metric_bytes = 0", Path::new("mem")).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "max_metric_bytes",
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = Settings::from_toml_str("colour = \"blue\"", Path::new("mem")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_from_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("settings.toml");
        fs::write(&path, "interval_secs = 5\nthreads = 2\n").expect("write");
        let settings = Settings::from_file(&path).expect("load");
        assert_eq!(settings.interval_secs, 5);
        assert_eq!(settings.threads, 2);
    }

    #[test]
    fn test_from_missing_file() {
        let dir = tempdir().expect("tempdir");
        let err = Settings::from_file(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
