//! tableprov configuration loading and validation.
//!
//! This crate provides:
//! - Daemon settings (`settings.toml`) with defaults and validation
//! - Settings resolution (CLI → env → user config dir → defaults)
//! - The `[watch]` block grammar of the watch config
//! - Index file parsing
//! - Host IP resolution for summary records

pub mod error;
pub mod host;
pub mod index;
pub mod resolve;
pub mod settings;
pub mod watch;

pub use error::{ConfigError, IndexError};
pub use host::resolve_host_ip;
pub use index::{read_index, IndexEntry, IndexFile};
pub use resolve::{resolve_settings, ResolvedSettings, SettingsSource};
pub use settings::Settings;
pub use watch::{load_watch_config, parse_watch_config, WatchBlock, WatchConfig};
