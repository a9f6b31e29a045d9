//! Watch config grammar.
//!
//! The watch config is line oriented. Each `[watch]` header opens a block and
//! the `key = value` lines after it fill the block in:
//!
//! ```text
//! [watch]
//! indexname = edge_tables
//! index = /etc/tables/index.txt
//! dir = /var/tables/
//! csvfilefmt = tableprov2
//! ```
//!
//! Blank lines and `#` comments are ignored, as is anything before the first
//! header. Blocks missing `index` or `dir` are dropped and reported.

use crate::error::ConfigError;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tp_common::Dialect;

const BLOCK_HEADER: &str = "[watch]";

/// One `[watch]` block: an index file and the directory its tables live in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchBlock {
    pub index_name: String,
    pub index_path: PathBuf,
    /// Watch directory, without a trailing slash.
    pub dir: String,
    pub dialect: Dialect,
}

/// Parsed watch config.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WatchConfig {
    pub blocks: Vec<WatchBlock>,
    /// Problems found while parsing; the offending blocks are not in `blocks`.
    pub problems: Vec<String>,
}

#[derive(Default)]
struct PartialBlock {
    line: usize,
    index_name: Option<String>,
    index_path: Option<String>,
    dir: Option<String>,
    dialect: Dialect,
}

impl PartialBlock {
    fn finish(self, config: &mut WatchConfig) {
        let Some(index_path) = self.index_path.filter(|s| !s.is_empty()) else {
            config
                .problems
                .push(format!("[watch] block at line {}: missing index", self.line));
            return;
        };
        let Some(dir) = self.dir.filter(|s| !s.is_empty()) else {
            config
                .problems
                .push(format!("[watch] block at line {}: missing dir", self.line));
            return;
        };
        let index_name = self
            .index_name
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| tp_common::basename(&index_path).to_string());
        let dir = match dir.trim_end_matches('/') {
            "" => "/".to_string(),
            trimmed => trimmed.to_string(),
        };
        config.blocks.push(WatchBlock {
            index_name,
            index_path: PathBuf::from(index_path),
            dir,
            dialect: self.dialect,
        });
    }
}

/// Parse watch config text.
pub fn parse_watch_config(text: &str) -> WatchConfig {
    let mut config = WatchConfig::default();
    let mut current: Option<PartialBlock> = None;

    for (idx, raw) in text.lines().enumerate() {
        let lineno = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line == BLOCK_HEADER {
            if let Some(block) = current.take() {
                block.finish(&mut config);
            }
            current = Some(PartialBlock {
                line: lineno,
                ..PartialBlock::default()
            });
            continue;
        }
        let Some(block) = current.as_mut() else {
            continue;
        };
        let Some((key, value)) = line.split_once('=') else {
            config
                .problems
                .push(format!("line {lineno}: expected `key = value`"));
            continue;
        };
        let value = value.trim().to_string();
        match key.trim() {
            "indexname" => block.index_name = Some(value),
            "index" => block.index_path = Some(value),
            "dir" => block.dir = Some(value),
            "csvfilefmt" => block.dialect = Dialect::from_format_name(&value),
            other => config
                .problems
                .push(format!("line {lineno}: unknown key `{other}`")),
        }
    }
    if let Some(block) = current.take() {
        block.finish(&mut config);
    }
    config
}

/// Read and parse the watch config file.
pub fn load_watch_config(path: &Path) -> Result<WatchConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_watch_config(&text))
}
