//! Table identity and dialect types.
//!
//! A watched table is identified by the path of its live CSV file. Every
//! piece of per-table state (spec, mutable state, physical sibling files) is
//! keyed by that path.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// File path key identifying one watched table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableKey(pub PathBuf);

impl TableKey {
    /// Build the key for a table listed in an index file.
    ///
    /// The live file always lives in the watch directory and always carries
    /// a `.csv` extension, whatever directory or extension the index line
    /// gave: `dir/basename(file).csv`.
    pub fn for_index_entry(dir: &str, file: &str) -> Self {
        let dir = dir.trim_end_matches('/');
        TableKey(PathBuf::from(format!(
            "{}/{}.csv",
            dir,
            crate::path::basename(file)
        )))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<PathBuf> for TableKey {
    fn from(path: PathBuf) -> Self {
        TableKey(path)
    }
}

impl From<&str> for TableKey {
    fn from(path: &str) -> Self {
        TableKey(PathBuf::from(path))
    }
}

/// CSV metadata dialect a table is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// Plain type tokens (`str`, `int`, `ip`, ...).
    #[default]
    V1,
    /// Decorated type tokens (`region)ip?`, `x)int!`).
    V2,
}

impl Dialect {
    /// Map the `csvfilefmt` value of a watch block to a dialect.
    ///
    /// Only `tableprov2` selects dialect 2; anything else is dialect 1.
    pub fn from_format_name(name: &str) -> Self {
        if name.trim() == "tableprov2" {
            Dialect::V2
        } else {
            Dialect::V1
        }
    }

    /// Numeric version (1 or 2).
    pub fn version(self) -> u8 {
        match self {
            Dialect::V1 => 1,
            Dialect::V2 => 2,
        }
    }
}

impl TryFrom<u8> for Dialect {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Dialect::V1),
            2 => Ok(Dialect::V2),
            other => Err(format!("unknown dialect version {other}")),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::V1 => write!(f, "tableprov"),
            Dialect::V2 => write!(f, "tableprov2"),
        }
    }
}
