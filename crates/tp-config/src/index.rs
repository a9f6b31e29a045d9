//! Index file parsing.
//!
//! An index file lists the tables of one watch block:
//!
//! ```text
//! v2024.03.1
//! hosts
//! routes,routes_v2.csv
//! sessions,sessions.csv,/run/sessiond.pid
//! ```
//!
//! The first line is a free-form version string. Each further line is
//! `table[,file[,pidfile]]`; blank lines are skipped. A line with more than
//! three fields invalidates the whole file.

use crate::error::IndexError;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// One table descriptor line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub table_name: String,
    /// File name as written in the index (`<table>.csv` when omitted).
    pub file: String,
    pub pid_file: Option<PathBuf>,
}

/// A successfully read index file.
#[derive(Debug, Clone)]
pub struct IndexFile {
    pub path: PathBuf,
    pub version: String,
    pub entries: Vec<IndexEntry>,
    pub modified: SystemTime,
}

/// Parse index text. Returns the version line and the entries.
pub fn parse_index(path: &Path, text: &str) -> Result<(String, Vec<IndexEntry>), IndexError> {
    let mut lines = text.lines();
    let version = lines.next().unwrap_or_default().to_string();
    let mut entries = Vec::new();

    for (idx, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() > 3 {
            return Err(IndexError::Malformed {
                path: path.to_path_buf(),
                line: idx + 2,
                fields: fields.len(),
            });
        }
        let table_name = fields[0].to_string();
        let file = match fields.get(1) {
            Some(f) if !f.is_empty() => f.to_string(),
            _ => format!("{table_name}.csv"),
        };
        let pid_file = fields
            .get(2)
            .filter(|p| !p.is_empty())
            .map(|p| PathBuf::from(*p));
        entries.push(IndexEntry {
            table_name,
            file,
            pid_file,
        });
    }
    Ok((version, entries))
}

/// Read an index file from disk.
pub fn read_index(path: &Path) -> Result<IndexFile, IndexError> {
    let io_err = |source| IndexError::Io {
        path: path.to_path_buf(),
        source,
    };
    let text = fs::read_to_string(path).map_err(io_err)?;
    let modified = fs::metadata(path).and_then(|m| m.modified()).map_err(io_err)?;
    let (version, entries) = parse_index(path, &text)?;
    Ok(IndexFile {
        path: path.to_path_buf(),
        version,
        entries,
        modified,
    })
}
