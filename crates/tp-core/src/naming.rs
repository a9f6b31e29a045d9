//! Temp and backup sibling paths for watched table files.
//!
//! Every table owns two files in the backup directory, both named after the
//! live file's basename:
//!
//! ```text
//! /var/tp/edge/hosts.csv          live, owned by the producer
//! <backup_dir>/hosts.invalid      working copy taken before validation
//! <backup_dir>/hosts.valid        last copy that passed validation
//! ```
//!
//! Two live files with the same basename in different directories map to
//! the same siblings. Index authors must keep basenames unique.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tp_common::basename;

/// Suffix of the last validated copy.
pub const BACKUP_EXT: &str = ".valid";

/// Suffix of the working copy.
pub const TEMP_EXT: &str = ".invalid";

/// The three physical files backing one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTrio {
    pub live: PathBuf,
    pub temp: PathBuf,
    pub backup: PathBuf,
}

/// Maps live table files into the backup directory.
#[derive(Debug, Clone)]
pub struct BackupLayout {
    dir: PathBuf,
}

impl BackupLayout {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the backup directory if it does not exist yet.
    pub fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    pub fn temp_path(&self, live: &Path) -> PathBuf {
        self.sibling(live, TEMP_EXT)
    }

    pub fn backup_path(&self, live: &Path) -> PathBuf {
        self.sibling(live, BACKUP_EXT)
    }

    pub fn trio(&self, live: &Path) -> FileTrio {
        FileTrio {
            live: live.to_path_buf(),
            temp: self.temp_path(live),
            backup: self.backup_path(live),
        }
    }

    fn sibling(&self, live: &Path, ext: &str) -> PathBuf {
        let live = live.to_string_lossy();
        self.dir.join(format!("{}{}", basename(&live), ext))
    }
}
