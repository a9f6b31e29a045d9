//! Source selection for the live / temp / backup file trio.
//!
//! Each poll decides which physical file represents a table and whether it
//! changed since the last good scan. The decision depends only on which
//! files exist, their modification times, and the last-good timestamp kept
//! in the table state, so it is computed by a pure function over
//! [`TrioTimes`]. Filesystem access goes through [`FileProbe`].
//!
//! ```text
//! live  temp  backup   decision
//! ----  ----  ------   -------------------------------------------------
//!  -     *     -       no source
//!  -     *     yes     backup, unchanged
//! yes   yes    *       live newer than temp -> live, changed
//!                      otherwise            -> backup, unchanged (or no source)
//! yes    -     -       live, changed (first scan)
//! yes    -     yes     live mtime == last good -> backup, unchanged
//!                      otherwise               -> live, changed
//! ```

use crate::naming::FileTrio;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

/// Reads file modification times.
pub trait FileProbe: Send + Sync {
    /// Modification time, or `None` when the file does not exist or cannot
    /// be inspected.
    fn modified(&self, path: &Path) -> Option<SystemTime>;
}

/// [`FileProbe`] backed by `std::fs::metadata`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl FileProbe for FsProbe {
    fn modified(&self, path: &Path) -> Option<SystemTime> {
        fs::metadata(path).and_then(|m| m.modified()).ok()
    }
}

/// Modification times of the three files; `None` means absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrioTimes {
    pub live: Option<SystemTime>,
    pub temp: Option<SystemTime>,
    pub backup: Option<SystemTime>,
}

impl TrioTimes {
    pub fn probe(probe: &dyn FileProbe, trio: &FileTrio) -> Self {
        Self {
            live: probe.modified(&trio.live),
            temp: probe.modified(&trio.temp),
            backup: probe.modified(&trio.backup),
        }
    }
}

/// Which file a scan reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Neither the live file nor a backup exists.
    NoSource,
    /// The live file, read directly (working copy unavailable).
    Live,
    /// The working copy just taken from the live file.
    Temp,
    /// The last validated copy.
    Backup,
}

/// Which row of the decision table applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    NothingOnDisk,
    BackupOnly,
    FreshAfterCrash,
    StaleTemp,
    FirstScan,
    Unmodified,
    Modified,
}

/// Outcome of [`decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// `Live`, `Backup`, or `NoSource`. A scan that manages to copy the live
    /// file switches `Live` to `Temp` before reading.
    pub source: Source,
    pub changed: bool,
    pub rule: Rule,
}

impl Decision {
    fn no_source(rule: Rule) -> Self {
        Self {
            source: Source::NoSource,
            changed: false,
            rule,
        }
    }

    fn backup(rule: Rule) -> Self {
        Self {
            source: Source::Backup,
            changed: false,
            rule,
        }
    }

    fn fresh(rule: Rule) -> Self {
        Self {
            source: Source::Live,
            changed: true,
            rule,
        }
    }

    pub fn uses_backup(&self) -> bool {
        self.source == Source::Backup
    }

    pub fn has_source(&self) -> bool {
        self.source != Source::NoSource
    }
}

/// Decide the source for one table.
///
/// `last_good` is the live modification time recorded by the last scan
/// that treated the table as changed.
pub fn decide(times: &TrioTimes, last_good: SystemTime) -> Decision {
    let Some(live) = times.live else {
        return match times.backup {
            Some(_) => Decision::backup(Rule::BackupOnly),
            None => Decision::no_source(Rule::NothingOnDisk),
        };
    };

    if let Some(temp) = times.temp {
        // A working copy survived: the previous scan never promoted it.
        if live > temp {
            return Decision::fresh(Rule::FreshAfterCrash);
        }
        return match times.backup {
            Some(_) => Decision::backup(Rule::StaleTemp),
            None => Decision::no_source(Rule::StaleTemp),
        };
    }

    match times.backup {
        None => Decision::fresh(Rule::FirstScan),
        Some(_) if live == last_good => Decision::backup(Rule::Unmodified),
        Some(_) => Decision::fresh(Rule::Modified),
    }
}
