//! Watched-table registry.
//!
//! The registry holds one [`TableEntry`] per watched table file and one
//! [`IndexState`] per index file. Each cycle starts with [`Registry::discover`],
//! which reads every index named by the watch config, followed by
//! [`Registry::reconcile`], which registers new keys with fresh state and
//! drops keys that disappeared. State for keys present in both cycles is
//! carried over untouched.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tp_common::{Dialect, TableKey};
use tp_config::{read_index, IndexError, WatchConfig};
use tracing::{debug, warn};

/// Static description of a watched table, rebuilt from the index every cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub index_name: String,
    pub pid_file: Option<PathBuf>,
    pub dialect: Dialect,
    /// Version line of the index that listed the table.
    pub index_version: String,
}

/// Per-table state carried across cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableState {
    pub errors: u64,
    pub using_backup: bool,
    /// `-1` until the first successful validation.
    pub rows: i64,
    pub cols: i64,
    pub version: String,
    pub status: String,
    /// Live-file mtime recorded by the last scan that saw a change.
    pub last_good: SystemTime,
    pub valid: bool,
}

impl TableState {
    pub fn fresh(version: impl Into<String>) -> Self {
        Self {
            errors: 0,
            using_backup: false,
            rows: -1,
            cols: -1,
            version: version.into(),
            status: String::new(),
            last_good: UNIX_EPOCH,
            valid: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    pub spec: TableSpec,
    pub state: TableState,
}

/// Per-index state carried across cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexState {
    pub name: String,
    pub errors: u64,
    /// Tables listed by the index, or `-1` when it could not be read.
    pub rows: i64,
    pub modified: SystemTime,
    pub valid: bool,
    pub status: String,
}

/// Result of reading one index file.
#[derive(Debug)]
pub enum IndexOutcome {
    Read {
        name: String,
        tables: usize,
        modified: SystemTime,
    },
    Failed {
        name: String,
        error: IndexError,
    },
}

/// Everything read from disk for one cycle, before it touches the registry.
#[derive(Debug, Default)]
pub struct Discovery {
    pub tables: BTreeMap<TableKey, TableSpec>,
    pub indices: BTreeMap<PathBuf, IndexOutcome>,
}

/// What reconciliation changed.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub added: Vec<TableKey>,
    pub removed: Vec<TableKey>,
    pub index_errors: Vec<IndexError>,
}

#[derive(Debug, Default)]
pub struct Registry {
    tables: BTreeMap<TableKey, TableEntry>,
    indices: BTreeMap<PathBuf, IndexState>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every index named by the watch config.
    pub fn discover(config: &WatchConfig) -> Discovery {
        let mut discovery = Discovery::default();
        for block in &config.blocks {
            let outcome = match read_index(&block.index_path) {
                Ok(index) => {
                    for entry in &index.entries {
                        let key = TableKey::for_index_entry(&block.dir, &entry.file);
                        let spec = TableSpec {
                            name: entry.table_name.clone(),
                            index_name: block.index_name.clone(),
                            pid_file: entry.pid_file.clone(),
                            dialect: block.dialect,
                            index_version: index.version.clone(),
                        };
                        if discovery.tables.insert(key.clone(), spec).is_some() {
                            warn!(table = %key, index = %block.index_path.display(), "table listed more than once");
                        }
                    }
                    IndexOutcome::Read {
                        name: block.index_name.clone(),
                        tables: index.entries.len(),
                        modified: index.modified,
                    }
                }
                Err(error) => {
                    warn!(index = %block.index_path.display(), error = %error, "index unavailable");
                    IndexOutcome::Failed {
                        name: block.index_name.clone(),
                        error,
                    }
                }
            };
            discovery.indices.insert(block.index_path.clone(), outcome);
        }
        discovery
    }

    /// Apply a discovery: register new keys, drop vanished ones, update
    /// index states.
    pub fn reconcile(&mut self, discovery: Discovery) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let Discovery { tables, indices } = discovery;

        let removed: Vec<TableKey> = self
            .tables
            .keys()
            .filter(|key| !tables.contains_key(*key))
            .cloned()
            .collect();
        for key in &removed {
            self.tables.remove(key);
            debug!(table = %key, "table deregistered");
        }
        report.removed = removed;

        for (key, spec) in tables {
            if self.tables.contains_key(&key) {
                continue;
            }
            debug!(table = %key, name = %spec.name, "table registered");
            let state = TableState::fresh(spec.index_version.clone());
            self.tables.insert(key.clone(), TableEntry { spec, state });
            report.added.push(key);
        }

        self.indices.retain(|path, _| indices.contains_key(path));
        for (path, outcome) in indices {
            match outcome {
                IndexOutcome::Read {
                    name,
                    tables,
                    modified,
                } => {
                    let state = self.indices.entry(path).or_insert_with(|| IndexState {
                        name: name.clone(),
                        errors: 0,
                        rows: 0,
                        modified,
                        valid: true,
                        status: String::new(),
                    });
                    state.name = name;
                    state.rows = i64::try_from(tables).unwrap_or(i64::MAX);
                    state.modified = modified;
                    state.valid = true;
                    state.status = "ok".to_string();
                }
                IndexOutcome::Failed { name, error } => {
                    let status = index_status(&error);
                    match self.indices.get_mut(&path) {
                        Some(state) => {
                            state.errors += 1;
                            state.rows = -1;
                            state.status = status;
                        }
                        None => {
                            self.indices.insert(
                                path,
                                IndexState {
                                    name,
                                    errors: 0,
                                    rows: -1,
                                    modified: UNIX_EPOCH,
                                    valid: true,
                                    status,
                                },
                            );
                        }
                    }
                    report.index_errors.push(error);
                }
            }
        }
        report
    }

    pub fn tables(&self) -> &BTreeMap<TableKey, TableEntry> {
        &self.tables
    }

    /// Mutable access for the per-cycle fan-out. Entries are disjoint, so
    /// each worker gets exclusive access to one key.
    pub fn tables_mut(&mut self) -> &mut BTreeMap<TableKey, TableEntry> {
        &mut self.tables
    }

    pub fn indices(&self) -> &BTreeMap<PathBuf, IndexState> {
        &self.indices
    }

    pub fn table(&self, path: impl AsRef<Path>) -> Option<&TableEntry> {
        self.tables.get(&TableKey(path.as_ref().to_path_buf()))
    }

    pub fn index(&self, path: impl AsRef<Path>) -> Option<&IndexState> {
        self.indices.get(path.as_ref())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

fn index_status(error: &IndexError) -> String {
    match error {
        IndexError::Io { .. } => "read error".to_string(),
        IndexError::Malformed { .. } => "invalid: malformed index".to_string(),
    }
}
