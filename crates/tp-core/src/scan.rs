//! Per-table scan.
//!
//! One scan runs per table per cycle: liveness gate, source decision,
//! working copy, read, validation of changed content, promotion of the
//! working copy to backup, and chunk emission. Every failure is confined to
//! the table: it updates the table state, is forwarded to the accumulator,
//! and never propagates out of [`Scanner::scan`].

use crate::accumulator::{Accumulator, Fields, Tags};
use crate::chunk::ChunkedContent;
use crate::filestate::{decide, FileProbe, Rule, Source, TrioTimes};
use crate::liveness::{self, ProcessOracle};
use crate::naming::{BackupLayout, FileTrio};
use crate::registry::TableEntry;
use crate::validate::{validate, ValidationError};
use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tp_common::{TableKey, PAYLOAD_FIELD};
use tracing::{debug, info, warn};

/// Table-scoped I/O failures.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("no source available for {file}")]
    NoSource { file: PathBuf },

    #[error("cannot copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("cannot promote {from} to {to}: {source}")]
    Promote {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<ScanError> for tp_common::Error {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::NoSource { file } => tp_common::Error::NoSource(file.display().to_string()),
            ScanError::Read { .. } => tp_common::Error::Read(err.to_string()),
            ScanError::Copy { .. } | ScanError::Promote { .. } => {
                tp_common::Error::Copy(err.to_string())
            }
        }
    }
}

/// How a scan ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Liveness gate closed; state untouched apart from the status.
    Skipped,
    NoSource,
    /// Unchanged and known invalid: nothing read, nothing sent.
    CachedInvalid,
    ReadFailed,
    /// Changed content failed validation.
    Invalid { kind: &'static str },
    Emitted { chunks: usize, validated: bool },
}

impl ScanOutcome {
    /// Counted against the cycle's failures.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            ScanOutcome::NoSource | ScanOutcome::ReadFailed | ScanOutcome::Invalid { .. }
        )
    }
}

/// Everything a scan needs besides the table itself.
pub struct Scanner {
    layout: BackupLayout,
    probe: Box<dyn FileProbe>,
    oracle: Box<dyn ProcessOracle>,
    max_bytes: usize,
}

impl Scanner {
    pub fn new(
        layout: BackupLayout,
        probe: Box<dyn FileProbe>,
        oracle: Box<dyn ProcessOracle>,
        max_bytes: usize,
    ) -> Self {
        Self {
            layout,
            probe,
            oracle,
            max_bytes,
        }
    }

    pub fn with_probe(mut self, probe: Box<dyn FileProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_oracle(mut self, oracle: Box<dyn ProcessOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn layout(&self) -> &BackupLayout {
        &self.layout
    }

    pub fn scan(&self, key: &TableKey, entry: &mut TableEntry, acc: &dyn Accumulator) -> ScanOutcome {
        let spec = &entry.spec;
        let state = &mut entry.state;

        if let Err(err) = liveness::check(spec.pid_file.as_deref(), self.oracle.as_ref()) {
            debug!(table = %key, reason = err.reason(), error = %err, "liveness gate closed");
            state.status = format!("skipped: {}", err.reason());
            return ScanOutcome::Skipped;
        }

        let trio = self.layout.trio(key.path());
        let times = TrioTimes::probe(self.probe.as_ref(), &trio);
        let decision = decide(&times, state.last_good);
        state.using_backup = decision.uses_backup();
        debug!(table = %key, rule = ?decision.rule, changed = decision.changed, "source decided");

        if !decision.has_source() {
            warn!(table = %key, "no live file and no backup");
            state.errors += 1;
            state.valid = false;
            state.status = "no source".to_string();
            acc.add_error(
                ScanError::NoSource {
                    file: key.path().to_path_buf(),
                }
                .into(),
            );
            return ScanOutcome::NoSource;
        }

        if !decision.changed && !state.valid {
            debug!(table = %key, "unchanged and invalid, skipping");
            return ScanOutcome::CachedInvalid;
        }

        let mut source = decision.source;
        if decision.changed {
            if let Some(live) = times.live {
                state.last_good = live;
            }
            match copy_to_temp(&trio) {
                Ok(()) => source = Source::Temp,
                Err(err) => {
                    warn!(table = %key, error = %err, "working copy failed, reading live file");
                    acc.add_error(err.into());
                }
            }
        }

        let path = source_path(&trio, source);
        let raw = match read_text(path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(table = %key, error = %err, "read failed");
                state.errors += 1;
                state.valid = false;
                state.status = "read error".to_string();
                acc.add_error(err.into());
                return ScanOutcome::ReadFailed;
            }
        };
        let content = ChunkedContent::build(&raw, self.max_bytes);

        if decision.changed {
            match validate(content.content(), spec.dialect, key.path()) {
                Ok(report) => {
                    info!(
                        table = %key,
                        rows = report.rows,
                        columns = report.columns,
                        "table validated"
                    );
                    state.valid = true;
                    state.rows = to_i64(report.rows);
                    state.cols = to_i64(report.columns);
                    state.version = report.version;
                    state.status = "ok".to_string();
                    if source == Source::Temp {
                        if let Err(err) = promote(&trio) {
                            warn!(table = %key, error = %err, "backup promotion failed");
                            acc.add_error(err.into());
                        }
                    }
                }
                Err(err) => {
                    return self.reject(key, state, err, acc);
                }
            }
        } else {
            state.status = match decision.rule {
                Rule::Unmodified => "unchanged",
                _ => "using backup",
            }
            .to_string();
        }

        let chunks = emit(&spec.name, &content, acc);
        ScanOutcome::Emitted {
            chunks,
            validated: decision.changed,
        }
    }

    fn reject(
        &self,
        key: &TableKey,
        state: &mut crate::registry::TableState,
        err: ValidationError,
        acc: &dyn Accumulator,
    ) -> ScanOutcome {
        let kind = err.kind();
        warn!(table = %key, error = %err, "table invalid");
        state.errors += 1;
        state.valid = false;
        state.status = format!("invalid: {kind}");
        acc.add_error(err.into());
        ScanOutcome::Invalid { kind }
    }
}

fn source_path(trio: &FileTrio, source: Source) -> &Path {
    match source {
        Source::Temp => &trio.temp,
        Source::Backup => &trio.backup,
        Source::Live | Source::NoSource => &trio.live,
    }
}

fn copy_to_temp(trio: &FileTrio) -> Result<(), ScanError> {
    fs::copy(&trio.live, &trio.temp)
        .map(|_| ())
        .map_err(|source| ScanError::Copy {
            from: trio.live.clone(),
            to: trio.temp.clone(),
            source,
        })
}

fn promote(trio: &FileTrio) -> Result<(), ScanError> {
    fs::rename(&trio.temp, &trio.backup).map_err(|source| ScanError::Promote {
        from: trio.temp.clone(),
        to: trio.backup.clone(),
        source,
    })
}

fn read_text(path: &Path) -> Result<String, ScanError> {
    let read_err = |message: String| ScanError::Read {
        path: path.to_path_buf(),
        message,
    };
    let bytes = fs::read(path).map_err(|e| read_err(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| read_err(format!("not UTF-8: {e}")))
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Send every chunk as one record. Returns the number of chunks.
fn emit(name: &str, content: &ChunkedContent, acc: &dyn Accumulator) -> usize {
    let timestamp = Utc::now();
    let mut count = 0;
    for chunk in content.chunks() {
        let mut fields = Fields::new();
        fields.insert(PAYLOAD_FIELD.to_string(), chunk.text.to_string());
        let mut tags = Tags::new();
        tags.insert("chunkNumber".to_string(), chunk.number.to_string());
        tags.insert("isLast".to_string(), chunk.is_last.to_string());
        acc.add_fields(name, fields, tags, timestamp);
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::MemoryAccumulator;
    use crate::filestate::FsProbe;
    use crate::liveness::StaticOracle;
    use crate::registry::{TableSpec, TableState};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;
    use tp_common::Dialect;

    const GOOD: &str = "v1\n\nhost,count,addr\nstr,int,ip\ndesc\na,1,10.0.0.1\nb,2,10.0.0.2\n";
    const RAGGED: &str = "v1\n\nhost,count,addr\nstr,int,ip\ndesc\na,1\n";

    struct Sandbox {
        _dir: TempDir,
        watch: PathBuf,
        scanner: Scanner,
    }

    fn sandbox(oracle: StaticOracle) -> Sandbox {
        let dir = tempfile::tempdir().expect("tempdir");
        let watch = dir.path().join("watch");
        let backup = dir.path().join("backup");
        fs::create_dir_all(&watch).expect("watch dir");
        let layout = BackupLayout::new(&backup);
        layout.ensure_dir().expect("backup dir");
        let scanner = Scanner::new(layout, Box::new(FsProbe), Box::new(oracle), 1024);
        Sandbox {
            _dir: dir,
            watch,
            scanner,
        }
    }

    fn entry(pid_file: Option<PathBuf>) -> TableEntry {
        TableEntry {
            spec: TableSpec {
                name: "hosts".to_string(),
                index_name: "edge".to_string(),
                pid_file,
                dialect: Dialect::V1,
                index_version: "v1".to_string(),
            },
            state: TableState::fresh("v1"),
        }
    }

    fn set_mtime(path: &Path, secs: u64) {
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(secs);
        filetime::set_file_mtime(path, filetime::FileTime::from_system_time(t)).expect("mtime");
    }

    #[test]
    fn test_first_scan_validates_and_promotes() {
        let sb = sandbox(StaticOracle::new());
        let live = sb.watch.join("hosts.csv");
        fs::write(&live, GOOD).expect("write");
        let key = TableKey(live.clone());
        let mut table = entry(None);
        let acc = MemoryAccumulator::new();

        let outcome = sb.scanner.scan(&key, &mut table, &acc);
        assert_eq!(
            outcome,
            ScanOutcome::Emitted {
                chunks: 1,
                validated: true
            }
        );
        assert!(table.state.valid);
        assert_eq!(table.state.rows, 2);
        assert_eq!(table.state.cols, 3);
        assert_eq!(table.state.status, "ok");

        let trio = sb.scanner.layout().trio(&live);
        assert!(trio.backup.exists());
        assert!(!trio.temp.exists());

        let records = acc.records_named("hosts");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tags["chunkNumber"], "0");
        assert_eq!(records[0].tags["isLast"], "true");
        assert!(records[0].fields[PAYLOAD_FIELD].starts_with("v1\n,\n"));
    }

    #[test]
    fn test_second_scan_uses_backup_without_revalidating() {
        let sb = sandbox(StaticOracle::new());
        let live = sb.watch.join("hosts.csv");
        fs::write(&live, GOOD).expect("write");
        let key = TableKey(live.clone());
        let mut table = entry(None);
        let acc = MemoryAccumulator::new();

        sb.scanner.scan(&key, &mut table, &acc);
        let before = table.state.clone();
        let outcome = sb.scanner.scan(&key, &mut table, &acc);

        assert_eq!(
            outcome,
            ScanOutcome::Emitted {
                chunks: 1,
                validated: false
            }
        );
        assert_eq!(table.state.errors, before.errors);
        assert_eq!(table.state.rows, before.rows);
        assert!(table.state.using_backup);
        assert_eq!(table.state.status, "unchanged");
    }

    #[test]
    fn test_invalid_rewrite_is_cached() {
        let sb = sandbox(StaticOracle::new());
        let live = sb.watch.join("hosts.csv");
        fs::write(&live, GOOD).expect("write");
        let key = TableKey(live.clone());
        let mut table = entry(None);
        let acc = MemoryAccumulator::new();
        sb.scanner.scan(&key, &mut table, &acc);

        fs::write(&live, RAGGED).expect("rewrite");
        set_mtime(&live, 1_000);
        let outcome = sb.scanner.scan(&key, &mut table, &acc);
        assert!(matches!(outcome, ScanOutcome::Invalid { .. }));
        assert_eq!(table.state.errors, 1);
        assert!(!table.state.valid);
        assert!(table.state.status.starts_with("invalid: "));

        let trio = sb.scanner.layout().trio(&live);
        assert!(trio.temp.exists());
        assert_eq!(fs::read_to_string(&trio.backup).expect("backup"), GOOD);

        // working copy is newer than live: unchanged, and known invalid
        acc.clear();
        let outcome = sb.scanner.scan(&key, &mut table, &acc);
        assert_eq!(outcome, ScanOutcome::CachedInvalid);
        assert_eq!(table.state.errors, 1);
        assert!(acc.records().is_empty());
        assert!(acc.errors().is_empty());
    }

    #[test]
    fn test_no_source_counts_error() {
        let sb = sandbox(StaticOracle::new());
        let key = TableKey(sb.watch.join("hosts.csv"));
        let mut table = entry(None);
        let acc = MemoryAccumulator::new();

        assert_eq!(sb.scanner.scan(&key, &mut table, &acc), ScanOutcome::NoSource);
        assert_eq!(table.state.errors, 1);
        assert!(!table.state.valid);
        assert_eq!(acc.errors().len(), 1);
        assert_eq!(acc.errors()[0].code, 20);
    }

    #[test]
    fn test_liveness_skip_leaves_counters() {
        let sb = sandbox(StaticOracle::new());
        let live = sb.watch.join("hosts.csv");
        fs::write(&live, GOOD).expect("write");
        let pid_file = sb.watch.join("producer.pid");
        fs::write(&pid_file, "4242\n").expect("pid");
        let key = TableKey(live);
        let mut table = entry(Some(pid_file));
        let acc = MemoryAccumulator::new();

        assert_eq!(sb.scanner.scan(&key, &mut table, &acc), ScanOutcome::Skipped);
        assert_eq!(table.state.errors, 0);
        assert!(table.state.valid);
        assert_eq!(table.state.status, "skipped: process not running");
        assert!(acc.records().is_empty());
        assert!(acc.errors().is_empty());
    }

    #[test]
    fn test_live_process_allows_scan() {
        let sb = sandbox(StaticOracle::new().with_process(4242, "producer"));
        let live = sb.watch.join("hosts.csv");
        fs::write(&live, GOOD).expect("write");
        let pid_file = sb.watch.join("producer.pid");
        fs::write(&pid_file, "4242,producer\n").expect("pid");
        let key = TableKey(live);
        let mut table = entry(Some(pid_file));
        let acc = MemoryAccumulator::new();

        assert!(matches!(
            sb.scanner.scan(&key, &mut table, &acc),
            ScanOutcome::Emitted { .. }
        ));
    }

    #[test]
    fn test_non_utf8_is_read_error() {
        let sb = sandbox(StaticOracle::new());
        let live = sb.watch.join("hosts.csv");
        fs::write(&live, [0xff, 0xfe, b'\n']).expect("write");
        let key = TableKey(live);
        let mut table = entry(None);
        let acc = MemoryAccumulator::new();

        assert_eq!(sb.scanner.scan(&key, &mut table, &acc), ScanOutcome::ReadFailed);
        assert_eq!(table.state.status, "read error");
        assert_eq!(table.state.errors, 1);
    }
}
