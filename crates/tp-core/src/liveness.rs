//! Liveness gate.
//!
//! A table may name a PID file written by its producer. The first line of
//! that file is `pid` or `pid,executable`. The table is scanned only while
//! the process exists and, when an executable name is given, only while the
//! process carries that name. Any problem reading or parsing the PID file
//! means the table is skipped for this cycle.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Reasons a table is skipped by the gate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LivenessError {
    #[error("cannot read pid file {path}: {message}")]
    Unreadable { path: PathBuf, message: String },

    #[error("malformed pid file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("process {pid} is not running")]
    NotRunning { pid: u32 },

    #[error("process {pid} is {actual}, expected {expected}")]
    ExecutableMismatch {
        pid: u32,
        expected: String,
        actual: String,
    },
}

impl LivenessError {
    /// Short label for status columns.
    pub fn reason(&self) -> &'static str {
        match self {
            LivenessError::Unreadable { .. } => "pid file unreadable",
            LivenessError::Parse { .. } => "pid file malformed",
            LivenessError::NotRunning { .. } => "process not running",
            LivenessError::ExecutableMismatch { .. } => "executable mismatch",
        }
    }
}

impl From<LivenessError> for tp_common::Error {
    fn from(err: LivenessError) -> Self {
        tp_common::Error::Liveness(err.to_string())
    }
}

/// Process requirement read from a PID file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidSpec {
    pub pid: u32,
    pub executable: Option<String>,
}

impl PidSpec {
    /// Parse the first line of PID-file content.
    pub fn parse(text: &str) -> Result<Self, String> {
        let line = text.lines().next().unwrap_or("").trim();
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() > 2 {
            return Err(format!("expected pid[,executable], got {} fields", fields.len()));
        }

        let pid: u32 = fields[0]
            .parse()
            .map_err(|_| format!("invalid pid {:?}", fields[0]))?;
        if pid == 0 {
            return Err("pid 0 is not a process".to_string());
        }

        let executable = fields
            .get(1)
            .filter(|name| !name.is_empty())
            .map(|name| name.to_string());
        Ok(Self { pid, executable })
    }

    pub fn read(path: &Path) -> Result<Self, LivenessError> {
        let text = fs::read_to_string(path).map_err(|e| LivenessError::Unreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(&text).map_err(|message| LivenessError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }
}

/// What the process table reports for a pid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    /// Short process name; `None` when the platform cannot report one.
    pub name: Option<String>,
}

/// Process-table lookup used by the gate.
pub trait ProcessOracle: Send + Sync {
    fn lookup(&self, pid: u32) -> Option<ProcessInfo>;

    fn is_alive(&self, spec: &PidSpec) -> bool {
        check_spec(spec, self).is_ok()
    }
}

/// Reads `<root>/<pid>/comm`.
#[derive(Debug, Clone)]
pub struct ProcfsOracle {
    root: PathBuf,
}

impl ProcfsOracle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for ProcfsOracle {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcessOracle for ProcfsOracle {
    fn lookup(&self, pid: u32) -> Option<ProcessInfo> {
        let comm = fs::read_to_string(self.root.join(pid.to_string()).join("comm")).ok()?;
        Some(ProcessInfo {
            pid,
            name: Some(comm.trim().to_string()),
        })
    }
}

/// Signal-0 probe for platforms without procfs. Cannot report names.
#[cfg(unix)]
#[derive(Debug, Clone, Copy, Default)]
pub struct KillOracle;

#[cfg(unix)]
impl ProcessOracle for KillOracle {
    fn lookup(&self, pid: u32) -> Option<ProcessInfo> {
        let pid_t = libc::pid_t::try_from(pid).ok()?;
        // SAFETY: signal 0 performs only the existence and permission check.
        let rc = unsafe { libc::kill(pid_t, 0) };
        let exists = rc == 0
            || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM);
        exists.then_some(ProcessInfo { pid, name: None })
    }
}

/// Fixed process table, for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct StaticOracle {
    processes: HashMap<u32, String>,
}

impl StaticOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_process(mut self, pid: u32, name: impl Into<String>) -> Self {
        self.processes.insert(pid, name.into());
        self
    }
}

impl ProcessOracle for StaticOracle {
    fn lookup(&self, pid: u32) -> Option<ProcessInfo> {
        self.processes.get(&pid).map(|name| ProcessInfo {
            pid,
            name: Some(name.clone()),
        })
    }
}

/// The oracle used by the daemon on this platform.
#[cfg(target_os = "linux")]
pub fn default_oracle() -> Box<dyn ProcessOracle> {
    Box::new(ProcfsOracle::default())
}

/// The oracle used by the daemon on this platform.
#[cfg(all(unix, not(target_os = "linux")))]
pub fn default_oracle() -> Box<dyn ProcessOracle> {
    Box::new(KillOracle)
}

/// The oracle used by the daemon on this platform.
#[cfg(not(unix))]
pub fn default_oracle() -> Box<dyn ProcessOracle> {
    warn!("no process table on this platform; pid files are not checked");
    Box::new(UncheckedOracle)
}

/// Reports every pid as running, without a name.
#[cfg(not(unix))]
#[derive(Debug, Clone, Copy, Default)]
pub struct UncheckedOracle;

#[cfg(not(unix))]
impl ProcessOracle for UncheckedOracle {
    fn lookup(&self, pid: u32) -> Option<ProcessInfo> {
        Some(ProcessInfo { pid, name: None })
    }
}

fn check_spec<O: ProcessOracle + ?Sized>(spec: &PidSpec, oracle: &O) -> Result<(), LivenessError> {
    let info = oracle
        .lookup(spec.pid)
        .ok_or(LivenessError::NotRunning { pid: spec.pid })?;

    let Some(expected) = &spec.executable else {
        return Ok(());
    };
    match info.name {
        Some(actual) if actual == *expected => Ok(()),
        Some(actual) => Err(LivenessError::ExecutableMismatch {
            pid: spec.pid,
            expected: expected.clone(),
            actual,
        }),
        None => {
            warn!(
                pid = spec.pid,
                expected = %expected,
                "process name unavailable; executable not checked"
            );
            Ok(())
        }
    }
}

/// Run the gate for one table. `None` or an empty path always passes.
pub fn check(pid_file: Option<&Path>, oracle: &dyn ProcessOracle) -> Result<(), LivenessError> {
    let Some(path) = pid_file.filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    let spec = PidSpec::read(path)?;
    check_spec(&spec, oracle)
}
