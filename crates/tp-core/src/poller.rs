//! Poll orchestrator.
//!
//! A cycle re-reads the watch config and every index, reconciles the
//! registry, scans all tables in parallel on a rayon pool, waits for every
//! scan, then emits the summary. Cycles never overlap: [`Poller::run`] starts
//! the next one only after the previous summary went out.

use crate::accumulator::Accumulator;
use crate::filestate::{FileProbe, FsProbe};
use crate::liveness::{default_oracle, ProcessOracle};
use crate::naming::BackupLayout;
use crate::registry::Registry;
use crate::scan::{ScanOutcome, Scanner};
use crate::summary::emit_summary;
use rayon::prelude::*;
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tp_config::{load_watch_config, Settings};
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum PollError {
    #[error("cannot create backup directory {path}: {source}")]
    BackupDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to build rayon thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl From<PollError> for tp_common::Error {
    fn from(err: PollError) -> Self {
        match err {
            PollError::BackupDir { ref source, .. } => {
                tp_common::Error::Io(io::Error::new(source.kind(), err.to_string()))
            }
            PollError::ThreadPool(_) => tp_common::Error::Config(err.to_string()),
        }
    }
}

/// Counts for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// The watch config could not be read; the table set was left as is.
    pub config_error: bool,
    pub config_problems: usize,
    pub index_errors: usize,
    pub added: usize,
    pub removed: usize,
    pub tables: usize,
    pub emitted: usize,
    pub validated: usize,
    pub cached_invalid: usize,
    pub skipped: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
}

impl CycleReport {
    fn count(&mut self, outcome: &ScanOutcome) {
        if outcome.is_error() {
            self.failed += 1;
            return;
        }
        match outcome {
            ScanOutcome::Skipped => self.skipped += 1,
            ScanOutcome::CachedInvalid => self.cached_invalid += 1,
            ScanOutcome::Emitted { validated, .. } => {
                self.emitted += 1;
                if *validated {
                    self.validated += 1;
                }
            }
            ScanOutcome::NoSource | ScanOutcome::ReadFailed | ScanOutcome::Invalid { .. } => {}
        }
    }
}

pub struct Poller {
    watch_config: PathBuf,
    host_ip: String,
    interval: Duration,
    registry: Registry,
    scanner: Scanner,
    pool: rayon::ThreadPool,
}

impl Poller {
    /// Build a poller and create the backup directory.
    pub fn new(settings: &Settings, host_ip: impl Into<String>) -> Result<Self, PollError> {
        let layout = BackupLayout::new(&settings.backup_dir);
        layout.ensure_dir().map_err(|source| PollError::BackupDir {
            path: settings.backup_dir.clone(),
            source,
        })?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.threads)
            .thread_name(|i| format!("tableprov-scan-{i}"))
            .build()?;
        let scanner = Scanner::new(
            layout,
            Box::new(FsProbe),
            default_oracle(),
            settings.max_metric_bytes,
        );
        Ok(Self {
            watch_config: settings.watch_config.clone(),
            host_ip: host_ip.into(),
            interval: settings.interval(),
            registry: Registry::new(),
            scanner,
            pool,
        })
    }

    pub fn with_oracle(mut self, oracle: Box<dyn ProcessOracle>) -> Self {
        self.scanner = self.scanner.with_oracle(oracle);
        self
    }

    pub fn with_probe(mut self, probe: Box<dyn FileProbe>) -> Self {
        self.scanner = self.scanner.with_probe(probe);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run one full cycle.
    pub fn run_cycle(&mut self, acc: &dyn Accumulator) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::default();

        match load_watch_config(&self.watch_config) {
            Ok(config) => {
                report.config_problems = config.problems.len();
                for problem in &config.problems {
                    warn!(config = %self.watch_config.display(), problem = %problem, "watch config problem");
                    acc.add_error(tp_common::Error::Config(problem.clone()));
                }
                let reconciled = self.registry.reconcile(Registry::discover(&config));
                report.added = reconciled.added.len();
                report.removed = reconciled.removed.len();
                report.index_errors = reconciled.index_errors.len();
                for err in reconciled.index_errors {
                    acc.add_error(err.into());
                }
            }
            Err(err) => {
                warn!(error = %err, "watch config unreadable, keeping current tables");
                report.config_error = true;
                acc.add_error(err.into());
            }
        }

        let Self {
            registry,
            scanner,
            pool,
            ..
        } = self;
        let outcomes: Vec<ScanOutcome> = pool.install(|| {
            registry
                .tables_mut()
                .par_iter_mut()
                .map(|(key, entry)| scanner.scan(key, entry, acc))
                .collect()
        });
        report.tables = outcomes.len();
        for outcome in &outcomes {
            report.count(outcome);
        }

        emit_summary(&self.host_ip, &self.registry, acc);
        report.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            tables = report.tables,
            emitted = report.emitted,
            failed = report.failed,
            skipped = report.skipped,
            elapsed_ms = report.elapsed_ms,
            "cycle complete"
        );
        report
    }

    /// Run cycles back to back, `interval` apart. `max_cycles` of `None`
    /// runs forever.
    pub fn run(&mut self, acc: &dyn Accumulator, max_cycles: Option<u64>) -> Vec<CycleReport> {
        let mut reports = Vec::new();
        let mut cycle: u64 = 0;
        loop {
            cycle += 1;
            debug!(cycle, "cycle starting");
            let report = self.run_cycle(acc);
            // unbounded runs would grow this forever
            if max_cycles.is_some() {
                reports.push(report);
            }
            if max_cycles.is_some_and(|max| cycle >= max) {
                return reports;
            }
            thread::sleep(self.interval);
        }
    }
}
