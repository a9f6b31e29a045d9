//! tableprov ingestion engine.
//!
//! Watches CSV table snapshots written by external producers, validates
//! their schema, and emits them as size-bounded chunks. Each table is backed
//! by a live file plus a working copy and a last-known-good backup, so a
//! crash of either side never loses the last valid content.
//!
//! Per cycle: [`poller::Poller`] reconciles the [`registry::Registry`], scans
//! every table in parallel with [`scan::Scanner`], then emits a summary.

pub mod accumulator;
pub mod chunk;
pub mod cli;
pub mod exit_codes;
pub mod filestate;
pub mod liveness;
pub mod logging;
pub mod naming;
pub mod poller;
pub mod registry;
pub mod scan;
pub mod summary;
pub mod validate;

pub use accumulator::{Accumulator, JsonLinesAccumulator, MemoryAccumulator, Record};
pub use chunk::{Chunk, ChunkedContent};
pub use exit_codes::ExitCode;
pub use filestate::{decide, Decision, FileProbe, FsProbe, Source, TrioTimes};
pub use liveness::{PidSpec, ProcessOracle, StaticOracle};
pub use naming::{BackupLayout, FileTrio};
pub use poller::{CycleReport, Poller};
pub use registry::{Registry, TableEntry, TableSpec, TableState};
pub use scan::{ScanOutcome, Scanner};
pub use validate::{validate, TableReport, ValidationError};
