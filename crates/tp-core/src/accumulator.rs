//! Metric sinks.
//!
//! Scans hand every chunk and every error to an [`Accumulator`]. The daemon
//! writes them to stdout as JSON lines; tests collect them in memory.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

pub type Fields = BTreeMap<String, String>;
pub type Tags = BTreeMap<String, String>;

/// One emitted metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub name: String,
    pub fields: Fields,
    pub tags: Tags,
    pub timestamp: DateTime<Utc>,
}

/// One reported error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub error: String,
    pub code: u32,
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn from_error(err: &tp_common::Error) -> Self {
        Self {
            error: err.to_string(),
            code: err.code(),
            timestamp: Utc::now(),
        }
    }
}

/// Destination for emitted metrics and errors.
///
/// Shared by all workers of a cycle, so implementations synchronise
/// internally.
pub trait Accumulator: Send + Sync {
    fn add_fields(&self, name: &str, fields: Fields, tags: Tags, timestamp: DateTime<Utc>);

    fn add_error(&self, err: tp_common::Error);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // a panicking writer leaves complete lines behind
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Writes one JSON object per line.
pub struct JsonLinesAccumulator<W: Write + Send> {
    out: Mutex<W>,
}

impl JsonLinesAccumulator<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesAccumulator<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    fn write_line<T: Serialize>(&self, value: &T) {
        let line = match serde_json::to_string(value) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "failed to serialize record");
                return;
            }
        };
        let mut out = lock(&self.out);
        if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            warn!(error = %e, "failed to write record");
        }
    }
}

impl<W: Write + Send> Accumulator for JsonLinesAccumulator<W> {
    fn add_fields(&self, name: &str, fields: Fields, tags: Tags, timestamp: DateTime<Utc>) {
        self.write_line(&Record {
            name: name.to_string(),
            fields,
            tags,
            timestamp,
        });
    }

    fn add_error(&self, err: tp_common::Error) {
        self.write_line(&ErrorRecord::from_error(&err));
    }
}

/// Keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryAccumulator {
    records: Mutex<Vec<Record>>,
    errors: Mutex<Vec<ErrorRecord>>,
}

impl MemoryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Record> {
        lock(&self.records).clone()
    }

    pub fn records_named(&self, name: &str) -> Vec<Record> {
        lock(&self.records)
            .iter()
            .filter(|r| r.name == name)
            .cloned()
            .collect()
    }

    pub fn errors(&self) -> Vec<ErrorRecord> {
        lock(&self.errors).clone()
    }

    pub fn clear(&self) {
        lock(&self.records).clear();
        lock(&self.errors).clear();
    }
}

impl Accumulator for MemoryAccumulator {
    fn add_fields(&self, name: &str, fields: Fields, tags: Tags, timestamp: DateTime<Utc>) {
        lock(&self.records).push(Record {
            name: name.to_string(),
            fields,
            tags,
            timestamp,
        });
    }

    fn add_error(&self, err: tp_common::Error) {
        lock(&self.errors).push(ErrorRecord::from_error(&err));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_lines_shape() {
        let acc = JsonLinesAccumulator::new(Vec::new());
        let mut fields = Fields::new();
        fields.insert("tableprov".into(), "a,b\n".into());
        let mut tags = Tags::new();
        tags.insert("chunkNumber".into(), "0".into());
        acc.add_fields("hosts", fields, tags, Utc::now());
        acc.add_error(tp_common::Error::NoSource("/d/x.csv".into()));

        let out = String::from_utf8(acc.into_inner()).expect("utf8");
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).expect("json line"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["name"], "hosts");
        assert_eq!(lines[0]["fields"]["tableprov"], "a,b\n");
        assert_eq!(lines[0]["tags"]["chunkNumber"], "0");
        assert_eq!(lines[1]["code"], 20);
        assert!(lines[1]["error"].as_str().expect("str").contains("/d/x.csv"));
    }

    #[test]
    fn test_memory_accumulator_filters_by_name() {
        let acc = MemoryAccumulator::new();
        acc.add_fields("a", Fields::new(), Tags::new(), Utc::now());
        acc.add_fields("b", Fields::new(), Tags::new(), Utc::now());
        acc.add_fields("a", Fields::new(), Tags::new(), Utc::now());
        assert_eq!(acc.records().len(), 3);
        assert_eq!(acc.records_named("a").len(), 2);

        acc.clear();
        assert!(acc.records().is_empty());
    }
}
