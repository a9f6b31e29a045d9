//! Per-cycle overview record.
//!
//! After every cycle one record named [`SUMMARY_TABLE`] is emitted. Its only
//! field is itself a small table in the same five-row metadata layout as the
//! watched tables, listing every table and index with its counters.

use crate::accumulator::{Accumulator, Fields, Tags};
use crate::registry::Registry;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::time::{SystemTime, UNIX_EPOCH};
use tp_common::PAYLOAD_FIELD;

pub const SUMMARY_TABLE: &str = "tableprov_tables";

const HEADER: &str = "An overview of all tables provided by tableprov on this machine\n\
ip,table,errors,usingbackup,rows,cols,version,file,status,lastreadtime\n\
ip,string,int,int,int,int,string,string,string,time\n\
ip, tablename, total errors since startup, using backup, rows, cols, version, file name, process status, last read time (GMT)\n";

fn unix_secs(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
        Err(e) => -i64::try_from(e.duration().as_secs()).unwrap_or(i64::MAX),
    }
}

/// Render the overview text.
pub fn render_summary(host_ip: &str, registry: &Registry, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", now.timestamp());
    out.push_str(HEADER);

    for (key, entry) in registry.tables() {
        let state = &entry.state;
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{}",
            host_ip,
            entry.spec.name,
            state.errors,
            u8::from(state.using_backup),
            state.rows,
            state.cols,
            state.version,
            key,
            state.status,
            unix_secs(state.last_good),
        );
    }
    for (path, index) in registry.indices() {
        let _ = writeln!(
            out,
            "{},{},{},0,{},0,,{},{},{}",
            host_ip,
            index.name,
            index.errors,
            index.rows,
            path.display(),
            index.status,
            unix_secs(index.modified),
        );
    }
    out
}

/// Emit the overview record.
pub fn emit_summary(host_ip: &str, registry: &Registry, acc: &dyn Accumulator) {
    let now = Utc::now();
    let mut fields = Fields::new();
    fields.insert(
        PAYLOAD_FIELD.to_string(),
        render_summary(host_ip, registry, now),
    );
    acc.add_fields(SUMMARY_TABLE, fields, Tags::new(), now);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tp_config::parse_watch_config;

    #[test]
    fn test_empty_registry_is_header_only() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).single().expect("time");
        let text = render_summary("10.1.2.3", &Registry::new(), now);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "1700000000");
        assert_eq!(
            lines[2],
            "ip,table,errors,usingbackup,rows,cols,version,file,status,lastreadtime"
        );
    }

    #[test]
    fn test_rows_for_tables_then_indices() {
        let dir = tempfile::tempdir().expect("tempdir");
        let index = dir.path().join("index.txt");
        fs::write(&index, "v9\nhosts\n").expect("write index");
        let config = parse_watch_config(&format!(
            "[watch]\nindexname = edge\nindex = {}\ndir = /data\n",
            index.display()
        ));
        let mut registry = Registry::new();
        registry.reconcile(Registry::discover(&config));

        let text = render_summary("10.1.2.3", &registry, Utc::now());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[5], "10.1.2.3,hosts,0,0,-1,-1,v9,/data/hosts.csv,,0");
        assert!(lines[6].starts_with(&format!("10.1.2.3,edge,0,0,1,0,,{},ok,", index.display())));
    }

    #[test]
    fn test_emit_uses_summary_name() {
        let acc = crate::accumulator::MemoryAccumulator::new();
        emit_summary("ip", &Registry::new(), &acc);
        let records = acc.records_named(SUMMARY_TABLE);
        assert_eq!(records.len(), 1);
        assert!(records[0].fields[PAYLOAD_FIELD].contains("An overview"));
    }
}
