//! CLI end-to-end tests for the tableprov binary.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::{tempdir, TempDir};

const GOOD: &str = "v1\n\nhost,count,addr\nstr,int,ip\ndesc\na,1,10.0.0.1\nb,2,10.0.0.2\n";
const RAGGED: &str = "v1\n\nhost,count,addr\nstr,int,ip\ndesc\na,1,10.0.0.1\nb,2\n";
const DIALECT2: &str = "v1\n\nregion,addr\nr)str?,region)ip?\ndesc\nus,10.0.0.1\n";

fn tableprov() -> Command {
    let mut cmd = cargo_bin_cmd!("tableprov");
    cmd.timeout(Duration::from_secs(60));
    cmd.env_remove("TABLEPROV_SETTINGS");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn stdout_json(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("run tableprov");
    serde_json::from_slice(&output.stdout).expect("parse JSON")
}

struct Deployment {
    dir: TempDir,
    settings: PathBuf,
}

impl Deployment {
    fn new() -> Self {
        let dir = tempdir().expect("tempdir");
        let root = dir.path();
        let watch = root.join("watch");
        fs::create_dir_all(&watch).expect("watch dir");
        fs::write(watch.join("hosts.csv"), GOOD).expect("table");
        fs::write(root.join("edge.idx"), "v9\nhosts\nroutes\n").expect("index");
        fs::write(
            root.join("tableprov.conf"),
            format!(
                "[watch]\nindexname = edge\nindex = {}\ndir = {}\n",
                root.join("edge.idx").display(),
                watch.display()
            ),
        )
        .expect("watch config");
        let settings = root.join("settings.toml");
        fs::write(
            &settings,
            format!(
                "watch_config = \"{}\"\nbackup_dir = \"{}\"\ninterval_secs = 0\nthreads = 2\n",
                root.join("tableprov.conf").display(),
                root.join("backup").display()
            ),
        )
        .expect("settings");
        Self { dir, settings }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }
}

// ============================================================================
// validate
// ============================================================================

#[test]
fn test_validate_good_file() {
    let dir = tempdir().expect("tempdir");
    let file = dir.path().join("hosts.csv");
    fs::write(&file, GOOD).expect("write");

    let json = stdout_json(tableprov().args(["validate"]).arg(&file));
    assert_eq!(json["valid"], true);
    assert_eq!(json["report"]["rows"], 2);
    assert_eq!(json["report"]["columns"], 3);
    assert_eq!(json["report"]["version"], "v1");

    tableprov().args(["validate"]).arg(&file).assert().success().code(0);
}

#[test]
fn test_validate_ragged_file_exits_1() {
    let dir = tempdir().expect("tempdir");
    let file = dir.path().join("hosts.csv");
    fs::write(&file, RAGGED).expect("write");

    tableprov()
        .args(["validate"])
        .arg(&file)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("data line[6] fields[2] != columns[3]"))
        .stdout(predicate::str::contains("column count mismatch"));
}

#[test]
fn test_validate_dialect_2() {
    let dir = tempdir().expect("tempdir");
    let file = dir.path().join("regions.csv");
    fs::write(&file, DIALECT2).expect("write");

    tableprov().args(["validate", "--dialect", "2"]).arg(&file).assert().code(0);
    tableprov().args(["validate", "--dialect", "1"]).arg(&file).assert().code(1);
}

#[test]
fn test_validate_missing_file_is_io_error() {
    tableprov()
        .args(["validate", "/definitely/not/here.csv"])
        .assert()
        .code(13)
        .stderr(predicate::str::contains("cannot read"));
}

// ============================================================================
// check
// ============================================================================

#[test]
fn test_check_lists_tables() {
    let dep = Deployment::new();
    let json = stdout_json(tableprov().arg("--settings").arg(&dep.settings).arg("check"));

    assert_eq!(json["settings_source"], "cli");
    let tables = json["tables"].as_array().expect("tables");
    assert_eq!(tables.len(), 2);
    assert_eq!(tables[0]["table"], "hosts");
    assert_eq!(tables[0]["index"], "edge");
    assert_eq!(json["indices"][0]["tables"], 2);
}

#[test]
fn test_check_missing_settings_is_config_error() {
    let dir = tempdir().expect("tempdir");
    tableprov()
        .arg("--settings")
        .arg(dir.path().join("nope.toml"))
        .arg("check")
        .assert()
        .code(10);
}

#[test]
fn test_invalid_settings_value_is_config_error() {
    let dir = tempdir().expect("tempdir");
    let settings = dir.path().join("settings.toml");
    fs::write(&settings, "max_metric_bytes = 0\n").expect("settings");
    tableprov()
        .arg("--settings")
        .arg(&settings)
        .arg("check")
        .assert()
        .code(10)
        .stderr(predicate::str::contains("max_metric_bytes"));
}

// ============================================================================
// once / run
// ============================================================================

#[test]
fn test_once_emits_chunks_and_summary() {
    let dep = Deployment::new();
    let output = tableprov()
        .env("MYPRVIP", "10.9.8.7")
        .arg("--settings")
        .arg(&dep.settings)
        .arg("once")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let lines: Vec<Value> = String::from_utf8(output)
        .expect("utf8")
        .lines()
        .map(|l| serde_json::from_str(l).expect("json line"))
        .collect();

    let hosts: Vec<&Value> = lines.iter().filter(|l| l["name"] == "hosts").collect();
    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0]["tags"]["isLast"], "true");

    // routes.csv does not exist
    assert!(lines.iter().any(|l| l["code"] == 20));

    let summary = lines.last().expect("summary");
    assert_eq!(summary["name"], "tableprov_tables");
    let text = summary["fields"]["tableprov"].as_str().expect("text");
    assert!(text.contains("10.9.8.7,hosts,0,0,2,3,v1,"));
    assert!(text.contains("10.9.8.7,routes,1,0,-1,-1,v9,"));

    assert!(dep.root().join("backup").join("hosts.valid").exists());
}

#[test]
fn test_run_cycles_back_to_back() {
    let dep = Deployment::new();
    tableprov()
        .env("MYPRVIP", "10.9.8.7")
        .arg("--settings")
        .arg(&dep.settings)
        .args(["run", "--cycles", "2", "--interval", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tableprov_tables").count(2));
}

#[test]
fn test_json_logs_go_to_stderr() {
    let dep = Deployment::new();
    tableprov()
        .env("MYPRVIP", "10.9.8.7")
        .arg("--settings")
        .arg(&dep.settings)
        .args(["--log-format", "json", "-v", "once"])
        .assert()
        .success()
        .stderr(predicate::str::contains("\"cycle complete\""));
}
