use assert_cmd::Command;
use predicates::str::contains;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("netsentry"))
}

/// Minimal legacy-pcap writer for fixtures: global header plus one
/// record per frame.
fn write_legacy_pcap(path: &Path, frames: &[(f64, Vec<u8>)]) {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0xa1b2_c3d4u32.to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&4u16.to_le_bytes());
    bytes.extend_from_slice(&0i32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&65_535u32.to_le_bytes());
    bytes.extend_from_slice(&1u32.to_le_bytes());

    for (ts, data) in frames {
        let secs = ts.trunc() as u32;
        let micros = ((ts - ts.trunc()) * 1e6).round() as u32;
        bytes.extend_from_slice(&secs.to_le_bytes());
        bytes.extend_from_slice(&micros.to_le_bytes());
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(data);
    }

    std::fs::write(path, bytes).expect("write fixture");
}

fn telnet_frame() -> Vec<u8> {
    let builder = etherparse::PacketBuilder::ethernet2([1, 1, 1, 1, 1, 1], [2, 2, 2, 2, 2, 2])
        .ipv4([10, 0, 0, 50], [192, 168, 1, 5], 64)
        .tcp(52000, 23, 0, 8192)
        .psh()
        .ack(1);
    let payload = b"login: admin";
    let mut frame = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut frame, payload).expect("build frame");
    frame
}

#[test]
fn missing_capture_file_fails_with_hint() {
    cmd()
        .args(["-r", "/nonexistent/capture.pcap"])
        .assert()
        .failure()
        .code(2)
        .stderr(contains("error: input file not found"))
        .stderr(contains("hint: use a .pcap or .pcapng file"));
}

#[test]
fn source_arguments_are_mutually_exclusive() {
    cmd()
        .args(["-r", "capture.pcap", "-i", "eth0"])
        .assert()
        .failure();
}

#[test]
fn a_source_argument_is_required() {
    cmd().assert().failure();
}

#[test]
fn offline_run_emits_alerts_and_statistics() {
    let temp = TempDir::new().expect("tempdir");
    let capture = temp.path().join("telnet.pcap");
    let alert_log = temp.path().join("alerts.jsonl");
    write_legacy_pcap(&capture, &[(1.0, telnet_frame())]);

    cmd()
        .arg("-r")
        .arg(&capture)
        .arg("--alert-log")
        .arg(&alert_log)
        .assert()
        .success()
        .stdout(contains("ALERT"))
        .stdout(contains("Telnet"))
        .stdout(contains("packets: 1"));

    let contents = std::fs::read_to_string(&alert_log).expect("read alert log");
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 1);
    let alert: Value = serde_json::from_str(lines[0]).expect("parse alert json");
    assert_eq!(alert["rule_id"], 1006);
    assert_eq!(alert["severity"], "medium");
    assert_eq!(alert["dst_port"], 23);
}

#[test]
fn quiet_run_suppresses_the_summary() {
    let temp = TempDir::new().expect("tempdir");
    let capture = temp.path().join("telnet.pcap");
    write_legacy_pcap(&capture, &[(1.0, telnet_frame())]);

    let assert = cmd()
        .arg("-r")
        .arg(&capture)
        .arg("--no-alert-log")
        .arg("--quiet")
        .assert()
        .success();
    let output = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(!output.contains("--- statistics"));
}

#[test]
fn no_rules_disables_alerting() {
    let temp = TempDir::new().expect("tempdir");
    let capture = temp.path().join("telnet.pcap");
    let alert_log = temp.path().join("alerts.jsonl");
    write_legacy_pcap(&capture, &[(1.0, telnet_frame())]);

    cmd()
        .arg("-r")
        .arg(&capture)
        .arg("--alert-log")
        .arg(&alert_log)
        .arg("--no-rules")
        .assert()
        .success()
        .stdout(contains("alerts: 0"));

    let contents = std::fs::read_to_string(&alert_log).unwrap_or_default();
    assert!(contents.is_empty());
}

#[test]
fn features_csv_export_writes_header_and_rows() {
    let temp = TempDir::new().expect("tempdir");
    let capture = temp.path().join("telnet.pcap");
    let csv = temp.path().join("features.csv");
    write_legacy_pcap(&capture, &[(1.0, telnet_frame()), (1.5, telnet_frame())]);

    cmd()
        .arg("-r")
        .arg(&capture)
        .arg("--no-alert-log")
        .arg("--features-csv")
        .arg(&csv)
        .assert()
        .success();

    let contents = std::fs::read_to_string(&csv).expect("read csv");
    let mut lines = contents.lines();
    let header = lines.next().expect("header line");
    assert!(header.starts_with("duration,total_fwd_packets"));
    assert_eq!(lines.count(), 2);
}

#[test]
fn version_includes_build_metadata() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(contains("netsentry"))
        .stdout(contains("commit"));
}
