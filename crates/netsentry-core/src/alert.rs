//! Alert records and sinks.
//!
//! Alerts are append-only: once emitted they are never mutated. Every
//! alert is rendered to standard output with severity colors and
//! appended to a JSONL file that is flushed per record, so a crash
//! loses at most one alert.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use colored::Colorize;
use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::protocols::packet::ParsedPacket;
use crate::rules::{Severity, SignatureRule};

/// One rule match, carrying the connection identity of the packet that
/// caused it.
#[derive(Debug, Clone)]
pub struct Alert {
    pub alert_id: u64,
    /// Packet timestamp in seconds since the Unix epoch.
    pub timestamp: f64,
    pub rule_id: u32,
    pub rule_name: String,
    pub severity: Severity,
    pub packet_id: u64,
    pub src_ip: String,
    pub dst_ip: String,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: String,
    pub description: String,
    /// First content pattern that matched, when the rule had any.
    pub matched_content: Option<String>,
}

impl Alert {
    pub(crate) fn from_match(
        alert_id: u64,
        rule: &SignatureRule,
        packet: &ParsedPacket<'_>,
        matched_content: Option<String>,
    ) -> Self {
        Self {
            alert_id,
            timestamp: packet.ts,
            rule_id: rule.rule_id,
            rule_name: rule.name.clone(),
            severity: rule.severity,
            packet_id: packet.packet_id,
            src_ip: packet.src_ip(),
            dst_ip: packet.dst_ip(),
            src_port: packet.src_port(),
            dst_port: packet.dst_port(),
            protocol: packet.transport_name().to_string(),
            description: rule.description.clone(),
            matched_content,
        }
    }

    /// The JSONL representation, one object per line.
    pub fn to_json(&self) -> serde_json::Value {
        let mut record = json!({
            "alert_id": self.alert_id,
            "timestamp": ts_to_rfc3339(self.timestamp),
            "rule_id": self.rule_id,
            "rule_name": self.rule_name,
            "severity": self.severity.as_str(),
            "packet_id": self.packet_id,
            "src_ip": self.src_ip,
            "src_port": self.src_port,
            "dst_ip": self.dst_ip,
            "dst_port": self.dst_port,
            "protocol": self.protocol,
            "description": self.description,
        });
        if let Some(matched) = &self.matched_content {
            record["matched_content"] = json!(matched);
        }
        record
    }

    fn console_line(&self) -> String {
        let severity = match self.severity {
            Severity::Low => "LOW".green(),
            Severity::Medium => "MEDIUM".yellow(),
            Severity::High => "HIGH".red(),
            Severity::Critical => "CRITICAL".bright_red().bold(),
        };
        format!(
            "[{}] ALERT #{} [{}] {}: {}:{} -> {}:{} ({}) {}",
            ts_to_rfc3339(self.timestamp),
            self.alert_id,
            severity,
            self.rule_name,
            self.src_ip,
            self.src_port,
            self.dst_ip,
            self.dst_port,
            self.protocol,
            self.description,
        )
    }
}

fn ts_to_rfc3339(ts: f64) -> String {
    let nanos = (ts * 1_000_000_000.0) as i128;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
        .unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string())
}

/// Composite alert sink: colored console lines plus an append-only
/// JSONL file.
pub struct AlertSink {
    jsonl: Option<BufWriter<File>>,
    io_error_logged: bool,
}

impl AlertSink {
    /// Open the JSONL log for appending. Failure to open is fatal at
    /// startup; later write errors are logged once and swallowed.
    pub fn open(jsonl_path: Option<&Path>) -> Result<Self, std::io::Error> {
        let jsonl = match jsonl_path {
            Some(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Some(BufWriter::new(file))
            }
            None => None,
        };
        Ok(Self {
            jsonl,
            io_error_logged: false,
        })
    }

    /// Write the alert to both outputs.
    pub fn write(&mut self, alert: &Alert) {
        println!("{}", alert.console_line());

        if let Some(writer) = &mut self.jsonl {
            let result = writeln!(writer, "{}", alert.to_json()).and_then(|_| writer.flush());
            if let Err(err) = result {
                if !self.io_error_logged {
                    log::error!("alert log write failed: {err}; further errors suppressed");
                    self.io_error_logged = true;
                }
            }
        }
    }
}
