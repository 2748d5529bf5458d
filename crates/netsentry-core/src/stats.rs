//! Global engine statistics.
//!
//! One mutable `Statistics` value is owned by the pipeline task;
//! snapshots are rendered into the human-readable block printed on the
//! live cadence and at shutdown.

use crate::protocols::packet::layout;
use crate::rules::Severity;

/// Counter block for everything the pipeline observes.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    /// Timestamp of the first frame, seconds since the Unix epoch.
    pub start_time: Option<f64>,
    /// Timestamp of the most recent frame.
    pub last_time: Option<f64>,
    pub total_packets: u64,
    pub total_bytes: u64,
    pub tcp_packets: u64,
    pub udp_packets: u64,
    pub icmp_packets: u64,
    pub other_packets: u64,
    pub parse_errors: u64,
    pub decode_errors: u64,
    pub http_messages: u64,
    pub dns_messages: u64,
    pub alerts_total: u64,
    /// Alert counts indexed by `Severity::index()`.
    pub alerts_by_severity: [u64; 4],
    pub alerts_dropped: u64,
    pub features_published: u64,
    pub features_dropped: u64,
    pub flows_created: u64,
    pub flows_expired: u64,
    pub flows_dropped: u64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account one successfully parsed packet.
    pub fn record_packet(&mut self, ts: f64, ip_protocol: u8, frame_len: usize) {
        if self.start_time.is_none() {
            self.start_time = Some(ts);
        }
        self.last_time = Some(ts);
        self.total_packets += 1;
        self.total_bytes += frame_len as u64;
        match ip_protocol {
            layout::IP_PROTO_TCP => self.tcp_packets += 1,
            layout::IP_PROTO_UDP => self.udp_packets += 1,
            layout::IP_PROTO_ICMP => self.icmp_packets += 1,
            _ => self.other_packets += 1,
        }
    }

    pub fn record_alert(&mut self, severity: Severity) {
        self.alerts_total += 1;
        self.alerts_by_severity[severity.index()] += 1;
    }

    /// Capture span in seconds.
    pub fn elapsed(&self) -> f64 {
        match (self.start_time, self.last_time) {
            (Some(start), Some(last)) if last > start => last - start,
            _ => 0.0,
        }
    }

    pub fn packets_per_sec(&self) -> f64 {
        let elapsed = self.elapsed();
        if elapsed > 0.0 {
            self.total_packets as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn mbps(&self) -> f64 {
        let elapsed = self.elapsed();
        if elapsed > 0.0 {
            (self.total_bytes as f64 * 8.0) / elapsed / 1e6
        } else {
            0.0
        }
    }

    /// Render the periodic human-readable block.
    pub fn render(&self) -> String {
        let mut block = String::new();
        block.push_str("--- statistics ---------------------------------\n");
        block.push_str(&format!(
            "packets: {} ({} B)  tcp {}  udp {}  icmp {}  other {}\n",
            self.total_packets,
            self.total_bytes,
            self.tcp_packets,
            self.udp_packets,
            self.icmp_packets,
            self.other_packets,
        ));
        block.push_str(&format!(
            "rates: {:.1} pkt/s  {:.3} Mbps\n",
            self.packets_per_sec(),
            self.mbps(),
        ));
        block.push_str(&format!(
            "errors: {} parse, {} decode  decoded: {} http, {} dns\n",
            self.parse_errors, self.decode_errors, self.http_messages, self.dns_messages,
        ));
        block.push_str(&format!(
            "flows: {} created, {} expired, {} dropped\n",
            self.flows_created, self.flows_expired, self.flows_dropped,
        ));
        block.push_str(&format!(
            "features: {} published, {} dropped\n",
            self.features_published, self.features_dropped,
        ));
        block.push_str(&format!(
            "alerts: {} (low {}, medium {}, high {}, critical {}; {} dropped)\n",
            self.alerts_total,
            self.alerts_by_severity[0],
            self.alerts_by_severity[1],
            self.alerts_by_severity[2],
            self.alerts_by_severity[3],
            self.alerts_dropped,
        ));
        block.push_str("-------------------------------------------------");
        block
    }
}
