//! Flow feature extraction.
//!
//! Produces the fixed 78-entry statistical vector consumed by the
//! anomaly models downstream. The field order is stable and doubles as
//! the canonical CSV header; JSON field names match it one-to-one.
//! Extraction is deterministic and side-effect free: repeated calls on
//! the same flow yield identical vectors.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::flow::{FlowStats, SampleStats};

/// Number of entries in the feature schema.
pub const FEATURE_COUNT: usize = 78;

/// Canonical feature order. This array is the external contract for the
/// CSV header and the JSON field set.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "duration",
    "total_fwd_packets",
    "total_bwd_packets",
    "total_fwd_bytes",
    "total_bwd_bytes",
    "fwd_pkt_len_max",
    "fwd_pkt_len_min",
    "fwd_pkt_len_mean",
    "fwd_pkt_len_std",
    "bwd_pkt_len_max",
    "bwd_pkt_len_min",
    "bwd_pkt_len_mean",
    "bwd_pkt_len_std",
    "flow_bytes_per_sec",
    "flow_packets_per_sec",
    "flow_iat_mean",
    "flow_iat_std",
    "flow_iat_max",
    "flow_iat_min",
    "fwd_iat_total",
    "fwd_iat_mean",
    "fwd_iat_std",
    "fwd_iat_max",
    "fwd_iat_min",
    "bwd_iat_total",
    "bwd_iat_mean",
    "bwd_iat_std",
    "bwd_iat_max",
    "bwd_iat_min",
    "fwd_psh_flags",
    "bwd_psh_flags",
    "fwd_urg_flags",
    "bwd_urg_flags",
    "fwd_header_len",
    "bwd_header_len",
    "fwd_packets_per_sec",
    "bwd_packets_per_sec",
    "pkt_len_min",
    "pkt_len_max",
    "pkt_len_mean",
    "pkt_len_std",
    "pkt_len_variance",
    "fin_flag_count",
    "syn_flag_count",
    "rst_flag_count",
    "psh_flag_count",
    "ack_flag_count",
    "urg_flag_count",
    "cwr_flag_count",
    "ece_flag_count",
    "down_up_ratio",
    "avg_packet_size",
    "avg_fwd_segment_size",
    "avg_bwd_segment_size",
    "fwd_bulk_bytes_avg",
    "fwd_bulk_packets_avg",
    "fwd_bulk_rate_avg",
    "bwd_bulk_bytes_avg",
    "bwd_bulk_packets_avg",
    "bwd_bulk_rate_avg",
    "subflow_fwd_packets",
    "subflow_fwd_bytes",
    "subflow_bwd_packets",
    "subflow_bwd_bytes",
    "init_win_bytes_fwd",
    "init_win_bytes_bwd",
    "fwd_act_data_packets",
    "fwd_seg_size_min",
    "active_mean",
    "active_std",
    "active_max",
    "active_min",
    "idle_mean",
    "idle_std",
    "idle_max",
    "idle_min",
    "dst_port",
    "protocol",
];

/// Fixed-schema statistical description of one flow.
///
/// All values are finite; an absent statistic yields 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub duration: f64,
    pub total_fwd_packets: f64,
    pub total_bwd_packets: f64,
    pub total_fwd_bytes: f64,
    pub total_bwd_bytes: f64,
    pub fwd_pkt_len_max: f64,
    pub fwd_pkt_len_min: f64,
    pub fwd_pkt_len_mean: f64,
    pub fwd_pkt_len_std: f64,
    pub bwd_pkt_len_max: f64,
    pub bwd_pkt_len_min: f64,
    pub bwd_pkt_len_mean: f64,
    pub bwd_pkt_len_std: f64,
    pub flow_bytes_per_sec: f64,
    pub flow_packets_per_sec: f64,
    pub flow_iat_mean: f64,
    pub flow_iat_std: f64,
    pub flow_iat_max: f64,
    pub flow_iat_min: f64,
    pub fwd_iat_total: f64,
    pub fwd_iat_mean: f64,
    pub fwd_iat_std: f64,
    pub fwd_iat_max: f64,
    pub fwd_iat_min: f64,
    pub bwd_iat_total: f64,
    pub bwd_iat_mean: f64,
    pub bwd_iat_std: f64,
    pub bwd_iat_max: f64,
    pub bwd_iat_min: f64,
    pub fwd_psh_flags: f64,
    pub bwd_psh_flags: f64,
    pub fwd_urg_flags: f64,
    pub bwd_urg_flags: f64,
    pub fwd_header_len: f64,
    pub bwd_header_len: f64,
    pub fwd_packets_per_sec: f64,
    pub bwd_packets_per_sec: f64,
    pub pkt_len_min: f64,
    pub pkt_len_max: f64,
    pub pkt_len_mean: f64,
    pub pkt_len_std: f64,
    pub pkt_len_variance: f64,
    pub fin_flag_count: f64,
    pub syn_flag_count: f64,
    pub rst_flag_count: f64,
    pub psh_flag_count: f64,
    pub ack_flag_count: f64,
    pub urg_flag_count: f64,
    pub cwr_flag_count: f64,
    pub ece_flag_count: f64,
    pub down_up_ratio: f64,
    pub avg_packet_size: f64,
    pub avg_fwd_segment_size: f64,
    pub avg_bwd_segment_size: f64,
    pub fwd_bulk_bytes_avg: f64,
    pub fwd_bulk_packets_avg: f64,
    pub fwd_bulk_rate_avg: f64,
    pub bwd_bulk_bytes_avg: f64,
    pub bwd_bulk_packets_avg: f64,
    pub bwd_bulk_rate_avg: f64,
    pub subflow_fwd_packets: f64,
    pub subflow_fwd_bytes: f64,
    pub subflow_bwd_packets: f64,
    pub subflow_bwd_bytes: f64,
    pub init_win_bytes_fwd: f64,
    pub init_win_bytes_bwd: f64,
    pub fwd_act_data_packets: f64,
    pub fwd_seg_size_min: f64,
    pub active_mean: f64,
    pub active_std: f64,
    pub active_max: f64,
    pub active_min: f64,
    pub idle_mean: f64,
    pub idle_std: f64,
    pub idle_max: f64,
    pub idle_min: f64,
    pub dst_port: f64,
    pub protocol: f64,
}

/// A direction needs at least this many packets before bulk-transfer
/// approximations apply.
const BULK_MIN_PACKETS: u64 = 4;

/// Compute the feature vector for a flow.
pub fn extract_features(flow: &FlowStats) -> FeatureVector {
    let duration = flow.duration();
    let total_packets = flow.total_packets();
    let total_bytes = flow.total_bytes();

    let fwd_bytes = flow.fwd.bytes as f64;
    let bwd_bytes = flow.bwd.bytes as f64;
    let fwd_packets = flow.fwd.packets as f64;
    let bwd_packets = flow.bwd.packets as f64;

    let pkt_len = SampleStats::merged(&flow.fwd.pkt_len, &flow.bwd.pkt_len);

    let avg_fwd_segment_size = ratio(fwd_bytes, fwd_packets);
    let avg_bwd_segment_size = ratio(bwd_bytes, bwd_packets);

    let (fwd_bulk_bytes, fwd_bulk_packets, fwd_bulk_rate) =
        bulk_features(flow.fwd.packets, fwd_bytes, avg_fwd_segment_size, duration);
    let (bwd_bulk_bytes, bwd_bulk_packets, bwd_bulk_rate) =
        bulk_features(flow.bwd.packets, bwd_bytes, avg_bwd_segment_size, duration);

    FeatureVector {
        duration,
        total_fwd_packets: fwd_packets,
        total_bwd_packets: bwd_packets,
        total_fwd_bytes: fwd_bytes,
        total_bwd_bytes: bwd_bytes,
        fwd_pkt_len_max: flow.fwd.pkt_len.max(),
        fwd_pkt_len_min: flow.fwd.pkt_len.min(),
        fwd_pkt_len_mean: flow.fwd.pkt_len.mean(),
        fwd_pkt_len_std: flow.fwd.pkt_len.std_dev(),
        bwd_pkt_len_max: flow.bwd.pkt_len.max(),
        bwd_pkt_len_min: flow.bwd.pkt_len.min(),
        bwd_pkt_len_mean: flow.bwd.pkt_len.mean(),
        bwd_pkt_len_std: flow.bwd.pkt_len.std_dev(),
        flow_bytes_per_sec: rate(total_bytes as f64, duration),
        flow_packets_per_sec: rate(total_packets as f64, duration),
        flow_iat_mean: flow.flow_iat.mean(),
        flow_iat_std: flow.flow_iat.std_dev(),
        flow_iat_max: flow.flow_iat.max(),
        flow_iat_min: flow.flow_iat.min(),
        fwd_iat_total: flow.fwd.iat.sum(),
        fwd_iat_mean: flow.fwd.iat.mean(),
        fwd_iat_std: flow.fwd.iat.std_dev(),
        fwd_iat_max: flow.fwd.iat.max(),
        fwd_iat_min: flow.fwd.iat.min(),
        bwd_iat_total: flow.bwd.iat.sum(),
        bwd_iat_mean: flow.bwd.iat.mean(),
        bwd_iat_std: flow.bwd.iat.std_dev(),
        bwd_iat_max: flow.bwd.iat.max(),
        bwd_iat_min: flow.bwd.iat.min(),
        fwd_psh_flags: flow.fwd.psh_count as f64,
        bwd_psh_flags: flow.bwd.psh_count as f64,
        fwd_urg_flags: flow.fwd.urg_count as f64,
        bwd_urg_flags: flow.bwd.urg_count as f64,
        fwd_header_len: flow.fwd.header_bytes as f64,
        bwd_header_len: flow.bwd.header_bytes as f64,
        fwd_packets_per_sec: rate(fwd_packets, duration),
        bwd_packets_per_sec: rate(bwd_packets, duration),
        pkt_len_min: pkt_len.min(),
        pkt_len_max: pkt_len.max(),
        pkt_len_mean: pkt_len.mean(),
        pkt_len_std: pkt_len.std_dev(),
        pkt_len_variance: pkt_len.variance(),
        fin_flag_count: flow.flags.fin as f64,
        syn_flag_count: flow.flags.syn as f64,
        rst_flag_count: flow.flags.rst as f64,
        psh_flag_count: flow.flags.psh as f64,
        ack_flag_count: flow.flags.ack as f64,
        urg_flag_count: flow.flags.urg as f64,
        cwr_flag_count: flow.flags.cwr as f64,
        ece_flag_count: flow.flags.ece as f64,
        down_up_ratio: ratio(bwd_bytes, fwd_bytes),
        avg_packet_size: ratio(total_bytes as f64, total_packets as f64),
        avg_fwd_segment_size,
        avg_bwd_segment_size,
        fwd_bulk_bytes_avg: fwd_bulk_bytes,
        fwd_bulk_packets_avg: fwd_bulk_packets,
        fwd_bulk_rate_avg: fwd_bulk_rate,
        bwd_bulk_bytes_avg: bwd_bulk_bytes,
        bwd_bulk_packets_avg: bwd_bulk_packets,
        bwd_bulk_rate_avg: bwd_bulk_rate,
        subflow_fwd_packets: fwd_packets,
        subflow_fwd_bytes: fwd_bytes,
        subflow_bwd_packets: bwd_packets,
        subflow_bwd_bytes: bwd_bytes,
        init_win_bytes_fwd: flow.fwd.init_window.map_or(0.0, f64::from),
        init_win_bytes_bwd: flow.bwd.init_window.map_or(0.0, f64::from),
        fwd_act_data_packets: flow.fwd.payload_packets as f64,
        fwd_seg_size_min: flow.fwd.min_header_len.map_or(0.0, |len| len as f64),
        active_mean: flow.active.mean(),
        active_std: flow.active.std_dev(),
        active_max: flow.active.max(),
        active_min: flow.active.min(),
        idle_mean: flow.idle.mean(),
        idle_std: flow.idle.std_dev(),
        idle_max: flow.idle.max(),
        idle_min: flow.idle.min(),
        dst_port: flow.responder.port as f64,
        protocol: flow.key.protocol as f64,
    }
}

fn rate(count: f64, duration: f64) -> f64 {
    if duration > 0.0 { count / duration } else { 0.0 }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

fn bulk_features(packets: u64, bytes: f64, segment_size: f64, duration: f64) -> (f64, f64, f64) {
    if packets >= BULK_MIN_PACKETS && duration > 0.0 {
        (
            segment_size,
            packets as f64 / BULK_MIN_PACKETS as f64,
            bytes / duration,
        )
    } else {
        (0.0, 0.0, 0.0)
    }
}

impl FeatureVector {
    /// Values in canonical schema order.
    pub fn to_row(&self) -> [f64; FEATURE_COUNT] {
        [
            self.duration,
            self.total_fwd_packets,
            self.total_bwd_packets,
            self.total_fwd_bytes,
            self.total_bwd_bytes,
            self.fwd_pkt_len_max,
            self.fwd_pkt_len_min,
            self.fwd_pkt_len_mean,
            self.fwd_pkt_len_std,
            self.bwd_pkt_len_max,
            self.bwd_pkt_len_min,
            self.bwd_pkt_len_mean,
            self.bwd_pkt_len_std,
            self.flow_bytes_per_sec,
            self.flow_packets_per_sec,
            self.flow_iat_mean,
            self.flow_iat_std,
            self.flow_iat_max,
            self.flow_iat_min,
            self.fwd_iat_total,
            self.fwd_iat_mean,
            self.fwd_iat_std,
            self.fwd_iat_max,
            self.fwd_iat_min,
            self.bwd_iat_total,
            self.bwd_iat_mean,
            self.bwd_iat_std,
            self.bwd_iat_max,
            self.bwd_iat_min,
            self.fwd_psh_flags,
            self.bwd_psh_flags,
            self.fwd_urg_flags,
            self.bwd_urg_flags,
            self.fwd_header_len,
            self.bwd_header_len,
            self.fwd_packets_per_sec,
            self.bwd_packets_per_sec,
            self.pkt_len_min,
            self.pkt_len_max,
            self.pkt_len_mean,
            self.pkt_len_std,
            self.pkt_len_variance,
            self.fin_flag_count,
            self.syn_flag_count,
            self.rst_flag_count,
            self.psh_flag_count,
            self.ack_flag_count,
            self.urg_flag_count,
            self.cwr_flag_count,
            self.ece_flag_count,
            self.down_up_ratio,
            self.avg_packet_size,
            self.avg_fwd_segment_size,
            self.avg_bwd_segment_size,
            self.fwd_bulk_bytes_avg,
            self.fwd_bulk_packets_avg,
            self.fwd_bulk_rate_avg,
            self.bwd_bulk_bytes_avg,
            self.bwd_bulk_packets_avg,
            self.bwd_bulk_rate_avg,
            self.subflow_fwd_packets,
            self.subflow_fwd_bytes,
            self.subflow_bwd_packets,
            self.subflow_bwd_bytes,
            self.init_win_bytes_fwd,
            self.init_win_bytes_bwd,
            self.fwd_act_data_packets,
            self.fwd_seg_size_min,
            self.active_mean,
            self.active_std,
            self.active_max,
            self.active_min,
            self.idle_mean,
            self.idle_std,
            self.idle_max,
            self.idle_min,
            self.dst_port,
            self.protocol,
        ]
    }

    /// Rebuild a vector from values in canonical schema order.
    pub fn from_row(row: &[f64; FEATURE_COUNT]) -> Self {
        Self {
            duration: row[0],
            total_fwd_packets: row[1],
            total_bwd_packets: row[2],
            total_fwd_bytes: row[3],
            total_bwd_bytes: row[4],
            fwd_pkt_len_max: row[5],
            fwd_pkt_len_min: row[6],
            fwd_pkt_len_mean: row[7],
            fwd_pkt_len_std: row[8],
            bwd_pkt_len_max: row[9],
            bwd_pkt_len_min: row[10],
            bwd_pkt_len_mean: row[11],
            bwd_pkt_len_std: row[12],
            flow_bytes_per_sec: row[13],
            flow_packets_per_sec: row[14],
            flow_iat_mean: row[15],
            flow_iat_std: row[16],
            flow_iat_max: row[17],
            flow_iat_min: row[18],
            fwd_iat_total: row[19],
            fwd_iat_mean: row[20],
            fwd_iat_std: row[21],
            fwd_iat_max: row[22],
            fwd_iat_min: row[23],
            bwd_iat_total: row[24],
            bwd_iat_mean: row[25],
            bwd_iat_std: row[26],
            bwd_iat_max: row[27],
            bwd_iat_min: row[28],
            fwd_psh_flags: row[29],
            bwd_psh_flags: row[30],
            fwd_urg_flags: row[31],
            bwd_urg_flags: row[32],
            fwd_header_len: row[33],
            bwd_header_len: row[34],
            fwd_packets_per_sec: row[35],
            bwd_packets_per_sec: row[36],
            pkt_len_min: row[37],
            pkt_len_max: row[38],
            pkt_len_mean: row[39],
            pkt_len_std: row[40],
            pkt_len_variance: row[41],
            fin_flag_count: row[42],
            syn_flag_count: row[43],
            rst_flag_count: row[44],
            psh_flag_count: row[45],
            ack_flag_count: row[46],
            urg_flag_count: row[47],
            cwr_flag_count: row[48],
            ece_flag_count: row[49],
            down_up_ratio: row[50],
            avg_packet_size: row[51],
            avg_fwd_segment_size: row[52],
            avg_bwd_segment_size: row[53],
            fwd_bulk_bytes_avg: row[54],
            fwd_bulk_packets_avg: row[55],
            fwd_bulk_rate_avg: row[56],
            bwd_bulk_bytes_avg: row[57],
            bwd_bulk_packets_avg: row[58],
            bwd_bulk_rate_avg: row[59],
            subflow_fwd_packets: row[60],
            subflow_fwd_bytes: row[61],
            subflow_bwd_packets: row[62],
            subflow_bwd_bytes: row[63],
            init_win_bytes_fwd: row[64],
            init_win_bytes_bwd: row[65],
            fwd_act_data_packets: row[66],
            fwd_seg_size_min: row[67],
            active_mean: row[68],
            active_std: row[69],
            active_max: row[70],
            active_min: row[71],
            idle_mean: row[72],
            idle_std: row[73],
            idle_max: row[74],
            idle_min: row[75],
            dst_port: row[76],
            protocol: row[77],
        }
    }
}

/// CSV sink for feature vectors: canonical header, one flow vector per
/// line, six-decimal precision.
pub struct FeatureCsvWriter {
    writer: csv::Writer<File>,
}

impl FeatureCsvWriter {
    /// Create the file and write the canonical header.
    pub fn create(path: &Path) -> Result<Self, csv::Error> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(FEATURE_NAMES)?;
        Ok(Self { writer })
    }

    pub fn write(&mut self, features: &FeatureVector) -> Result<(), csv::Error> {
        let row = features.to_row();
        self.writer
            .write_record(row.iter().map(|value| format!("{value:.6}")))?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), std::io::Error> {
        self.writer.flush()
    }
}
