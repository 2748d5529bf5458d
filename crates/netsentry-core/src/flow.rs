//! Per-connection flow state.
//!
//! A flow is a bidirectional stream identified by its 5-tuple. Keys are
//! canonicalized by ordering the two endpoints, so both directions of a
//! conversation land on one entry; each packet is then classified as
//! forward (sent by the flow's initiator) or backward. Sample streams
//! use running statistics, so per-flow memory is constant regardless of
//! flow length.

use std::net::Ipv4Addr;

use serde::Serialize;

use crate::protocols::packet::layout::tcp_flags;
use crate::protocols::packet::{ParsedPacket, Transport};

/// Gap above which a flow is considered idle between two packets; the
/// elapsed active period is closed and the gap recorded as idle time.
pub const ACTIVITY_GAP_SECS: f64 = 1.0;

/// One side of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Canonical flow identity: the endpoint pair in sorted order plus the
/// IP protocol. Both directions of a 5-tuple map to the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub lower: Endpoint,
    pub upper: Endpoint,
    pub protocol: u8,
}

impl FlowKey {
    /// Build the canonical key for a packet and return the packet's
    /// source endpoint for direction classification.
    pub fn from_packet(packet: &ParsedPacket<'_>) -> (Self, Endpoint) {
        let src = Endpoint {
            ip: packet.ipv4.src,
            port: packet.src_port(),
        };
        let dst = Endpoint {
            ip: packet.ipv4.dst,
            port: packet.dst_port(),
        };
        let (lower, upper) = if src <= dst { (src, dst) } else { (dst, src) };
        (
            Self {
                lower,
                upper,
                protocol: packet.ipv4.protocol,
            },
            src,
        )
    }
}

/// Packet direction relative to the flow initiator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Coarse TCP connection state tracked from observed flag sets.
///
/// Transitions are one-way; `Closed` is terminal and makes the flow
/// eligible for immediate removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TcpState {
    Unknown,
    SynSent,
    SynReceived,
    Established,
    FinWait,
    Closed,
}

impl TcpState {
    /// Advance the state machine with one packet's TCP flags.
    pub fn advance(self, flags: u8) -> TcpState {
        let syn = flags & tcp_flags::SYN != 0;
        let ack = flags & tcp_flags::ACK != 0;
        let fin = flags & tcp_flags::FIN != 0;
        let rst = flags & tcp_flags::RST != 0;

        match self {
            TcpState::Unknown if syn && !ack => TcpState::SynSent,
            TcpState::SynSent if syn && ack => TcpState::SynReceived,
            TcpState::SynReceived if ack => TcpState::Established,
            TcpState::Established if fin => TcpState::FinWait,
            TcpState::Established if rst => TcpState::Closed,
            TcpState::FinWait if fin || rst => TcpState::Closed,
            state => state,
        }
    }
}

/// Running sample statistics (Welford's online algorithm).
///
/// Keeps count, sum, mean, min, max, and the second central moment in
/// constant space; the sample standard deviation is Bessel-corrected
/// and 0 when fewer than two samples were seen.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleStats {
    count: u64,
    sum: f64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl SampleStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        if self.count == 1 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.mean }
    }

    /// Sample variance (Bessel-corrected), 0 when count < 2.
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.min }
    }

    pub fn max(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.max }
    }

    /// Pooled statistics over two disjoint sample streams, equivalent
    /// to having pushed every sample into one accumulator.
    pub fn merged(a: &SampleStats, b: &SampleStats) -> SampleStats {
        if a.count == 0 {
            return *b;
        }
        if b.count == 0 {
            return *a;
        }
        let count = a.count + b.count;
        let delta = b.mean - a.mean;
        let mean = a.mean + delta * (b.count as f64 / count as f64);
        let m2 = a.m2 + b.m2 + delta * delta * (a.count as f64 * b.count as f64 / count as f64);
        SampleStats {
            count,
            sum: a.sum + b.sum,
            mean,
            m2,
            min: a.min.min(b.min),
            max: a.max.max(b.max),
        }
    }
}

/// Whole-flow TCP flag totals.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagCounts {
    pub fin: u64,
    pub syn: u64,
    pub rst: u64,
    pub psh: u64,
    pub ack: u64,
    pub urg: u64,
    pub cwr: u64,
    pub ece: u64,
}

impl FlagCounts {
    fn record(&mut self, flags: u8) {
        if flags & tcp_flags::FIN != 0 {
            self.fin += 1;
        }
        if flags & tcp_flags::SYN != 0 {
            self.syn += 1;
        }
        if flags & tcp_flags::RST != 0 {
            self.rst += 1;
        }
        if flags & tcp_flags::PSH != 0 {
            self.psh += 1;
        }
        if flags & tcp_flags::ACK != 0 {
            self.ack += 1;
        }
        if flags & tcp_flags::URG != 0 {
            self.urg += 1;
        }
        if flags & tcp_flags::CWR != 0 {
            self.cwr += 1;
        }
        if flags & tcp_flags::ECE != 0 {
            self.ece += 1;
        }
    }
}

/// Counters for one direction of a flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectionStats {
    pub packets: u64,
    /// Raw frame bytes, headers included.
    pub bytes: u64,
    /// Link + network + transport header bytes.
    pub header_bytes: u64,
    /// Packets carrying at least one payload byte.
    pub payload_packets: u64,
    pub pkt_len: SampleStats,
    pub iat: SampleStats,
    pub psh_count: u64,
    pub urg_count: u64,
    /// TCP window of the first packet seen in this direction.
    pub init_window: Option<u16>,
    /// Smallest transport header observed in this direction.
    pub min_header_len: Option<usize>,
    last_seen: Option<f64>,
}

impl DirectionStats {
    fn record(&mut self, packet: &ParsedPacket<'_>) {
        if let Some(prev) = self.last_seen {
            self.iat.push(packet.ts - prev);
        }
        self.last_seen = Some(packet.ts);

        self.packets += 1;
        self.bytes += packet.frame_len as u64;
        self.header_bytes += packet.header_len() as u64;
        self.pkt_len.push(packet.frame_len as f64);
        if !packet.payload.is_empty() {
            self.payload_packets += 1;
        }

        if let Transport::Tcp(tcp) = packet.transport {
            if self.init_window.is_none() {
                self.init_window = Some(tcp.window);
            }
            let header_len = tcp.header_len();
            self.min_header_len = Some(match self.min_header_len {
                Some(current) => current.min(header_len),
                None => header_len,
            });
            if tcp.flags & tcp_flags::PSH != 0 {
                self.psh_count += 1;
            }
            if tcp.flags & tcp_flags::URG != 0 {
                self.urg_count += 1;
            }
        }
    }
}

/// Full per-connection record owned by the tracker.
#[derive(Debug, Clone)]
pub struct FlowStats {
    pub key: FlowKey,
    /// Source endpoint of the first observed packet; defines forward.
    pub initiator: Endpoint,
    pub responder: Endpoint,
    pub start_time: f64,
    pub last_seen: f64,
    pub state: TcpState,
    pub fwd: DirectionStats,
    pub bwd: DirectionStats,
    /// Inter-arrival times across both directions in arrival order.
    pub flow_iat: SampleStats,
    pub flags: FlagCounts,
    pub active: SampleStats,
    pub idle: SampleStats,
    active_start: f64,
}

impl FlowStats {
    pub fn new(key: FlowKey, initiator: Endpoint, responder: Endpoint, ts: f64) -> Self {
        Self {
            key,
            initiator,
            responder,
            start_time: ts,
            last_seen: ts,
            state: TcpState::Unknown,
            fwd: DirectionStats::default(),
            bwd: DirectionStats::default(),
            flow_iat: SampleStats::default(),
            flags: FlagCounts::default(),
            active: SampleStats::default(),
            idle: SampleStats::default(),
            active_start: ts,
        }
    }

    pub fn direction_of(&self, src: Endpoint) -> Direction {
        if src == self.initiator {
            Direction::Forward
        } else {
            Direction::Backward
        }
    }

    /// Fold one packet into the flow. The caller has already matched the
    /// packet to this flow's key.
    pub fn record(&mut self, direction: Direction, packet: &ParsedPacket<'_>) {
        let is_first = self.fwd.packets == 0 && self.bwd.packets == 0;
        if !is_first {
            let gap = packet.ts - self.last_seen;
            self.flow_iat.push(gap);
            if gap > ACTIVITY_GAP_SECS {
                if self.last_seen > self.active_start {
                    self.active.push(self.last_seen - self.active_start);
                }
                self.idle.push(gap);
                self.active_start = packet.ts;
            }
        }

        match direction {
            Direction::Forward => self.fwd.record(packet),
            Direction::Backward => self.bwd.record(packet),
        }

        if let Transport::Tcp(tcp) = packet.transport {
            self.flags.record(tcp.flags);
            self.state = self.state.advance(tcp.flags);
        }

        self.last_seen = packet.ts;
    }

    /// Flow duration in seconds.
    pub fn duration(&self) -> f64 {
        self.last_seen - self.start_time
    }

    pub fn total_packets(&self) -> u64 {
        self.fwd.packets + self.bwd.packets
    }

    pub fn total_bytes(&self) -> u64 {
        self.fwd.bytes + self.bwd.bytes
    }

    /// Expired when idle past `timeout_secs` or closed.
    pub fn is_expired(&self, now: f64, timeout_secs: f64) -> bool {
        self.state == TcpState::Closed || now - self.last_seen > timeout_secs
    }
}
