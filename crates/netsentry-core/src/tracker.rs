//! Connection tracking.
//!
//! The tracker owns the flow table; nothing else mutates it. Capacity
//! is bounded: when the table is full an expiry sweep runs before the
//! insert, and if the sweep frees nothing the new flow is dropped and
//! counted rather than evicting live state.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::flow::{FlowKey, FlowStats};
use crate::protocols::packet::ParsedPacket;

pub const DEFAULT_FLOW_TIMEOUT_SECS: f64 = 120.0;
pub const DEFAULT_MAX_CONNECTIONS: usize = 100_000;
pub const DEFAULT_SWEEP_INTERVAL_SECS: f64 = 30.0;

/// Bidirectional flow table with idle expiry.
pub struct ConnectionTracker {
    flows: HashMap<FlowKey, FlowStats>,
    timeout_secs: f64,
    max_connections: usize,
    sweep_interval_secs: f64,
    last_sweep: Option<f64>,
    flows_created: u64,
    flows_expired: u64,
    flows_dropped: u64,
}

impl ConnectionTracker {
    pub fn new(timeout_secs: f64, max_connections: usize) -> Self {
        Self {
            flows: HashMap::new(),
            timeout_secs,
            max_connections,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            last_sweep: None,
            flows_created: 0,
            flows_expired: 0,
            flows_dropped: 0,
        }
    }

    /// Fold a parsed packet into its flow, creating the flow on first
    /// sight. Returns `None` when the table is full and no flow could
    /// be expired to make room.
    pub fn update(&mut self, packet: &ParsedPacket<'_>) -> Option<&FlowStats> {
        let (key, src) = FlowKey::from_packet(packet);

        // A flow retrieved after expiring is a new flow.
        if let Some(existing) = self.flows.get(&key) {
            if existing.is_expired(packet.ts, self.timeout_secs) {
                self.flows.remove(&key);
                self.flows_expired += 1;
            }
        }

        if !self.flows.contains_key(&key) && self.flows.len() >= self.max_connections {
            self.sweep(packet.ts);
            if self.flows.len() >= self.max_connections {
                self.flows_dropped += 1;
                return None;
            }
        }

        let flow = match self.flows.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let dst = crate::flow::Endpoint {
                    ip: packet.ipv4.dst,
                    port: packet.dst_port(),
                };
                self.flows_created += 1;
                entry.insert(FlowStats::new(key, src, dst, packet.ts))
            }
        };
        let direction = flow.direction_of(src);
        flow.record(direction, packet);
        Some(&*flow)
    }

    /// Remove every expired flow. Returns the number removed.
    pub fn sweep(&mut self, now: f64) -> usize {
        let timeout = self.timeout_secs;
        let before = self.flows.len();
        self.flows.retain(|_, flow| !flow.is_expired(now, timeout));
        let removed = before - self.flows.len();
        self.flows_expired += removed as u64;
        self.last_sweep = Some(now);
        removed
    }

    /// Run a sweep if the periodic interval has elapsed.
    pub fn maybe_sweep(&mut self, now: f64) {
        let due = match self.last_sweep {
            None => {
                self.last_sweep = Some(now);
                false
            }
            Some(last) => now - last >= self.sweep_interval_secs,
        };
        if due {
            self.sweep(now);
        }
    }

    pub fn get(&self, key: &FlowKey) -> Option<&FlowStats> {
        self.flows.get(key)
    }

    /// All live flows, unordered.
    pub fn get_all_flows(&self) -> impl Iterator<Item = &FlowStats> {
        self.flows.values()
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn flows_created(&self) -> u64 {
        self.flows_created
    }

    pub fn flows_expired(&self) -> u64 {
        self.flows_expired
    }

    pub fn flows_dropped(&self) -> u64 {
        self.flows_dropped
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new(DEFAULT_FLOW_TIMEOUT_SECS, DEFAULT_MAX_CONNECTIONS)
    }
}
