//! netsentry core engine: capture, decode, track, extract, match.
//!
//! This crate exposes the intrusion-detection pipeline used by the CLI
//! and tests: frame sources feed a single-owner pipeline task that
//! parses link/network/transport headers (layout/reader/parser),
//! optionally decodes HTTP and DNS, maintains bidirectional flow state
//! under a bounded memory budget, computes a fixed-schema feature
//! vector per flow, and matches every packet against the signature rule
//! set. Feature vectors go out over a lossy bounded queue to a TCP
//! pub/sub socket; alerts go to a colored console line and an
//! append-only JSONL file.
//!
//! Key guarantees:
//! - The per-frame path never aborts on a data-dependent error; only
//!   startup failures (bad interface, missing file, unbindable
//!   endpoint, unopenable alert log) are fatal.
//! - Within one flow, feature publications and alerts appear in
//!   packet-arrival order.
//! - Packet ids and alert ids are strictly monotone for the engine's
//!   lifetime.
//!
//! # Examples
//! ```no_run
//! use std::path::Path;
//!
//! use netsentry_core::{EngineConfig, PcapFileSource, ShutdownFlag, run_pipeline};
//!
//! let source = PcapFileSource::open(Path::new("capture.pcap"))?;
//! let shutdown = ShutdownFlag::new();
//! let report = run_pipeline(source, &EngineConfig::default(), &shutdown)?;
//! println!("{}", report.stats.render());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod alert;
mod config;
mod features;
mod flow;
mod pipeline;
mod protocols;
mod publish;
mod rules;
mod shutdown;
mod source;
mod stats;
mod tracker;

pub use alert::{Alert, AlertSink};
pub use config::EngineConfig;
pub use features::{
    FEATURE_COUNT, FEATURE_NAMES, FeatureCsvWriter, FeatureVector, extract_features,
};
pub use flow::{
    ACTIVITY_GAP_SECS, Direction, DirectionStats, Endpoint, FlagCounts, FlowKey, FlowStats,
    SampleStats, TcpState,
};
pub use pipeline::{PipelineError, PipelineReport, run_pipeline};
pub use protocols::dns::error::DnsError;
pub use protocols::dns::{DnsMessage, decode_dns};
pub use protocols::http::error::HttpError;
pub use protocols::http::{HttpKind, HttpMessage, decode_http};
pub use protocols::packet::{
    EthernetHeader, Ipv4Header, PacketParser, ParsedPacket, TcpHeader, Transport, UdpHeader,
    parse_frame,
};
pub use protocols::packet::error::PacketError;
pub use protocols::packet::layout::tcp_flags;
pub use publish::{DEFAULT_ENDPOINT, DEFAULT_HIGH_WATER_MARK, FeaturePublisher, PublishError};
pub use rules::{
    IpFilter, ProtocolFilter, RuleAction, RuleEngine, Severity, SignatureRule, default_rules,
};
pub use shutdown::ShutdownFlag;
pub use source::{Frame, FrameSource, LiveSource, PcapFileSource, SourceError};
pub use stats::Statistics;
pub use tracker::{
    ConnectionTracker, DEFAULT_FLOW_TIMEOUT_SECS, DEFAULT_MAX_CONNECTIONS,
    DEFAULT_SWEEP_INTERVAL_SECS,
};
