//! The capture pipeline.
//!
//! A single task owns the parser, decoders, flow tracker, feature
//! extractor, and rule engine; the publisher and the alert sink run on
//! their own threads behind bounded, lossy-on-overflow queues. Nothing
//! in the per-frame path takes a lock, and no data-dependent error ever
//! aborts the run: only startup failures are fatal.

use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, TrySendError, bounded};
use thiserror::Error;

use crate::alert::{Alert, AlertSink};
use crate::config::EngineConfig;
use crate::features::{FeatureCsvWriter, extract_features};
use crate::protocols::dns::decode_dns;
use crate::protocols::http::decode_http;
use crate::protocols::packet::{PacketParser, ParsedPacket, Transport};
use crate::publish::{FeaturePublisher, PublishError};
use crate::rules::RuleEngine;
use crate::shutdown::ShutdownFlag;
use crate::source::{FrameSource, SourceError};
use crate::stats::Statistics;
use crate::tracker::ConnectionTracker;

const HTTP_PORTS: [u16; 2] = [80, 8080];
const DNS_PORT: u16 = 53;

/// Capacity of the alert hand-off queue.
const ALERT_QUEUE_DEPTH: usize = 1024;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error("cannot open alert log: {0}")]
    AlertLog(std::io::Error),
    #[error("cannot create feature CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Final accounting returned by a pipeline run.
#[derive(Debug)]
pub struct PipelineReport {
    pub stats: Statistics,
    /// Flows still resident when the run ended.
    pub active_flows: usize,
}

/// Drive the pipeline until end of stream or shutdown.
///
/// On shutdown the current frame's outputs are drained, the publisher
/// and alert queues are flushed, and the final statistics are returned.
pub fn run_pipeline<S: FrameSource>(
    mut source: S,
    config: &EngineConfig,
    shutdown: &ShutdownFlag,
) -> Result<PipelineReport, PipelineError> {
    let mut stats = Statistics::new();
    let mut parser = PacketParser::new();
    let mut tracker = config
        .track_connections
        .then(|| ConnectionTracker::new(config.flow_timeout_secs, config.max_connections));
    let mut rule_engine = config.evaluate_rules.then(RuleEngine::with_default_rules);

    let mut csv_writer = match &config.features_csv {
        Some(path) => Some(FeatureCsvWriter::create(path)?),
        None => None,
    };
    let mut publisher = match &config.publish_endpoint {
        Some(endpoint) => Some(FeaturePublisher::bind(
            endpoint,
            config.publish_high_water_mark,
            shutdown.clone(),
        )?),
        None => None,
    };

    let sink = AlertSink::open(config.alert_log.as_deref()).map_err(PipelineError::AlertLog)?;
    let (alert_tx, alert_thread) = spawn_alert_sink(sink);

    let stats_interval = Duration::from_secs_f64(config.stats_interval_secs.max(0.1));
    let mut next_stats_tick = Instant::now() + stats_interval;

    while !shutdown.is_set() {
        if config.periodic_stats && Instant::now() >= next_stats_tick {
            println!("{}", stats.render());
            next_stats_tick = Instant::now() + stats_interval;
        }

        let Some(frame) = source.next_frame()? else {
            break;
        };

        let packet = match parser.parse(frame.ts, &frame.data) {
            Ok(packet) => packet,
            Err(err) => {
                log::debug!("parse error: {err}");
                stats.parse_errors += 1;
                continue;
            }
        };

        stats.record_packet(packet.ts, packet.ipv4.protocol, packet.frame_len);

        if config.decode_protocols {
            decode_application(&packet, &mut stats);
        }

        if let Some(tracker) = tracker.as_mut() {
            if let Some(flow) = tracker.update(&packet) {
                if config.extract_features {
                    let features = extract_features(flow);
                    stats.features_published += 1;
                    if let Some(publisher) = publisher.as_mut() {
                        match serde_json::to_string(&features) {
                            Ok(json) => publisher.publish(json),
                            Err(err) => log::warn!("feature serialization failed: {err}"),
                        }
                    }
                    if let Some(writer) = csv_writer.as_mut() {
                        if let Err(err) = writer.write(&features) {
                            log::warn!("feature CSV write failed: {err}");
                        }
                    }
                }
            }
            tracker.maybe_sweep(packet.ts);
        }

        if let Some(engine) = rule_engine.as_mut() {
            for alert in engine.evaluate(&packet) {
                stats.record_alert(alert.severity);
                match alert_tx.try_send(alert) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => stats.alerts_dropped += 1,
                    Err(TrySendError::Disconnected(_)) => {}
                }
            }
        }
    }

    // Let the publisher drain, then stop its threads.
    shutdown.trigger();

    if let Some(tracker) = tracker.as_ref() {
        stats.flows_created = tracker.flows_created();
        stats.flows_expired = tracker.flows_expired();
        stats.flows_dropped = tracker.flows_dropped();
    }

    if let Some(writer) = csv_writer.as_mut() {
        if let Err(err) = writer.flush() {
            log::warn!("feature CSV flush failed: {err}");
        }
    }
    if let Some(publisher) = publisher {
        stats.features_dropped = publisher.overflow();
        publisher.join();
    }

    drop(alert_tx);
    let _ = alert_thread.join();

    let active_flows = tracker.as_ref().map(ConnectionTracker::len).unwrap_or(0);
    Ok(PipelineReport {
        stats,
        active_flows,
    })
}

fn spawn_alert_sink(mut sink: AlertSink) -> (Sender<Alert>, std::thread::JoinHandle<()>) {
    let (tx, rx) = bounded::<Alert>(ALERT_QUEUE_DEPTH);
    let handle = std::thread::spawn(move || {
        for alert in rx {
            sink.write(&alert);
        }
    });
    (tx, handle)
}

/// Dispatch the application decoders on well-known ports.
fn decode_application(packet: &ParsedPacket<'_>, stats: &mut Statistics) {
    if packet.payload.is_empty() {
        return;
    }
    match packet.transport {
        Transport::Tcp(tcp)
            if HTTP_PORTS.contains(&tcp.dst_port) || HTTP_PORTS.contains(&tcp.src_port) =>
        {
            match decode_http(packet.payload) {
                Ok(Some(message)) => {
                    stats.http_messages += 1;
                    log::debug!(
                        "http {:?} {} {}",
                        message.kind,
                        message.method,
                        message.uri
                    );
                }
                Ok(None) => {}
                Err(err) => {
                    log::debug!("http decode error: {err}");
                    stats.decode_errors += 1;
                }
            }
        }
        Transport::Udp(udp) if udp.dst_port == DNS_PORT || udp.src_port == DNS_PORT => {
            match decode_dns(packet.payload) {
                Ok(message) => {
                    stats.dns_messages += 1;
                    log::debug!(
                        "dns {} qname={}",
                        if message.is_response { "response" } else { "query" },
                        message.query_name
                    );
                }
                Err(err) => {
                    log::debug!("dns decode error: {err}");
                    stats.decode_errors += 1;
                }
            }
        }
        _ => {}
    }
}
