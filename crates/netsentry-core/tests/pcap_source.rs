//! Offline capture source behaviors over generated fixtures.

use std::fs;
use std::path::Path;

use etherparse::PacketBuilder;
use netsentry_core::{FrameSource, PcapFileSource, SourceError};

/// Minimal legacy-pcap writer: global header plus one record per frame.
fn write_legacy_pcap(path: &Path, frames: &[(f64, Vec<u8>)]) {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0xa1b2_c3d4u32.to_le_bytes()); // magic
    bytes.extend_from_slice(&2u16.to_le_bytes()); // major
    bytes.extend_from_slice(&4u16.to_le_bytes()); // minor
    bytes.extend_from_slice(&0i32.to_le_bytes()); // thiszone
    bytes.extend_from_slice(&0u32.to_le_bytes()); // sigfigs
    bytes.extend_from_slice(&65_535u32.to_le_bytes()); // snaplen
    bytes.extend_from_slice(&1u32.to_le_bytes()); // linktype: Ethernet

    for (ts, data) in frames {
        let secs = ts.trunc() as u32;
        let micros = ((ts - ts.trunc()) * 1e6).round() as u32;
        bytes.extend_from_slice(&secs.to_le_bytes());
        bytes.extend_from_slice(&micros.to_le_bytes());
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(data);
    }

    fs::write(path, bytes).unwrap();
}

fn udp_frame(payload: &[u8]) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2([1, 1, 1, 1, 1, 1], [2, 2, 2, 2, 2, 2])
        .ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
        .udp(4000, 53);
    let mut frame = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut frame, payload).unwrap();
    frame
}

#[test]
fn pcap_source_reads_frames_in_order_with_timestamps() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.pcap");
    write_legacy_pcap(
        &path,
        &[
            (1.0, udp_frame(b"one")),
            (1.5, udp_frame(b"two")),
            (2.25, udp_frame(b"three")),
        ],
    );

    let mut source = PcapFileSource::open(&path).unwrap();
    let mut timestamps = Vec::new();
    while let Some(frame) = source.next_frame().unwrap() {
        timestamps.push(frame.ts);
        assert!(!frame.data.is_empty());
    }

    assert_eq!(timestamps.len(), 3);
    assert!((timestamps[0] - 1.0).abs() < 1e-6);
    assert!((timestamps[1] - 1.5).abs() < 1e-6);
    assert!((timestamps[2] - 2.25).abs() < 1e-6);
}

#[test]
fn missing_file_is_an_io_error() {
    let err = match PcapFileSource::open(Path::new("/nonexistent/capture.pcap")) {
        Ok(_) => panic!("expected missing file to be rejected"),
        Err(err) => err,
    };
    assert!(matches!(err, SourceError::Io(_)));
}

#[test]
fn truncated_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truncated.pcapng");
    fs::write(&path, [0x0a, 0x0d, 0x0d]).unwrap();

    let err = match PcapFileSource::open(&path) {
        Ok(_) => panic!("expected truncated file to be rejected"),
        Err(err) => err,
    };
    assert!(matches!(err, SourceError::Io(_)));
}
