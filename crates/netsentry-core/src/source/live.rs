use pcap::{Active, Capture};

use crate::shutdown::ShutdownFlag;
use crate::source::{Frame, FrameSource, SourceError};

/// Full-frame snapshot length for live captures.
const SNAPLEN: i32 = 65_535;

/// Read timeout in milliseconds. Bounds how long the pipeline can go
/// without observing the shutdown flag or a statistics tick.
const READ_TIMEOUT_MS: i32 = 100;

/// Frame source backed by a promiscuous live interface.
///
/// The capture handle reuses a kernel-provided buffer; the frame bytes
/// are copied out before the next poll. A pending pull observes the
/// shutdown flag within one read timeout and then reports end of
/// stream.
///
/// # Examples
/// ```no_run
/// use netsentry_core::{FrameSource, LiveSource, ShutdownFlag};
///
/// let shutdown = ShutdownFlag::new();
/// let mut source = LiveSource::open("eth0", shutdown)?;
/// # let _ = source.next_frame();
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct LiveSource {
    interface: String,
    capture: Capture<Active>,
    shutdown: ShutdownFlag,
}

impl LiveSource {
    /// Open a network interface for promiscuous capture.
    ///
    /// Unknown interfaces and missing capture privileges surface here
    /// as errors; both are fatal at startup.
    pub fn open(interface: &str, shutdown: ShutdownFlag) -> Result<Self, SourceError> {
        let capture = Capture::from_device(interface)
            .map_err(|e| capture_error(interface, &e))?
            .promisc(true)
            .snaplen(SNAPLEN)
            .timeout(READ_TIMEOUT_MS)
            .open()
            .map_err(|e| capture_error(interface, &e))?;

        Ok(Self {
            interface: interface.to_string(),
            capture,
            shutdown,
        })
    }
}

impl FrameSource for LiveSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        loop {
            if self.shutdown.is_set() {
                return Ok(None);
            }
            match self.capture.next_packet() {
                Ok(packet) => {
                    let ts = packet.header.ts.tv_sec as f64
                        + (packet.header.ts.tv_usec as f64 * 1e-6);
                    return Ok(Some(Frame {
                        ts,
                        data: packet.data.to_vec(),
                    }));
                }
                Err(pcap::Error::TimeoutExpired) => continue,
                Err(pcap::Error::NoMorePackets) => return Ok(None),
                Err(e) => {
                    log::warn!("read error on {}: {e}; frame skipped", self.interface);
                    continue;
                }
            }
        }
    }
}

fn capture_error(interface: &str, err: &pcap::Error) -> SourceError {
    SourceError::Capture {
        interface: interface.to_string(),
        message: err.to_string(),
    }
}
