//! Frame sources for the capture pipeline.
//!
//! Sources abstract capture inputs (pcap/pcapng files and live
//! interfaces) and keep I/O separate from protocol parsing. A
//! `FrameSource` yields raw link-layer frames in capture order with
//! capture timestamps; the two concrete sources share one pull contract
//! so the pipeline never branches on the capture mode.

mod live;
pub(crate) mod pcap;

pub use live::LiveSource;
pub use pcap::PcapFileSource;

use thiserror::Error;

/// Raw Ethernet frame emitted by a `FrameSource`.
///
/// The frame buffer is owned by the event and is only meaningful until
/// the next pull; parsed views borrow from it.
///
/// # Examples
/// ```
/// use netsentry_core::Frame;
///
/// let frame = Frame {
///     ts: 1.0,
///     data: vec![0xde, 0xad, 0xbe, 0xef],
/// };
/// assert_eq!(frame.data.len(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct Frame {
    /// Capture timestamp in seconds since the Unix epoch (µs resolution).
    pub ts: f64,
    /// Raw frame bytes starting at the Ethernet header.
    pub data: Vec<u8>,
}

/// Abstract frame source for the capture pipeline.
///
/// `Ok(None)` is the end-of-stream sentinel: end of file for offline
/// sources, cancellation for live ones.
///
/// # Examples
/// ```
/// use netsentry_core::{Frame, FrameSource, SourceError};
///
/// struct OneFrame(bool);
///
/// impl FrameSource for OneFrame {
///     fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
///         if self.0 {
///             return Ok(None);
///         }
///         self.0 = true;
///         Ok(Some(Frame {
///             ts: 0.0,
///             data: vec![0u8; 60],
///         }))
///     }
/// }
/// ```
pub trait FrameSource {
    /// Returns the next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;
}

/// Errors produced by `FrameSource` implementations.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("capture file error: {0}")]
    Pcap(String),
    #[error("live capture error on {interface}: {message}")]
    Capture { interface: String, message: String },
}

impl From<pcap::error::PcapSourceError> for SourceError {
    fn from(value: pcap::error::PcapSourceError) -> Self {
        match value {
            pcap::error::PcapSourceError::Io(err) => SourceError::Io(err),
            pcap::error::PcapSourceError::Pcap { context, message } => {
                SourceError::Pcap(format!("{context}: {message}"))
            }
        }
    }
}
