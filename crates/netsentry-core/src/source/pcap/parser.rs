use std::fs::File;
use std::path::Path;

use pcap_parser::{
    Block, LegacyPcapReader, Linktype, PcapBlockOwned, PcapNGReader, traits::PcapReaderIterator,
};

use crate::source::{Frame, FrameSource, SourceError};

use super::error::PcapSourceError;
use super::layout;
use super::reader::{
    is_pcapng_magic, linktype_for_interface, pcapng_ts_to_seconds, read_magic_and_rewind,
};

/// Frame source backed by a PCAP or PCAPNG capture file.
///
/// Frames are yielded in file order with their original capture
/// timestamps. Only Ethernet-linktype packets are yielded; blocks from
/// other interfaces are skipped with a debug log.
///
/// # Examples
/// ```no_run
/// use netsentry_core::{FrameSource, PcapFileSource};
/// use std::path::Path;
///
/// let mut source = PcapFileSource::open(Path::new("capture.pcap"))?;
/// # let _ = source.next_frame();
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct PcapFileSource {
    inner: PcapReader,
}

enum PcapReader {
    Legacy {
        reader: LegacyPcapReader<File>,
        linktype: Option<Linktype>,
    },
    Ng {
        reader: PcapNGReader<File>,
        linktypes: Vec<Linktype>,
    },
}

impl PcapFileSource {
    /// Open a PCAP or PCAPNG file as a frame source.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path).map_err(SourceError::from)?;
        let inner = create_reader(file).map_err(SourceError::from)?;
        Ok(Self { inner })
    }
}

impl FrameSource for PcapFileSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        next_frame(&mut self.inner).map_err(SourceError::from)
    }
}

fn create_reader(file: File) -> Result<PcapReader, PcapSourceError> {
    let mut file = file;
    let magic = read_magic_and_rewind(&mut file)?;

    if is_pcapng_magic(&magic) {
        let reader = PcapNGReader::new(layout::PCAP_READER_BUFFER_SIZE, file).map_err(|e| {
            PcapSourceError::Pcap {
                context: "pcapng reader init",
                message: e.to_string(),
            }
        })?;
        Ok(PcapReader::Ng {
            reader,
            linktypes: Vec::new(),
        })
    } else {
        let reader = LegacyPcapReader::new(layout::PCAP_READER_BUFFER_SIZE, file).map_err(|e| {
            PcapSourceError::Pcap {
                context: "pcap reader init",
                message: e.to_string(),
            }
        })?;
        Ok(PcapReader::Legacy {
            reader,
            linktype: None,
        })
    }
}

fn next_frame(reader: &mut PcapReader) -> Result<Option<Frame>, PcapSourceError> {
    loop {
        match reader {
            PcapReader::Legacy { reader, linktype } => match reader.next() {
                Ok((offset, block)) => {
                    let frame = match block {
                        PcapBlockOwned::LegacyHeader(header) => {
                            *linktype = Some(header.network);
                            None
                        }
                        PcapBlockOwned::Legacy(packet) => {
                            let lt = linktype.unwrap_or(Linktype::ETHERNET);
                            if lt == Linktype::ETHERNET {
                                let ts = packet.ts_sec as f64 + (packet.ts_usec as f64 * 1e-6);
                                Some(Frame {
                                    ts,
                                    data: packet.data.to_vec(),
                                })
                            } else {
                                log::debug!("skipping non-Ethernet packet (linktype {:?})", lt);
                                None
                            }
                        }
                        _ => None,
                    };
                    reader.consume(offset);
                    if frame.is_some() {
                        return Ok(frame);
                    }
                }
                Err(pcap_parser::PcapError::Eof) => return Ok(None),
                Err(pcap_parser::PcapError::Incomplete(_)) => {
                    reader.refill().map_err(|e| PcapSourceError::Pcap {
                        context: "pcap reader refill",
                        message: e.to_string(),
                    })?;
                }
                Err(e) => {
                    return Err(PcapSourceError::Pcap {
                        context: "pcap reader next",
                        message: e.to_string(),
                    });
                }
            },
            PcapReader::Ng { reader, linktypes } => match reader.next() {
                Ok((offset, block)) => {
                    let frame = match block {
                        PcapBlockOwned::NG(Block::InterfaceDescription(intf)) => {
                            linktypes.push(intf.linktype);
                            None
                        }
                        PcapBlockOwned::NG(Block::EnhancedPacket(packet)) => {
                            let lt = linktype_for_interface(linktypes, packet.if_id);
                            if lt == Linktype::ETHERNET {
                                let ts = pcapng_ts_to_seconds(packet.ts_high, packet.ts_low);
                                Some(Frame {
                                    ts,
                                    data: packet.data.to_vec(),
                                })
                            } else {
                                log::debug!("skipping non-Ethernet packet (linktype {:?})", lt);
                                None
                            }
                        }
                        _ => None,
                    };
                    reader.consume(offset);
                    if frame.is_some() {
                        return Ok(frame);
                    }
                }
                Err(pcap_parser::PcapError::Eof) => return Ok(None),
                Err(pcap_parser::PcapError::Incomplete(_)) => {
                    reader.refill().map_err(|e| PcapSourceError::Pcap {
                        context: "pcapng reader refill",
                        message: e.to_string(),
                    })?;
                }
                Err(e) => {
                    return Err(PcapSourceError::Pcap {
                        context: "pcapng reader next",
                        message: e.to_string(),
                    });
                }
            },
        }
    }
}
