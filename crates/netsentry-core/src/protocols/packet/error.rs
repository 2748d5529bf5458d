use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by the link/network/transport parser.
pub enum PacketError {
    #[error("frame too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("unsupported ethertype: 0x{ethertype:04x}")]
    UnsupportedEthertype { ethertype: u16 },
    #[error("unsupported IP version: {version}")]
    UnsupportedIpVersion { version: u8 },
    #[error("invalid IPv4 header length: {length} bytes")]
    InvalidIpHeaderLength { length: usize },
    #[error("invalid TCP data offset: {length} bytes")]
    InvalidTcpDataOffset { length: usize },
}
