use std::net::Ipv4Addr;

use super::error::PacketError;
use super::layout;
use super::reader::LayerReader;

/// Ethernet II header fields.
#[derive(Debug, Clone, Copy)]
pub struct EthernetHeader {
    pub dst_mac: [u8; 6],
    pub src_mac: [u8; 6],
    pub ethertype: u16,
}

/// IPv4 header fields, addresses kept in network representation.
#[derive(Debug, Clone, Copy)]
pub struct Ipv4Header {
    pub version_ihl: u8,
    pub tos: u8,
    pub total_length: u16,
    pub identification: u16,
    pub flags_fragment: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
}

impl Ipv4Header {
    pub fn version(&self) -> u8 {
        self.version_ihl >> 4
    }

    pub fn header_len(&self) -> usize {
        ((self.version_ihl & 0x0f) as usize) * 4
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TcpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub ack: u32,
    pub data_offset: u8,
    pub flags: u8,
    pub window: u16,
    pub checksum: u16,
    pub urgent: u16,
}

impl TcpHeader {
    pub fn header_len(&self) -> usize {
        (self.data_offset as usize) * 4
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UdpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub length: u16,
    pub checksum: u16,
}

/// Transport layer of a parsed packet. IP protocols other than TCP and
/// UDP still count for statistics but carry no transport fields.
#[derive(Debug, Clone, Copy)]
pub enum Transport {
    Tcp(TcpHeader),
    Udp(UdpHeader),
    Other,
}

/// Structured, zero-copy view over one captured frame.
///
/// The payload borrows from the frame buffer; the view must not outlive
/// the pipeline iteration that produced it.
#[derive(Debug)]
pub struct ParsedPacket<'a> {
    pub packet_id: u64,
    /// Capture timestamp in seconds since the Unix epoch.
    pub ts: f64,
    /// Raw frame length on the wire.
    pub frame_len: usize,
    pub ethernet: EthernetHeader,
    pub ipv4: Ipv4Header,
    pub transport: Transport,
    pub payload: &'a [u8],
}

impl<'a> ParsedPacket<'a> {
    /// Source address in dotted-quad form. Conversion is on demand;
    /// nothing in the hot path pays for the string.
    pub fn src_ip(&self) -> String {
        self.ipv4.src.to_string()
    }

    pub fn dst_ip(&self) -> String {
        self.ipv4.dst.to_string()
    }

    /// Source port, 0 for transports without ports.
    pub fn src_port(&self) -> u16 {
        match self.transport {
            Transport::Tcp(ref tcp) => tcp.src_port,
            Transport::Udp(ref udp) => udp.src_port,
            Transport::Other => 0,
        }
    }

    pub fn dst_port(&self) -> u16 {
        match self.transport {
            Transport::Tcp(ref tcp) => tcp.dst_port,
            Transport::Udp(ref udp) => udp.dst_port,
            Transport::Other => 0,
        }
    }

    pub fn transport_name(&self) -> &'static str {
        match self.transport {
            Transport::Tcp(_) => "TCP",
            Transport::Udp(_) => "UDP",
            Transport::Other => "OTHER",
        }
    }

    pub fn tcp(&self) -> Option<&TcpHeader> {
        match self.transport {
            Transport::Tcp(ref tcp) => Some(tcp),
            _ => None,
        }
    }

    /// Link + network + transport header bytes for this packet.
    pub fn header_len(&self) -> usize {
        let transport = match self.transport {
            Transport::Tcp(ref tcp) => tcp.header_len(),
            Transport::Udp(_) => layout::UDP_HEADER_LEN,
            Transport::Other => 0,
        };
        layout::ETHERNET_HEADER_LEN + self.ipv4.header_len() + transport
    }
}

/// Parse one Ethernet/IPv4 frame into a structured view.
///
/// Strict field extraction: no copies, no allocation. Frames that are
/// not IPv4-over-Ethernet, or whose headers are truncated, are rejected
/// with a parse error.
pub fn parse_frame(ts: f64, data: &[u8]) -> Result<ParsedPacket<'_>, PacketError> {
    let frame = LayerReader::new(data);
    frame.require_len(layout::MIN_FRAME_LEN)?;

    let ethernet = parse_ethernet(&frame)?;
    if ethernet.ethertype != layout::ETHERTYPE_IPV4 {
        return Err(PacketError::UnsupportedEthertype {
            ethertype: ethernet.ethertype,
        });
    }

    let ip_bytes = frame.tail(layout::ETHERNET_HEADER_LEN)?;
    let ip = LayerReader::new(ip_bytes);
    let ipv4 = parse_ipv4(&ip)?;

    let ip_header_len = ipv4.header_len();
    if ip_header_len < layout::IPV4_MIN_HEADER_LEN {
        return Err(PacketError::InvalidIpHeaderLength {
            length: ip_header_len,
        });
    }
    ip.require_len(ip_header_len)?;

    let transport_bytes = ip.tail(ip_header_len)?;
    let (transport, payload) = match ipv4.protocol {
        layout::IP_PROTO_TCP => parse_tcp(transport_bytes)?,
        layout::IP_PROTO_UDP => parse_udp(transport_bytes)?,
        _ => (Transport::Other, &transport_bytes[..0]),
    };

    Ok(ParsedPacket {
        packet_id: 0,
        ts,
        frame_len: data.len(),
        ethernet,
        ipv4,
        transport,
        payload,
    })
}

fn parse_ethernet(frame: &LayerReader<'_>) -> Result<EthernetHeader, PacketError> {
    let dst = frame.read_slice(layout::DST_MAC_RANGE)?;
    let src = frame.read_slice(layout::SRC_MAC_RANGE)?;
    let mut dst_mac = [0u8; 6];
    let mut src_mac = [0u8; 6];
    dst_mac.copy_from_slice(dst);
    src_mac.copy_from_slice(src);

    Ok(EthernetHeader {
        dst_mac,
        src_mac,
        ethertype: frame.read_u16_be(layout::ETHERTYPE_RANGE)?,
    })
}

fn parse_ipv4(ip: &LayerReader<'_>) -> Result<Ipv4Header, PacketError> {
    ip.require_len(layout::IPV4_MIN_HEADER_LEN)?;

    let version_ihl = ip.read_u8(layout::VERSION_IHL_OFFSET)?;
    let version = version_ihl >> 4;
    if version != 4 {
        return Err(PacketError::UnsupportedIpVersion { version });
    }

    let src = ip.read_slice(layout::SRC_ADDR_RANGE)?;
    let dst = ip.read_slice(layout::DST_ADDR_RANGE)?;

    Ok(Ipv4Header {
        version_ihl,
        tos: ip.read_u8(layout::TOS_OFFSET)?,
        total_length: ip.read_u16_be(layout::TOTAL_LENGTH_RANGE)?,
        identification: ip.read_u16_be(layout::IDENTIFICATION_RANGE)?,
        flags_fragment: ip.read_u16_be(layout::FLAGS_FRAGMENT_RANGE)?,
        ttl: ip.read_u8(layout::TTL_OFFSET)?,
        protocol: ip.read_u8(layout::PROTOCOL_OFFSET)?,
        checksum: ip.read_u16_be(layout::IP_CHECKSUM_RANGE)?,
        src: Ipv4Addr::new(src[0], src[1], src[2], src[3]),
        dst: Ipv4Addr::new(dst[0], dst[1], dst[2], dst[3]),
    })
}

fn parse_tcp(bytes: &[u8]) -> Result<(Transport, &[u8]), PacketError> {
    let tcp = LayerReader::new(bytes);
    tcp.require_len(layout::TCP_MIN_HEADER_LEN)?;

    let data_offset = tcp.read_u8(layout::TCP_DATA_OFFSET_OFFSET)? >> 4;
    let header = TcpHeader {
        src_port: tcp.read_u16_be(layout::TCP_SRC_PORT_RANGE)?,
        dst_port: tcp.read_u16_be(layout::TCP_DST_PORT_RANGE)?,
        seq: tcp.read_u32_be(layout::TCP_SEQ_RANGE)?,
        ack: tcp.read_u32_be(layout::TCP_ACK_RANGE)?,
        data_offset,
        flags: tcp.read_u8(layout::TCP_FLAGS_OFFSET)?,
        window: tcp.read_u16_be(layout::TCP_WINDOW_RANGE)?,
        checksum: tcp.read_u16_be(layout::TCP_CHECKSUM_RANGE)?,
        urgent: tcp.read_u16_be(layout::TCP_URGENT_RANGE)?,
    };

    let header_len = header.header_len();
    if header_len < layout::TCP_MIN_HEADER_LEN {
        return Err(PacketError::InvalidTcpDataOffset { length: header_len });
    }
    let payload = tcp.tail(header_len.min(tcp.len()))?;

    Ok((Transport::Tcp(header), payload))
}

fn parse_udp(bytes: &[u8]) -> Result<(Transport, &[u8]), PacketError> {
    let udp = LayerReader::new(bytes);
    udp.require_len(layout::UDP_HEADER_LEN)?;

    let header = UdpHeader {
        src_port: udp.read_u16_be(layout::UDP_SRC_PORT_RANGE)?,
        dst_port: udp.read_u16_be(layout::UDP_DST_PORT_RANGE)?,
        length: udp.read_u16_be(layout::UDP_LENGTH_RANGE)?,
        checksum: udp.read_u16_be(layout::UDP_CHECKSUM_RANGE)?,
    };
    let payload = udp.tail(layout::UDP_HEADER_LEN)?;

    Ok((Transport::Udp(header), payload))
}

/// Stateful parser front-end: assigns monotone packet ids and keeps
/// parse counters.
#[derive(Debug, Default)]
pub struct PacketParser {
    next_packet_id: u64,
    parsed: u64,
    parse_errors: u64,
}

impl PacketParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a frame, assigning the next packet id on success.
    pub fn parse<'a>(&mut self, ts: f64, data: &'a [u8]) -> Result<ParsedPacket<'a>, PacketError> {
        match parse_frame(ts, data) {
            Ok(mut packet) => {
                self.next_packet_id += 1;
                packet.packet_id = self.next_packet_id;
                self.parsed += 1;
                Ok(packet)
            }
            Err(err) => {
                self.parse_errors += 1;
                Err(err)
            }
        }
    }

    pub fn parsed(&self) -> u64 {
        self.parsed
    }

    pub fn parse_errors(&self) -> u64 {
        self.parse_errors
    }
}
