pub mod error;
pub mod layout;
mod parser;
mod reader;

pub use parser::{
    EthernetHeader, Ipv4Header, PacketParser, ParsedPacket, TcpHeader, Transport, UdpHeader,
    parse_frame,
};
