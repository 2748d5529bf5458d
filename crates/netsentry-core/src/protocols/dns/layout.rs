pub const HEADER_LEN: usize = 12;

pub const TRANSACTION_ID_RANGE: std::ops::Range<usize> = 0..2;
pub const FLAGS_RANGE: std::ops::Range<usize> = 2..4;
pub const QDCOUNT_RANGE: std::ops::Range<usize> = 4..6;
pub const ANCOUNT_RANGE: std::ops::Range<usize> = 6..8;
pub const NSCOUNT_RANGE: std::ops::Range<usize> = 8..10;
pub const ARCOUNT_RANGE: std::ops::Range<usize> = 10..12;

/// QR bit: query (0) or response (1).
pub const QR_MASK: u16 = 0x8000;

/// Leading bits `11` in a label length octet mark a compression pointer.
pub const POINTER_TAG: u8 = 0xc0;
/// Mask extracting the 14-bit pointer offset from the two pointer octets.
pub const POINTER_OFFSET_MASK: u16 = 0x3fff;

/// Upper bound on compression-pointer hops while decoding one name.
pub const MAX_POINTER_HOPS: usize = 128;

/// Maximum presentation length of a decoded name.
pub const MAX_NAME_LEN: usize = 255;
