use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by DNS decoding.
pub enum DnsError {
    #[error("message too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("compression pointer out of bounds: offset {offset}")]
    BadPointer { offset: usize },
    #[error("compression pointer chain exceeds {max} hops")]
    PointerLoop { max: usize },
    #[error("decoded name exceeds {max} octets")]
    NameTooLong { max: usize },
}
