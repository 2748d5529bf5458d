use super::error::DnsError;
use super::layout;
use super::reader::DnsReader;

/// Decoded DNS header and first question.
///
/// Answer records are counted but not decoded.
#[derive(Debug)]
pub struct DnsMessage {
    pub transaction_id: u16,
    pub flags: u16,
    pub is_response: bool,
    pub question_count: u16,
    pub answer_count: u16,
    pub authority_count: u16,
    pub additional_count: u16,
    /// Name from the first question, empty when the message has none.
    pub query_name: String,
    pub query_type: u16,
    pub query_class: u16,
}

/// Decode a DNS message from a UDP payload.
pub fn decode_dns(payload: &[u8]) -> Result<DnsMessage, DnsError> {
    let reader = DnsReader::new(payload);
    reader.require_len(layout::HEADER_LEN)?;

    let flags = reader.read_u16_be(layout::FLAGS_RANGE)?;
    let question_count = reader.read_u16_be(layout::QDCOUNT_RANGE)?;

    let mut message = DnsMessage {
        transaction_id: reader.read_u16_be(layout::TRANSACTION_ID_RANGE)?,
        flags,
        is_response: flags & layout::QR_MASK != 0,
        question_count,
        answer_count: reader.read_u16_be(layout::ANCOUNT_RANGE)?,
        authority_count: reader.read_u16_be(layout::NSCOUNT_RANGE)?,
        additional_count: reader.read_u16_be(layout::ARCOUNT_RANGE)?,
        query_name: String::new(),
        query_type: 0,
        query_class: 0,
    };

    if question_count > 0 {
        let (name, next) = reader.read_name(layout::HEADER_LEN)?;
        message.query_name = name;
        message.query_type = reader.read_u16_be(next..next + 2)?;
        message.query_class = reader.read_u16_be(next + 2..next + 4)?;
    }

    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::decode_dns;
    use crate::protocols::dns::error::DnsError;
    use crate::protocols::dns::layout;

    fn query_header(id: u16, flags: u16, qdcount: u16, ancount: u16) -> Vec<u8> {
        let mut message = Vec::new();
        message.extend_from_slice(&id.to_be_bytes());
        message.extend_from_slice(&flags.to_be_bytes());
        message.extend_from_slice(&qdcount.to_be_bytes());
        message.extend_from_slice(&ancount.to_be_bytes());
        message.extend_from_slice(&0u16.to_be_bytes());
        message.extend_from_slice(&0u16.to_be_bytes());
        message
    }

    fn push_name(message: &mut Vec<u8>, labels: &[&str]) {
        for label in labels {
            message.push(label.len() as u8);
            message.extend_from_slice(label.as_bytes());
        }
        message.push(0);
    }

    #[test]
    fn decode_query() {
        let mut message = query_header(0x1234, 0x0100, 1, 0);
        push_name(&mut message, &["example", "com"]);
        message.extend_from_slice(&1u16.to_be_bytes()); // A
        message.extend_from_slice(&1u16.to_be_bytes()); // IN

        let decoded = decode_dns(&message).unwrap();
        assert_eq!(decoded.transaction_id, 0x1234);
        assert!(!decoded.is_response);
        assert_eq!(decoded.query_name, "example.com");
        assert_eq!(decoded.query_type, 1);
        assert_eq!(decoded.query_class, 1);
    }

    #[test]
    fn qr_bit_marks_responses() {
        let mut message = query_header(1, 0x8180, 1, 1);
        push_name(&mut message, &["a"]);
        message.extend_from_slice(&1u16.to_be_bytes());
        message.extend_from_slice(&1u16.to_be_bytes());

        let decoded = decode_dns(&message).unwrap();
        assert!(decoded.is_response);
        assert_eq!(decoded.answer_count, 1);
    }

    #[test]
    fn response_with_pointer_compressed_answer_name() {
        // Question at offset 12; the answer name is a bare pointer back
        // to it. Decoding must succeed without chasing into a loop.
        let mut message = query_header(7, 0x8180, 1, 1);
        push_name(&mut message, &["example", "com"]);
        message.extend_from_slice(&1u16.to_be_bytes());
        message.extend_from_slice(&1u16.to_be_bytes());
        // answer: pointer to offset 12, type A, class IN, ttl, rdlength 4, rdata
        message.extend_from_slice(&[0xc0, 0x0c]);
        message.extend_from_slice(&1u16.to_be_bytes());
        message.extend_from_slice(&1u16.to_be_bytes());
        message.extend_from_slice(&60u32.to_be_bytes());
        message.extend_from_slice(&4u16.to_be_bytes());
        message.extend_from_slice(&[93, 184, 216, 34]);

        let decoded = decode_dns(&message).unwrap();
        assert_eq!(decoded.query_name, "example.com");
        assert_eq!(decoded.answer_count, 1);
    }

    #[test]
    fn empty_question_section_is_allowed() {
        let message = query_header(2, 0x0100, 0, 0);
        let decoded = decode_dns(&message).unwrap();
        assert!(decoded.query_name.is_empty());
    }

    #[test]
    fn short_message_is_rejected() {
        let err = decode_dns(&[0u8; layout::HEADER_LEN - 1]).unwrap_err();
        assert!(matches!(
            err,
            DnsError::TooShort {
                needed: 12,
                actual: 11
            }
        ));
    }

    #[test]
    fn self_referencing_question_name_is_bounded() {
        let mut message = query_header(3, 0x0100, 1, 0);
        // pointer to itself at offset 12
        message.extend_from_slice(&[0xc0, 0x0c]);

        let err = decode_dns(&message).unwrap_err();
        assert!(matches!(err, DnsError::PointerLoop { .. }));
    }
}
