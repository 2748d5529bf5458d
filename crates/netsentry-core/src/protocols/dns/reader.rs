use super::error::DnsError;
use super::layout;

/// Bounds-checked access over a whole DNS message. Name decoding needs
/// random access for compression pointers, so the reader spans the full
/// message rather than a single section.
pub struct DnsReader<'a> {
    bytes: &'a [u8],
}

impl<'a> DnsReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn require_len(&self, needed: usize) -> Result<(), DnsError> {
        if self.bytes.len() < needed {
            return Err(DnsError::TooShort {
                needed,
                actual: self.bytes.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, DnsError> {
        self.bytes.get(offset).copied().ok_or(DnsError::TooShort {
            needed: offset + 1,
            actual: self.bytes.len(),
        })
    }

    pub fn read_u16_be(&self, range: std::ops::Range<usize>) -> Result<u16, DnsError> {
        let bytes = self
            .bytes
            .get(range.clone())
            .ok_or(DnsError::TooShort {
                needed: range.end,
                actual: self.bytes.len(),
            })?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_slice(&self, range: std::ops::Range<usize>) -> Result<&'a [u8], DnsError> {
        self.bytes.get(range.clone()).ok_or(DnsError::TooShort {
            needed: range.end,
            actual: self.bytes.len(),
        })
    }

    /// Decode a label-encoded name starting at `offset`.
    ///
    /// Returns the presentation-form name and the offset of the first
    /// octet after the name *in the original stream* (the post-pointer
    /// offset is restored after following a compression pointer).
    /// Pointer chases are bounded so malicious loops terminate.
    pub fn read_name(&self, offset: usize) -> Result<(String, usize), DnsError> {
        let mut name = String::new();
        let mut cursor = offset;
        // Offset to resume at once the first pointer has been taken.
        let mut resume: Option<usize> = None;
        let mut hops = 0usize;

        loop {
            let len = self.read_u8(cursor)?;

            if len & layout::POINTER_TAG == layout::POINTER_TAG {
                let raw = self.read_u16_be(cursor..cursor + 2)?;
                let target = (raw & layout::POINTER_OFFSET_MASK) as usize;
                if target >= self.bytes.len() {
                    return Err(DnsError::BadPointer { offset: target });
                }
                hops += 1;
                if hops > layout::MAX_POINTER_HOPS {
                    return Err(DnsError::PointerLoop {
                        max: layout::MAX_POINTER_HOPS,
                    });
                }
                if resume.is_none() {
                    resume = Some(cursor + 2);
                }
                cursor = target;
                continue;
            }

            if len == 0 {
                cursor += 1;
                break;
            }

            let start = cursor + 1;
            let label = self.read_slice(start..start + len as usize)?;
            if !name.is_empty() {
                name.push('.');
            }
            for byte in label {
                name.push(char::from(*byte));
            }
            if name.len() > layout::MAX_NAME_LEN {
                return Err(DnsError::NameTooLong {
                    max: layout::MAX_NAME_LEN,
                });
            }
            cursor = start + len as usize;
        }

        Ok((name, resume.unwrap_or(cursor)))
    }
}

#[cfg(test)]
mod tests {
    use super::DnsReader;
    use crate::protocols::dns::error::DnsError;

    #[test]
    fn read_plain_name() {
        let bytes = [3, b'w', b'w', b'w', 4, b't', b'e', b's', b't', 0, 0xff];
        let reader = DnsReader::new(&bytes);
        let (name, next) = reader.read_name(0).unwrap();
        assert_eq!(name, "www.test");
        assert_eq!(next, 10);
    }

    #[test]
    fn read_name_through_pointer_restores_offset() {
        // name at 0, pointer at 10 referencing it
        let bytes = [
            3, b'f', b'o', b'o', 3, b'b', b'a', b'r', 0, 0xaa, 0xc0, 0x00, 0xbb,
        ];
        let reader = DnsReader::new(&bytes);
        let (name, next) = reader.read_name(10).unwrap();
        assert_eq!(name, "foo.bar");
        assert_eq!(next, 12);
    }

    #[test]
    fn pointer_loop_is_bounded() {
        // pointer at 0 pointing to itself
        let bytes = [0xc0, 0x00];
        let reader = DnsReader::new(&bytes);
        let err = reader.read_name(0).unwrap_err();
        assert!(matches!(err, DnsError::PointerLoop { .. }));
    }

    #[test]
    fn pointer_out_of_bounds_is_rejected() {
        let bytes = [0xc0, 0x7f];
        let reader = DnsReader::new(&bytes);
        let err = reader.read_name(0).unwrap_err();
        assert!(matches!(err, DnsError::BadPointer { offset: 0x7f }));
    }

    #[test]
    fn truncated_label_is_too_short() {
        let bytes = [5, b'a', b'b'];
        let reader = DnsReader::new(&bytes);
        let err = reader.read_name(0).unwrap_err();
        assert!(matches!(err, DnsError::TooShort { .. }));
    }
}
