//! Little-endian integer pack/unpack for on-disk fields.
//!
//! Two symmetric pairs. The wire form is little-endian; round-trip is
//! lossless for every representable value.

/// Encodes `value` as 4 little-endian bytes.
pub fn encode_u32(value: u32) -> [u8; 4] {
    value.to_le_bytes()
}

/// Decodes 4 little-endian bytes into a `u32`.
pub fn decode_u32(bytes: [u8; 4]) -> u32 {
    u32::from_le_bytes(bytes)
}

/// Encodes `value` as 8 little-endian bytes.
pub fn encode_u64(value: u64) -> [u8; 8] {
    value.to_le_bytes()
}

/// Decodes 8 little-endian bytes into a `u64`.
pub fn decode_u64(bytes: [u8; 8]) -> u64 {
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u32_round_trip() {
        for n in [0u32, 1, u32::MAX] {
            assert_eq!(decode_u32(encode_u32(n)), n);
        }
    }

    #[test]
    fn u64_round_trip() {
        for n in [0u64, 1, 1u64 << 31, u32::MAX as u64, 1u64 << 63, u64::MAX] {
            assert_eq!(decode_u64(encode_u64(n)), n);
        }
    }

    #[test]
    fn encoding_is_little_endian() {
        assert_eq!(encode_u32(1), [1, 0, 0, 0]);
        assert_eq!(encode_u64(1), [1, 0, 0, 0, 0, 0, 0, 0]);
    }
}
