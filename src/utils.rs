/// 16 bit additive checksum used by rdm packages and discovery responses.
#[inline]
pub(crate) fn calculate_checksum(data: &[u8]) -> u16 {
    let mut checksum = 0u16;

    for byte in data {
        checksum = checksum.wrapping_add(*byte as u16);
    }

    checksum
}

/// Encode bytes for a discovery response. Every source byte turns into two bytes,
/// the first or-ed with 0xAA and the second with 0x55.
/// The destination has to be at least twice the source size.
pub(crate) fn encode_disc_unique(src: &[u8], dest: &mut [u8]) {
    for (chunk, byte) in dest.chunks_exact_mut(2).zip(src) {
        chunk[0] = byte | 0xAA;
        chunk[1] = byte | 0x55;
    }
}

/// Decode a discovery package. Reverses [encode_disc_unique].
pub(crate) fn decode_disc_unique(src: &[u8], dest: &mut [u8]) {
    for (byte, chunk) in dest.iter_mut().zip(src.chunks_exact(2)) {
        *byte = chunk[0] & chunk[1];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(calculate_checksum(&[]), 0);
        assert_eq!(calculate_checksum(&[0xCC, 0x01]), 0x00CD);
        assert_eq!(calculate_checksum(&[0xFF; 258]), (0xFFu32 * 258 % 0x10000) as u16);
    }

    #[test]
    fn test_disc_unique_encoding() {
        let mut encoded = [0u8; 4];
        encode_disc_unique(&[0x12, 0xF0], &mut encoded);
        assert_eq!(encoded, [0xBA, 0x57, 0xFA, 0xF5]);

        let mut decoded = [0u8; 2];
        decode_disc_unique(&encoded, &mut decoded);
        assert_eq!(decoded, [0x12, 0xF0]);
    }
}
