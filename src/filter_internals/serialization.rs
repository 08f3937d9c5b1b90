//! Fixed little-endian byte layout of a serialized filter.
//!
//! A serialized filter is the concatenation
//! `seed | num_keys | plaintext_modulo | label | segment_length | segment_count |
//! segment_count_length | array_length | fingerprints`, every field little-endian.
//! The header alone is enough to compute the total byte count, so deserialization
//! can reject a buffer whose length disagrees with its own header.

use crate::filter_internals::{branch_opt_util, error::BffKvMapError, params};

pub const HEADER_BYTE_LEN: usize = params::SEED_BYTE_LEN + size_of::<u32>() + size_of::<u64>() + size_of::<u64>() + 4 * size_of::<u32>();

#[derive(Debug)]
pub struct FilterHeader {
    pub seed: [u8; params::SEED_BYTE_LEN],
    pub num_keys: u32,
    pub plaintext_modulo: u64,
    pub label: u64,
    pub segment_length: u32,
    pub segment_count: u32,
    pub segment_count_length: u32,
    pub array_length: u32,
}

/// Writes the header fields at the front of `bytes`, which must hold at least
/// `HEADER_BYTE_LEN` bytes.
pub fn encode_header(header: &FilterHeader, bytes: &mut [u8]) {
    let mut offset = 0;

    bytes[offset..offset + params::SEED_BYTE_LEN].copy_from_slice(&header.seed);
    offset += params::SEED_BYTE_LEN;

    bytes[offset..offset + 4].copy_from_slice(&header.num_keys.to_le_bytes());
    offset += 4;

    bytes[offset..offset + 8].copy_from_slice(&header.plaintext_modulo.to_le_bytes());
    offset += 8;

    bytes[offset..offset + 8].copy_from_slice(&header.label.to_le_bytes());
    offset += 8;

    bytes[offset..offset + 4].copy_from_slice(&header.segment_length.to_le_bytes());
    offset += 4;

    bytes[offset..offset + 4].copy_from_slice(&header.segment_count.to_le_bytes());
    offset += 4;

    bytes[offset..offset + 4].copy_from_slice(&header.segment_count_length.to_le_bytes());
    offset += 4;

    bytes[offset..offset + 4].copy_from_slice(&header.array_length.to_le_bytes());
}

/// Reads the header fields back. Fails if `bytes` can't even hold a header; field
/// consistency is the caller's concern.
pub fn decode_header(bytes: &[u8]) -> Result<FilterHeader, BffKvMapError> {
    if branch_opt_util::unlikely(bytes.len() < HEADER_BYTE_LEN) {
        return Err(BffKvMapError::DeserializationByteCountMismatch);
    }

    let mut offset = 0;

    let header = unsafe {
        let seed: [u8; params::SEED_BYTE_LEN] = bytes[offset..offset + params::SEED_BYTE_LEN].try_into().unwrap_unchecked();
        offset += params::SEED_BYTE_LEN;

        let num_keys = u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap_unchecked());
        offset += 4;

        let plaintext_modulo = u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap_unchecked());
        offset += 8;

        let label = u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap_unchecked());
        offset += 8;

        let segment_length = u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap_unchecked());
        offset += 4;

        let segment_count = u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap_unchecked());
        offset += 4;

        let segment_count_length = u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap_unchecked());
        offset += 4;

        let array_length = u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap_unchecked());

        FilterHeader {
            seed,
            num_keys,
            plaintext_modulo,
            label,
            segment_length,
            segment_count,
            segment_count_length,
            array_length,
        }
    };

    Ok(header)
}

pub fn encode_fingerprints(fingerprints: &[u32], bytes: &mut [u8]) {
    for (fingerprint, dst) in fingerprints.iter().zip(bytes.chunks_exact_mut(4)) {
        dst.copy_from_slice(&fingerprint.to_le_bytes());
    }
}

pub fn decode_fingerprints(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes(unsafe { chunk.try_into().unwrap_unchecked() }))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn header_field_order_and_round_trip() {
        let header = FilterHeader {
            seed: [0xA5; params::SEED_BYTE_LEN],
            num_keys: 4,
            plaintext_modulo: 257,
            label: 1,
            segment_length: 4,
            segment_count: 1,
            segment_count_length: 4,
            array_length: 12,
        };

        let mut bytes = [0u8; HEADER_BYTE_LEN];
        encode_header(&header, &mut bytes);

        // Field boundaries at their fixed offsets, little-endian.
        assert_eq!(&bytes[..32], &[0xA5; 32]);
        assert_eq!(&bytes[32..36], &4u32.to_le_bytes());
        assert_eq!(&bytes[36..44], &257u64.to_le_bytes());
        assert_eq!(&bytes[44..52], &1u64.to_le_bytes());
        assert_eq!(&bytes[52..56], &4u32.to_le_bytes());
        assert_eq!(&bytes[56..60], &1u32.to_le_bytes());
        assert_eq!(&bytes[60..64], &4u32.to_le_bytes());
        assert_eq!(&bytes[64..68], &12u32.to_le_bytes());

        let decoded = decode_header(&bytes).expect("Header must decode");
        assert_eq!(decoded.seed, header.seed);
        assert_eq!(decoded.num_keys, header.num_keys);
        assert_eq!(decoded.plaintext_modulo, header.plaintext_modulo);
        assert_eq!(decoded.label, header.label);
        assert_eq!(decoded.segment_length, header.segment_length);
        assert_eq!(decoded.segment_count, header.segment_count);
        assert_eq!(decoded.segment_count_length, header.segment_count_length);
        assert_eq!(decoded.array_length, header.array_length);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let bytes = [0u8; HEADER_BYTE_LEN - 1];
        assert_eq!(decode_header(&bytes).unwrap_err(), BffKvMapError::DeserializationByteCountMismatch);
    }

    #[test]
    fn fingerprint_words_round_trip_little_endian() {
        let fingerprints = [0u32, 1, 255, 256, u32::MAX];

        let mut bytes = [0u8; 20];
        encode_fingerprints(&fingerprints, &mut bytes);
        assert_eq!(&bytes[8..12], &[0xFF, 0, 0, 0]);

        assert_eq!(decode_fingerprints(&bytes), fingerprints);
    }
}
