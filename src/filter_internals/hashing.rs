//! Hash primitives consumed by the filter constructor and the query path.

/// Computes a 64-bit MurmurHash3-like hash from a 64-bit input.
/// See https://github.com/aappleby/smhasher/blob/0ff96f7835817a27d0487325b6c16033e2992eb5/src/MurmurHash3.cpp#L81-L90.
#[inline(always)]
pub const fn murmur64(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;
    h
}

#[inline(always)]
pub const fn mix(key: u64, seed: u64) -> u64 {
    murmur64(key.wrapping_add(seed))
}

/// Reduces a 256-bit key and a 32-byte seed into the single 64-bit hash every
/// downstream table index is derived from.
///
/// Collects inspiration from https://github.com/claucece/chalamet/blob/515ff1479940a2917ad247acb6ab9e6d27e139a1/bff-modp/src/prelude/mod.rs#L43-L62.
#[inline(always)]
pub fn mix256(key: &[u64; 4], seed: &[u8; 32]) -> u64 {
    let seed_words = unsafe {
        [
            u64::from_le_bytes(seed[..8].try_into().unwrap_unchecked()),
            u64::from_le_bytes(seed[8..16].try_into().unwrap_unchecked()),
            u64::from_le_bytes(seed[16..24].try_into().unwrap_unchecked()),
            u64::from_le_bytes(seed[24..].try_into().unwrap_unchecked()),
        ]
    };

    key.iter()
        .map(|&k| {
            seed_words
                .into_iter()
                .fold(0u64, |acc, seed_word| murmur64(acc.wrapping_add(mix(k, seed_word))))
        })
        .fold(0, |acc, r| acc.wrapping_add(r))
}

/// Computes the high 64 bits of the 128-bit product of two 64-bit unsigned integers.
#[inline(always)]
pub const fn mulhi(a: u64, b: u64) -> u64 {
    (((a as u128) * (b as u128)) >> 64) as u64
}

// Callers only ever pass values in [0, 4].
#[inline(always)]
pub const fn mod3(x: u8) -> u8 {
    if x > 2 { x - 3 } else { x }
}

/// Derives the three table indices touched by a key, one per band of consecutive segments.
///
/// Collects inspiration from https://github.com/FastFilter/xor_singleheader/blob/a5a3630619f375a5610938bdfd61ec7e9f9fed1c/include/binaryfusefilter.h#L154-L164.
#[inline(always)]
pub const fn hash_batch(hash: u64, segment_length: u32, segment_count_length: u32) -> (u32, u32, u32) {
    let segment_length_mask = segment_length - 1;
    let hi = mulhi(hash, segment_count_length as u64);

    let h0 = hi as u32;
    let mut h1 = h0 + segment_length;
    let mut h2 = h1 + segment_length;

    h1 ^= ((hash >> 18) as u32) & segment_length_mask;
    h2 ^= (hash as u32) & segment_length_mask;

    (h0, h1, h2)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::filter_internals::geometry::FilterGeometry;
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn murmur64_finalizer_properties() {
        assert_eq!(murmur64(0), 0);

        // The finalizer is a bijection over u64, so nearby inputs must not collide.
        let outputs = (1u64..=1024).map(murmur64).collect::<std::collections::HashSet<u64>>();
        assert_eq!(outputs.len(), 1024);

        assert_eq!(mix(1, 2), murmur64(3));
        assert_eq!(mix(u64::MAX, 1), murmur64(0));
    }

    #[test]
    fn mulhi_computes_upper_half_of_product() {
        assert_eq!(mulhi(0, u64::MAX), 0);
        assert_eq!(mulhi(1 << 32, 1 << 32), 1);
        assert_eq!(mulhi(u64::MAX, u64::MAX), u64::MAX - 1);
    }

    #[test]
    fn mod3_over_expected_input_range() {
        assert_eq!(mod3(0), 0);
        assert_eq!(mod3(1), 1);
        assert_eq!(mod3(2), 2);
        assert_eq!(mod3(3), 0);
        assert_eq!(mod3(4), 1);
    }

    #[test]
    fn mix256_depends_on_every_key_word_and_seed_byte() {
        let key = [1u64, 2, 3, 4];
        let seed = [0xCAu8; 32];

        let base = mix256(&key, &seed);

        for word_idx in 0..4 {
            let mut flipped_key = key;
            flipped_key[word_idx] ^= 1;
            assert_ne!(base, mix256(&flipped_key, &seed));
        }

        let mut flipped_seed = seed;
        flipped_seed[31] ^= 1;
        assert_ne!(base, mix256(&key, &flipped_seed));
    }

    #[test]
    fn hash_batch_indices_stay_in_their_bands() {
        let mut rng = ChaCha8Rng::from_os_rng();

        for num_keys in [100u32, 10_000, 1_000_000] {
            let geometry = FilterGeometry::derive(num_keys);

            for _ in 0..10_000 {
                let hash = rng.random::<u64>();
                let (h0, h1, h2) = hash_batch(hash, geometry.segment_length, geometry.segment_count_length);

                assert!(h0 < geometry.segment_count_length);
                assert!(h1 >= geometry.segment_length && h1 < geometry.segment_count_length + geometry.segment_length);
                assert!(h2 >= 2 * geometry.segment_length && h2 < geometry.array_length);
            }
        }
    }
}
