use crate::filter_internals::{
    branch_opt_util,
    error::BffKvMapError,
    geometry::FilterGeometry,
    hashing,
    params,
    serialization::{self, FilterHeader},
};
use crate::key::Key;
use std::collections::{HashMap, HashSet};
use zeroize::Zeroize;

/// A binary fuse filter binding each of `n` distinct 256-bit keys to a value in
/// `[0, plaintext_modulo)`.
///
/// The filter is built once from a key-value map and is immutable afterwards. For any
/// construction-set key, [`KvFilter::recover`] returns the bound value; for any other
/// key it returns a masked, effectively uniform element of `[0, plaintext_modulo)`.
/// There is no membership test, by design. This implementation collects inspiration
/// from https://github.com/FastFilter/fastfilter_cpp/blob/5df1dc5063702945f6958e4bda445dd082aed366/src/xorfilter/3wise_xor_binary_fuse_filter_lowmem.h
/// and https://github.com/claucece/chalamet/tree/515ff1479940a2917ad247acb6ab9e6d27e139a1/bff-modp.
#[derive(Debug)]
pub struct KvFilter {
    seed: [u8; params::SEED_BYTE_LEN],
    num_keys: u32,
    plaintext_modulo: u64,
    label: u64,
    geometry: FilterGeometry,
    fingerprints: Vec<u32>,
}

/// Modular subtraction for operands already reduced into `[0, p)`.
#[inline(always)]
const fn sub_mod(a: u64, b: u64, p: u64) -> u64 {
    (a + p - b) % p
}

impl KvFilter {
    /// Constructs a filter over a key-value map, using the caller-supplied 32-byte
    /// seed as the sole source of randomness. Two builds from identical
    /// `(seed, keys, values, plaintext_modulo, label)` produce bit-identical filters.
    ///
    /// # Arguments
    ///
    /// * `seed` - Hash seed; reinterpreted as four little-endian 64-bit words.
    /// * `keys` - Distinct 256-bit keys.
    /// * `values` - Same-length values; reduced modulo `plaintext_modulo` on input.
    /// * `plaintext_modulo` - Value alphabet modulus `p`, `256 <= p <= 2^32`.
    /// * `label` - Domain separator folded into the per-key mask; recovery must use the same label.
    ///
    /// # Returns
    ///
    /// The constructed filter, or an argument error, or - after exhausting all peeling
    /// attempts for this seed - a stochastic error the caller may retry with a new seed.
    pub fn build(
        seed: &[u8; params::SEED_BYTE_LEN],
        keys: &[Key],
        values: &[u32],
        plaintext_modulo: u64,
        label: u64,
    ) -> Result<KvFilter, BffKvMapError> {
        if branch_opt_util::unlikely(keys.len() != values.len()) {
            return Err(BffKvMapError::MismatchedNumberOfKeysAndValues);
        }
        if branch_opt_util::unlikely(plaintext_modulo < params::MIN_PLAINTEXT_MODULO) {
            return Err(BffKvMapError::PlaintextModuloTooSmall);
        }
        if branch_opt_util::unlikely(plaintext_modulo > params::MAX_PLAINTEXT_MODULO) {
            return Err(BffKvMapError::PlaintextModuloTooLarge);
        }

        let num_keys = keys.len();
        {
            let mut distinct_keys = HashSet::with_capacity(num_keys);
            if branch_opt_util::unlikely(!keys.iter().all(|key| distinct_keys.insert(key))) {
                return Err(BffKvMapError::DuplicateKeysInMap);
            }
        }

        let geometry = FilterGeometry::derive(num_keys as u32);
        let array_length = geometry.array_length as usize;

        let mut fingerprints = vec![0u32; array_length];

        let mut alone = vec![0u32; array_length];
        let mut t2count = vec![0u8; array_length];
        let mut t2hash = vec![0u64; array_length];
        let mut reverse_h = vec![0u8; num_keys];
        let mut reverse_order = vec![0u64; num_keys + 1];
        reverse_order[num_keys] = 1;

        let mut hash_to_value: HashMap<u64, u32> = HashMap::with_capacity(num_keys);

        let block_bits = {
            let mut block_bits = 1;
            while (1u64 << block_bits) < geometry.segment_count as u64 {
                block_bits += 1;
            }
            block_bits
        };
        let block_bits_mask = (1u64 << block_bits) - 1;

        let start_pos_len: usize = 1 << block_bits;
        let mut start_pos = vec![0usize; start_pos_len];

        let mut h012 = [0u32; 5];
        let mut done = false;

        for _ in 0..params::MAX_CREATE_ATTEMPT_COUNT {
            for (idx, val) in start_pos.iter_mut().enumerate() {
                *val = (((idx as u64) * (num_keys as u64)) >> block_bits) as usize;
            }

            hash_to_value.clear();

            // Bin keys by the leading bits of their hash, probing forward within the
            // bin space; `reverse_order[num_keys] = 1` keeps the probe loop in bounds.
            let mut placement_failed = false;
            for (key, &value) in keys.iter().zip(values.iter()) {
                let hash = hashing::mix256(&key.words, seed);

                // Hash zero is indistinguishable from an empty slot, and a 64-bit hash
                // collision between two distinct keys can't be represented; both abort
                // the attempt, leaving the caller a reseed-and-retry path.
                if branch_opt_util::unlikely(hash == 0) {
                    placement_failed = true;
                    break;
                }
                if branch_opt_util::unlikely(hash_to_value.insert(hash, (value as u64 % plaintext_modulo) as u32).is_some()) {
                    placement_failed = true;
                    break;
                }

                let mut segment_index = hash >> (64 - block_bits);
                while reverse_order[start_pos[segment_index as usize]] != 0 {
                    segment_index += 1;
                    segment_index &= block_bits_mask;
                }

                reverse_order[start_pos[segment_index as usize]] = hash;
                start_pos[segment_index as usize] += 1;
            }

            if branch_opt_util::unlikely(placement_failed) {
                reverse_order[..num_keys].fill(0);
                continue;
            }

            // Accumulate edge incidence: high 6 bits of t2count hold 4x the degree,
            // low 2 bits the xor of incident slot positions.
            let mut accumulation_error = false;
            for &hash in reverse_order.iter().take(num_keys) {
                let (h0, h1, h2) = hashing::hash_batch(hash, geometry.segment_length, geometry.segment_count_length);
                let (h0, h1, h2) = (h0 as usize, h1 as usize, h2 as usize);

                t2count[h0] = t2count[h0].wrapping_add(4);
                t2hash[h0] ^= hash;

                t2count[h1] = t2count[h1].wrapping_add(4);
                t2count[h1] ^= 1;
                t2hash[h1] ^= hash;

                t2count[h2] = t2count[h2].wrapping_add(4);
                t2count[h2] ^= 2;
                t2hash[h2] ^= hash;

                accumulation_error |= t2count[h0] < 4 || t2count[h1] < 4 || t2count[h2] < 4;
            }

            if branch_opt_util::unlikely(accumulation_error) {
                reverse_order[..num_keys].fill(0);
                t2count.fill(0);
                t2hash.fill(0);

                continue;
            }

            let mut qsize = 0;
            for (idx, &count) in t2count.iter().enumerate() {
                alone[qsize] = idx as u32;
                if (count >> 2) == 1 {
                    qsize += 1;
                }
            }

            // Peel degree-1 vertices; each peeled edge is removed from its two other
            // endpoints, reconstructed through the rotated h012 window.
            let mut stack_size = 0;
            while qsize > 0 {
                qsize -= 1;

                let index = alone[qsize] as usize;
                if (t2count[index] >> 2) == 1 {
                    let hash = t2hash[index];
                    let found: u8 = t2count[index] & 3;

                    reverse_h[stack_size] = found;
                    reverse_order[stack_size] = hash;
                    stack_size += 1;

                    let (h0, h1, h2) = hashing::hash_batch(hash, geometry.segment_length, geometry.segment_count_length);

                    h012[1] = h1;
                    h012[2] = h2;
                    h012[3] = h0;
                    h012[4] = h012[1];

                    let other_index1 = h012[(found + 1) as usize] as usize;
                    alone[qsize] = other_index1 as u32;
                    if (t2count[other_index1] >> 2) == 2 {
                        qsize += 1;
                    }

                    t2count[other_index1] -= 4;
                    t2count[other_index1] ^= hashing::mod3(found + 1);
                    t2hash[other_index1] ^= hash;

                    let other_index2 = h012[(found + 2) as usize] as usize;
                    alone[qsize] = other_index2 as u32;
                    if (t2count[other_index2] >> 2) == 2 {
                        qsize += 1;
                    }

                    t2count[other_index2] -= 4;
                    t2count[other_index2] ^= hashing::mod3(found + 2);
                    t2hash[other_index2] ^= hash;
                }
            }

            if stack_size == num_keys {
                done = true;
                break;
            }

            reverse_order[..num_keys].fill(0);
            t2count.fill(0);
            t2hash.fill(0);
        }

        if branch_opt_util::unlikely(!done) {
            return Err(BffKvMapError::ExhaustedAllAttemptsToBuildFilter(params::MAX_CREATE_ATTEMPT_COUNT));
        }

        // Walk the peeling stack in reverse; every slot assigned here closes the
        // equation f[h0] + f[h1] + f[h2] + mask = value (mod p) for its key.
        for i in (0..num_keys).rev() {
            let hash = reverse_order[i];
            let value = *hash_to_value.get(&hash).ok_or(BffKvMapError::KeyNotFoundInMap)? as u64;

            let (h0, h1, h2) = hashing::hash_batch(hash, geometry.segment_length, geometry.segment_count_length);

            let found = reverse_h[i] as usize;
            h012[0] = h0;
            h012[1] = h1;
            h012[2] = h2;
            h012[3] = h012[0];
            h012[4] = h012[1];

            let other_a = fingerprints[h012[found + 1] as usize] as u64;
            let other_b = fingerprints[h012[found + 2] as usize] as u64;
            let mask = hashing::mix(hash, label) % plaintext_modulo;

            let entry = sub_mod(sub_mod(value, other_a, plaintext_modulo), other_b, plaintext_modulo);
            fingerprints[h012[found] as usize] = sub_mod(entry, mask, plaintext_modulo) as u32;
        }

        Ok(KvFilter {
            seed: *seed,
            num_keys: num_keys as u32,
            plaintext_modulo,
            label,
            geometry,
            fingerprints,
        })
    }

    /// Reconstructs a filter from its serialized byte form, validating that the byte
    /// count and the header agree before trusting the embedded table length.
    pub fn from_bytes(bytes: &[u8]) -> Result<KvFilter, BffKvMapError> {
        let header = serialization::decode_header(bytes)?;

        let band_count = header.segment_count.checked_add(params::ARITY - 1).ok_or(BffKvMapError::DeserializationHeaderInconsistent)?;
        let implied_array_length = band_count.checked_mul(header.segment_length).ok_or(BffKvMapError::DeserializationHeaderInconsistent)?;
        let implied_segment_count_length = header
            .segment_count
            .checked_mul(header.segment_length)
            .ok_or(BffKvMapError::DeserializationHeaderInconsistent)?;

        let header_is_consistent = header.segment_length.is_power_of_two()
            && header.segment_length <= params::MAX_SEGMENT_LENGTH
            && header.array_length == implied_array_length
            && header.segment_count_length == implied_segment_count_length
            && header.plaintext_modulo >= params::MIN_PLAINTEXT_MODULO
            && header.plaintext_modulo <= params::MAX_PLAINTEXT_MODULO;

        if !branch_opt_util::likely(header_is_consistent) {
            return Err(BffKvMapError::DeserializationHeaderInconsistent);
        }

        let expected_num_bytes = serialization::HEADER_BYTE_LEN + (header.array_length as usize) * size_of::<u32>();
        if branch_opt_util::unlikely(bytes.len() != expected_num_bytes) {
            return Err(BffKvMapError::DeserializationByteCountMismatch);
        }

        let fingerprints = serialization::decode_fingerprints(&bytes[serialization::HEADER_BYTE_LEN..]);

        Ok(KvFilter {
            seed: header.seed,
            num_keys: header.num_keys,
            plaintext_modulo: header.plaintext_modulo,
            label: header.label,
            geometry: FilterGeometry {
                segment_length: header.segment_length,
                segment_length_mask: header.segment_length - 1,
                segment_count: header.segment_count,
                segment_count_length: header.segment_count_length,
                array_length: header.array_length,
            },
            fingerprints,
        })
    }

    /// Recovers the value bound to `key`, modulo the plaintext modulo.
    ///
    /// Never fails: querying a key outside the construction set returns a
    /// deterministic pseudo-random element of `[0, plaintext_modulo)`.
    pub fn recover(&self, key: &Key) -> u32 {
        let hash = hashing::mix256(&key.words, &self.seed);
        let (h0, h1, h2) = hashing::hash_batch(hash, self.geometry.segment_length, self.geometry.segment_count_length);

        let data = self.fingerprints[h0 as usize] as u64 + self.fingerprints[h1 as usize] as u64 + self.fingerprints[h2 as usize] as u64;
        let mask = hashing::mix(hash, self.label) % self.plaintext_modulo;

        ((data + mask) % self.plaintext_modulo) as u32
    }

    /// The three fingerprint-table indices touched by `key`.
    pub fn hash_evals(&self, key: &Key) -> [u32; 3] {
        let hash = hashing::mix256(&key.words, &self.seed);
        let (h0, h1, h2) = hashing::hash_batch(hash, self.geometry.segment_length, self.geometry.segment_count_length);

        [h0, h1, h2]
    }

    /// The unreduced per-key mask material, `mix(mix256(key, seed), label)`.
    pub fn key_fingerprint(&self, key: &Key) -> u64 {
        let hash = hashing::mix256(&key.words, &self.seed);
        hashing::mix(hash, self.label)
    }

    /// Serializes into `bytes`, which must be exactly [`KvFilter::serialized_num_bytes`] long.
    pub fn serialize(&self, bytes: &mut [u8]) -> Result<(), BffKvMapError> {
        if branch_opt_util::unlikely(bytes.len() != self.serialized_num_bytes()) {
            return Err(BffKvMapError::SerializationBufferSizeMismatch);
        }

        serialization::encode_header(&self.header(), bytes);
        serialization::encode_fingerprints(&self.fingerprints, &mut bytes[serialization::HEADER_BYTE_LEN..]);

        Ok(())
    }

    /// Serializes into a freshly allocated, exactly sized byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.serialized_num_bytes()];

        serialization::encode_header(&self.header(), &mut bytes);
        serialization::encode_fingerprints(&self.fingerprints, &mut bytes[serialization::HEADER_BYTE_LEN..]);

        bytes
    }

    pub fn serialized_num_bytes(&self) -> usize {
        serialization::HEADER_BYTE_LEN + self.fingerprints.len() * size_of::<u32>()
    }

    /// Table bits spent per construction key, `floor(array_length * floor(log2 p) / n)`. Reporting only.
    pub fn bits_per_entry(&self) -> usize {
        if self.num_keys == 0 {
            return 0;
        }

        (self.fingerprints.len() * self.plaintext_modulo.ilog2() as usize) / (self.num_keys as usize)
    }

    pub fn num_keys(&self) -> u32 {
        self.num_keys
    }

    pub fn plaintext_modulo(&self) -> u64 {
        self.plaintext_modulo
    }

    pub fn label(&self) -> u64 {
        self.label
    }

    pub fn num_fingerprints(&self) -> usize {
        self.fingerprints.len()
    }

    /// The fingerprint table; every entry lies in `[0, plaintext_modulo)`.
    pub fn fingerprints(&self) -> &[u32] {
        &self.fingerprints
    }

    fn header(&self) -> FilterHeader {
        FilterHeader {
            seed: self.seed,
            num_keys: self.num_keys,
            plaintext_modulo: self.plaintext_modulo,
            label: self.label,
            segment_length: self.geometry.segment_length,
            segment_count: self.geometry.segment_count,
            segment_count_length: self.geometry.segment_count_length,
            array_length: self.geometry.array_length,
        }
    }
}

impl Drop for KvFilter {
    fn drop(&mut self) {
        self.seed.zeroize();
        self.fingerprints.zeroize();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn tiny_filter() -> KvFilter {
        let keys = (1..=4u64).map(|w| Key::from_words([0, 0, 0, w])).collect::<Vec<Key>>();
        let values = [7u32, 13, 21, 42];

        KvFilter::build(&[0u8; params::SEED_BYTE_LEN], &keys, &values, 257, 1).expect("Tiny filter must build")
    }

    #[test]
    fn serialize_rejects_wrongly_sized_buffer() {
        let filter = tiny_filter();

        let mut undersized = vec![0u8; filter.serialized_num_bytes() - 1];
        assert_eq!(filter.serialize(&mut undersized).unwrap_err(), BffKvMapError::SerializationBufferSizeMismatch);

        let mut oversized = vec![0u8; filter.serialized_num_bytes() + 1];
        assert_eq!(filter.serialize(&mut oversized).unwrap_err(), BffKvMapError::SerializationBufferSizeMismatch);

        let mut exact = vec![0u8; filter.serialized_num_bytes()];
        assert!(filter.serialize(&mut exact).is_ok());
        assert_eq!(exact, filter.to_bytes());
    }

    #[test]
    fn from_bytes_rejects_inconsistent_header() {
        let bytes = tiny_filter().to_bytes();

        // segment_length must be a power of two
        let mut corrupted = bytes.clone();
        corrupted[52] = corrupted[52].wrapping_add(1);
        assert_eq!(KvFilter::from_bytes(&corrupted).unwrap_err(), BffKvMapError::DeserializationHeaderInconsistent);

        // array_length must match (segment_count + 2) * segment_length
        let mut corrupted = bytes.clone();
        corrupted[64] = corrupted[64].wrapping_add(4);
        assert_eq!(KvFilter::from_bytes(&corrupted).unwrap_err(), BffKvMapError::DeserializationHeaderInconsistent);

        // plaintext modulo below 256
        let mut corrupted = bytes.clone();
        corrupted[36] = 255;
        corrupted[37] = 0;
        assert_eq!(KvFilter::from_bytes(&corrupted).unwrap_err(), BffKvMapError::DeserializationHeaderInconsistent);
    }

    #[test]
    fn from_bytes_rejects_truncated_and_padded_buffers() {
        let bytes = tiny_filter().to_bytes();

        assert_eq!(KvFilter::from_bytes(&bytes[..bytes.len() - 1]).unwrap_err(), BffKvMapError::DeserializationByteCountMismatch);
        assert_eq!(KvFilter::from_bytes(&bytes[..serialization::HEADER_BYTE_LEN]).unwrap_err(), BffKvMapError::DeserializationByteCountMismatch);
        assert_eq!(KvFilter::from_bytes(&[]).unwrap_err(), BffKvMapError::DeserializationByteCountMismatch);

        let mut padded = bytes.clone();
        padded.extend_from_slice(&[0u8; 4]);
        assert_eq!(KvFilter::from_bytes(&padded).unwrap_err(), BffKvMapError::DeserializationByteCountMismatch);
    }

    #[test]
    fn empty_map_builds_and_masks_every_query() {
        let filter = KvFilter::build(&[0xCAu8; params::SEED_BYTE_LEN], &[], &[], 1024, 7).expect("Empty filter must build");

        assert_eq!(filter.num_keys(), 0);
        assert_eq!(filter.bits_per_entry(), 0);

        for w in 0..100u64 {
            let recovered = filter.recover(&Key::from_words([w, w, w, w]));
            assert!((recovered as u64) < filter.plaintext_modulo());
        }

        let round_tripped = KvFilter::from_bytes(&filter.to_bytes()).expect("Empty filter must round-trip");
        assert_eq!(round_tripped.to_bytes(), filter.to_bytes());
    }

    #[test]
    fn all_zero_key_with_zero_seed_exhausts_attempts() {
        // mix256 of the all-zero key under the all-zero seed is 0, which the
        // placement stage refuses to distinguish from an empty slot.
        let keys = [Key::from_words([0, 0, 0, 0]), Key::from_words([0, 0, 0, 1])];
        let values = [1u32, 2];

        assert_eq!(
            KvFilter::build(&[0u8; params::SEED_BYTE_LEN], &keys, &values, 257, 0).unwrap_err(),
            BffKvMapError::ExhaustedAllAttemptsToBuildFilter(params::MAX_CREATE_ATTEMPT_COUNT)
        );
    }
}
