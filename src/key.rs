use crate::filter_internals::params;
use turboshake::TurboShake128;

/// A fixed-width 256-bit key, held as four little-endian 64-bit words.
///
/// Keys compare word-wise; the filter requires all construction keys to be distinct
/// under this equality. Callers holding arbitrary byte-string keys should first map
/// them through [`Key::digest_of_message`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    pub words: [u64; 4],
}

impl Key {
    pub const BYTE_LEN: usize = params::KEY_BYTE_LEN;

    #[inline(always)]
    pub const fn from_words(words: [u64; 4]) -> Key {
        Key { words }
    }

    #[inline(always)]
    pub fn from_le_bytes(bytes: &[u8; Self::BYTE_LEN]) -> Key {
        let words = unsafe {
            [
                u64::from_le_bytes(bytes[..8].try_into().unwrap_unchecked()),
                u64::from_le_bytes(bytes[8..16].try_into().unwrap_unchecked()),
                u64::from_le_bytes(bytes[16..24].try_into().unwrap_unchecked()),
                u64::from_le_bytes(bytes[24..].try_into().unwrap_unchecked()),
            ]
        };

        Key { words }
    }

    #[inline(always)]
    pub fn to_le_bytes(&self) -> [u8; Self::BYTE_LEN] {
        let mut bytes = [0u8; Self::BYTE_LEN];

        for (word, dst) in self.words.iter().zip(bytes.chunks_exact_mut(8)) {
            dst.copy_from_slice(&word.to_le_bytes());
        }

        bytes
    }

    /// Digests an arbitrary byte-string into a 256-bit key, using TurboSHAKE128 xof.
    #[inline(always)]
    pub fn digest_of_message(msg: &[u8]) -> Key {
        let mut hasher = TurboShake128::default();
        hasher.absorb(msg);
        hasher.finalize::<{ TurboShake128::DEFAULT_DOMAIN_SEPARATOR }>();

        let mut digest_bytes = [0u8; Self::BYTE_LEN];
        hasher.squeeze(&mut digest_bytes);

        Key::from_le_bytes(&digest_bytes)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn byte_round_trip_preserves_word_order() {
        let key = Key::from_words([1, 2, 3, u64::MAX]);
        assert_eq!(Key::from_le_bytes(&key.to_le_bytes()), key);

        let mut bytes = [0u8; Key::BYTE_LEN];
        bytes[0] = 1;
        assert_eq!(Key::from_le_bytes(&bytes), Key::from_words([1, 0, 0, 0]));
    }

    #[test]
    fn message_digests_are_deterministic_and_spread() {
        assert_eq!(Key::digest_of_message(b"apple"), Key::digest_of_message(b"apple"));
        assert_ne!(Key::digest_of_message(b"apple"), Key::digest_of_message(b"banana"));
        assert_ne!(Key::digest_of_message(b""), Key::default());
    }
}
