//! bff-kv-map: a Binary Fuse Filter for Key-Value Maps over a plaintext modulus `p`.
//!
//! Given a set of distinct 256-bit keys, each bound to a value in `[0, p)`, this crate builds a
//! compact fingerprint table from which the value of any construction-set key is reconstructed as
//! the sum of three table entries plus a per-key mask, modulo `p`. Keys outside the construction
//! set recover an arithmetically-masked value indistinguishable from a uniform element of `[0, p)`,
//! which makes the filter a useful building block in private-information-retrieval and oblivious
//! key-value protocols. Collects inspiration from <https://github.com/claucece/chalamet>'s bff-modp.
//!
//! ## Features
//!
//! * **Value recovery, not membership:** `recover` is total; there is no "absent" sentinel, by design.
//! * **Deterministic construction:** the caller-supplied 32-byte seed is the sole source of
//!   randomness, so identical inputs rebuild bit-identical filters.
//! * **Fixed byte layout:** serialized filters are a fixed little-endian field concatenation,
//!   reconstructible without any external schema.
//!
//! ## Usage
//!
//! Add bff-kv-map as dependency to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! bff-kv-map = "=0.1.0"
//! rand = "=0.9.0"
//! rand_chacha = "=0.9.0"
//! ```
//!
//! Then, you can use it in your code:
//!
//! ```rust
//! use bff_kv_map::{BffKvMapError, Key, KvFilter, SEED_BYTE_LEN};
//! use rand::prelude::*;
//! use rand_chacha::ChaCha8Rng;
//!
//! fn main() {
//!     const PLAINTEXT_MODULO: u64 = 1024;
//!     const LABEL: u64 = 1;
//!
//!     let mut rng = ChaCha8Rng::from_os_rng();
//!     let mut seed = [0u8; SEED_BYTE_LEN];
//!
//!     let keys = (0..1024u64).map(|i| Key::digest_of_message(&i.to_le_bytes())).collect::<Vec<Key>>();
//!     let values = (0..1024u32).map(|i| i % (PLAINTEXT_MODULO as u32)).collect::<Vec<u32>>();
//!
//!     // Construction is deterministic per seed; a stochastic failure asks for a fresh one.
//!     let filter = loop {
//!         rng.fill_bytes(&mut seed);
//!
//!         match KvFilter::build(&seed, &keys, &values, PLAINTEXT_MODULO, LABEL) {
//!             Ok(filter) => break filter,
//!             Err(BffKvMapError::ExhaustedAllAttemptsToBuildFilter(_)) => continue,
//!             Err(err) => panic!("Filter construction failed: {}", err),
//!         }
//!     };
//!
//!     assert_eq!(filter.recover(&keys[42]), values[42]);
//! }
//! ```

pub use filter::KvFilter;
pub use filter_internals::error::BffKvMapError;
pub use filter_internals::params::{KEY_BYTE_LEN, MAX_CREATE_ATTEMPT_COUNT, SEED_BYTE_LEN};
pub use key::Key;

pub mod filter;
pub mod key;

mod filter_internals;

mod test_filter;
