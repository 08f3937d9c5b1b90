// This program demonstrates the Binary Fuse Filter for Key-Value Maps.
// It generates a random key-value map, builds a filter over it, reports the
// filter's size characteristics, round-trips the filter through its serialized
// byte form, and finally recovers every bound value from the deserialized copy.

use bff_kv_map::{Key, KvFilter, SEED_BYTE_LEN};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn generate_random_keys_and_values(rng: &mut ChaCha8Rng, num_keys: usize, plaintext_modulo: u64) -> (Vec<Key>, Vec<u32>) {
    let keys = (0..num_keys).map(|_| Key::from_words(rng.random())).collect::<Vec<Key>>();
    let values = (0..num_keys).map(|_| rng.random_range(0..plaintext_modulo) as u32).collect::<Vec<u32>>();

    (keys, values)
}

fn main() {
    const NUM_KEYS: usize = 100_000;
    const PLAINTEXT_MODULO: u64 = 1024;
    const LABEL: u64 = 12345;

    let mut rng = ChaCha8Rng::from_os_rng();
    let (keys, values) = generate_random_keys_and_values(&mut rng, NUM_KEYS, PLAINTEXT_MODULO);

    let mut seed = [0u8; SEED_BYTE_LEN];
    rng.fill_bytes(&mut seed);

    let filter = match KvFilter::build(&seed, &keys, &values, PLAINTEXT_MODULO, LABEL) {
        Ok(filter) => filter,
        Err(err) => {
            eprintln!("⛔ Filter construction failed: {}", err);
            return;
        }
    };

    println!("Number of keys: {}", NUM_KEYS);
    println!("Plaintext modulo: {}", PLAINTEXT_MODULO);
    println!("Bits per entry: {}", filter.bits_per_entry());
    println!("Serialized size: {} bytes", filter.serialized_num_bytes());

    let filter_as_bytes = filter.to_bytes();
    let deserialized_filter = KvFilter::from_bytes(&filter_as_bytes).expect("Serialized filter must deserialize");

    let mut failed_to_recover = false;
    for (idx, (key, &expected_value)) in keys.iter().zip(values.iter()).enumerate() {
        let recovered_value = deserialized_filter.recover(key);
        if recovered_value != expected_value {
            println!("⚠️ Recovery failed for key {}: (recovered value: {}) (original: {})", idx, recovered_value, expected_value);
            failed_to_recover = true;
        }
    }

    if !failed_to_recover {
        println!("✅ All values recovered correctly !");
    }
}
