use bff_kv_map::{Key, KvFilter, SEED_BYTE_LEN};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::time::Duration;

fn main() {
    divan::main();
}

const PLAINTEXT_MODULO: u64 = 1024;
const LABEL: u64 = 256;

fn generate_random_keys_and_values(rng: &mut ChaCha8Rng, num_keys: usize) -> (Vec<Key>, Vec<u32>) {
    let keys = (0..num_keys).map(|_| Key::from_words(rng.random())).collect::<Vec<Key>>();
    let values = (0..num_keys).map(|_| rng.random_range(0..PLAINTEXT_MODULO) as u32).collect::<Vec<u32>>();

    (keys, values)
}

fn pick_working_seed(rng: &mut ChaCha8Rng, keys: &[Key], values: &[u32]) -> [u8; SEED_BYTE_LEN] {
    loop {
        let mut seed = [0u8; SEED_BYTE_LEN];
        rng.fill_bytes(&mut seed);

        if KvFilter::build(&seed, keys, values, PLAINTEXT_MODULO, LABEL).is_ok() {
            return seed;
        }
    }
}

#[divan::bench(args = [10_000, 100_000, 1_000_000], max_time = Duration::from_secs(300), skip_ext_time = true)]
fn construct_filter(bencher: divan::Bencher, num_keys: usize) {
    let mut rng = ChaCha8Rng::from_os_rng();

    let (keys, values) = generate_random_keys_and_values(&mut rng, num_keys);
    let seed = pick_working_seed(&mut rng, &keys, &values);

    bencher.bench(|| {
        divan::black_box(KvFilter::build(
            divan::black_box(&seed),
            divan::black_box(&keys),
            divan::black_box(&values),
            PLAINTEXT_MODULO,
            LABEL,
        ))
    });
}
