//! Benchmark utilities.

use rand::Rng;
use rockbatch_codec::WriteBatch;

/// Generate random data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate `count` key/value pairs with 16-byte keys and `value_size`-byte
/// values.
pub fn generate_pairs(count: usize, value_size: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
    (0..count)
        .map(|i| (format!("key-{i:012}").into_bytes(), random_data(value_size)))
        .collect()
}

/// Build a batch holding a put for every pair.
pub fn build_batch(pairs: &[(Vec<u8>, Vec<u8>)]) -> WriteBatch {
    let mut batch = WriteBatch::with_capacity(
        pairs.iter().map(|(k, v)| k.len() + v.len() + 3).sum::<usize>() + rockbatch_codec::HEADER_SIZE,
    );
    for (key, value) in pairs {
        batch.put(key, value);
    }
    batch
}
