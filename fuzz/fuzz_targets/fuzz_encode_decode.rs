//! Fuzz target for k-mer encoding.
//!
//! Decoding is a left inverse of encoding for 32-base ACGT input, and rolling
//! windows agree with encoding each window directly once lowercase and other
//! non-base bytes are folded to `A`.

#![no_main]

use kiq::kmer::{decode, encode, windows, K};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let folded: Vec<u8> = data
        .iter()
        .map(|&b| if matches!(b, b'C' | b'G' | b'T') { b } else { b'A' })
        .collect();
    let direct: Vec<u64> = folded.windows(K).map(encode).collect();
    let rolled: Vec<u64> = windows(data).collect();
    assert_eq!(direct, rolled, "rolling windows diverged");

    if data.len() == K && data.iter().all(|b| matches!(b, b'A' | b'C' | b'G' | b'T')) {
        assert_eq!(decode(encode(data)).as_bytes(), data, "encode/decode roundtrip failed");
    }
});
