//! Fuzz target for the database decoder.
//!
//! Arbitrary bytes must decode to a database or an error, never a panic.

#![no_main]

use std::io::Cursor;
use std::path::Path;

use kiq::codec;
use kiq::indexer::HashKmerIndexer;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let indexer = HashKmerIndexer::build(&[1, 2, 3]);
    let _ = codec::read_from(Cursor::new(data), Path::new("fuzz"), &indexer, true);
    let _ = codec::read_from(Cursor::new(data), Path::new("fuzz"), &indexer, false);
});
