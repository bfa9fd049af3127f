//! Fuzz target for PakArchive::open with arbitrary byte input.
//!
//! Exercises footer probing, index parsing and the in-data header re-read
//! with malformed or adversarial input, looking for panics and hangs.
//!
//! Run with: cargo +nightly fuzz run pak_open

#![no_main]

use libfuzzer_sys::fuzz_target;
use paktools::{KeyChain, PakArchive};
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let keys = KeyChain::new();
    let Ok(mut archive) = PakArchive::open(Cursor::new(data), &keys) else {
        return;
    };

    let entries: Vec<_> = archive.entries().map(|e| e.entry.clone()).collect();
    for entry in &entries {
        let _ = archive.read_entry_header(entry);
    }
});
