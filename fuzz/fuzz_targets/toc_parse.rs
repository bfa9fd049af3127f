//! Fuzz target for IoStore TOC and directory index parsing.
//!
//! Run with: cargo +nightly fuzz run toc_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use paktools::iostore::{DirectoryHandle, DirectoryIndex, Toc};

fuzz_target!(|data: &[u8]| {
    if let Ok(toc) = Toc::parse(data) {
        for range in &toc.chunk_offset_lengths {
            let _ = toc.block_range(range);
        }
    }

    // The directory walk must terminate on cyclic links
    if let Ok(index) = DirectoryIndex::parse(data) {
        for _ in index.walk(DirectoryHandle::ROOT) {}
    }
});
