//! Zstandard block decoding.

use std::io;

use super::length_mismatch;

/// Decodes a Zstandard frame into `dst`, which must be filled exactly.
pub fn decompress_block(dst: &mut [u8], src: &[u8]) -> io::Result<()> {
    let written = ::zstd::bulk::decompress_to_buffer(src, dst)?;
    if written != dst.len() {
        return Err(length_mismatch(dst.len(), written));
    }
    Ok(())
}
