//! LZ4 raw block decoding.

use std::io;

use super::length_mismatch;

/// Decodes a raw LZ4 block into `dst`, which must be filled exactly.
pub fn decompress_block(dst: &mut [u8], src: &[u8]) -> io::Result<()> {
    let written = lz4_flex::block::decompress_into(src, dst)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    if written != dst.len() {
        return Err(length_mismatch(dst.len(), written));
    }
    Ok(())
}
