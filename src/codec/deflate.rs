//! Zlib and gzip block decoding.

use std::io::{self, Read};

use flate2::read::{GzDecoder, ZlibDecoder};

use super::length_mismatch;

/// Decodes a zlib stream into `dst`, which must be filled exactly.
pub fn decompress_zlib(dst: &mut [u8], src: &[u8]) -> io::Result<()> {
    fill_exact(ZlibDecoder::new(src), dst)
}

/// Decodes a gzip stream into `dst`, which must be filled exactly.
pub fn decompress_gzip(dst: &mut [u8], src: &[u8]) -> io::Result<()> {
    fill_exact(GzDecoder::new(src), dst)
}

fn fill_exact<R: Read>(mut decoder: R, dst: &mut [u8]) -> io::Result<()> {
    let mut filled = 0;
    while filled < dst.len() {
        match decoder.read(&mut dst[filled..])? {
            0 => return Err(length_mismatch(dst.len(), filled)),
            n => filled += n,
        }
    }

    // Trailing output means the block is longer than recorded
    let mut extra = [0u8; 1];
    if decoder.read(&mut extra)? != 0 {
        return Err(length_mismatch(dst.len(), dst.len() + 1));
    }
    Ok(())
}
