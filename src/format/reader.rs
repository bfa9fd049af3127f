//! Low-level binary reading utilities for container parsing.
//!
//! All multi-byte integers in pak and TOC files are little-endian, except the
//! 40-bit offset/length pairs of the IoStore TOC which are big-endian.

use std::io::{self, Read};

/// Upper bound on a serialized string length, in characters.
///
/// Longer strings only appear in damaged indices.
pub const MAX_STRING_LEN: usize = 64 * 1024;

const READ_CHUNK: usize = 64 * 1024;

fn invalid_data(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

/// Reads a single byte.
pub fn read_u8<R: Read>(r: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Reads an unsigned 32-bit little-endian integer.
pub fn read_u32_le<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Reads a signed 32-bit little-endian integer.
pub fn read_i32_le<R: Read>(r: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

/// Reads an unsigned 64-bit little-endian integer.
pub fn read_u64_le<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Reads a signed 64-bit little-endian integer.
pub fn read_i64_le<R: Read>(r: &mut R) -> io::Result<i64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

/// Reads a signed 64-bit size or offset and rejects negative values.
pub fn read_size<R: Read>(r: &mut R) -> io::Result<u64> {
    let value = read_i64_le(r)?;
    u64::try_from(value).map_err(|_| invalid_data(format!("negative size {}", value)))
}

/// Reads a signed 32-bit count and rejects negative values.
pub fn read_count<R: Read>(r: &mut R) -> io::Result<usize> {
    let value = read_i32_le(r)?;
    usize::try_from(value).map_err(|_| invalid_data(format!("negative count {}", value)))
}

/// Reads a 32-bit boolean, the width booleans are serialized with.
pub fn read_bool32<R: Read>(r: &mut R) -> io::Result<bool> {
    match read_u32_le(r)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(invalid_data(format!("invalid boolean value {}", other))),
    }
}

/// Reads a 40-bit big-endian integer.
pub fn read_u40_be<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 5];
    r.read_exact(&mut buf)?;
    Ok(buf.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
}

/// Reads a fixed-size byte array.
pub fn read_array<const N: usize, R: Read>(r: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

/// Reads exact number of bytes into a new vector.
///
/// The vector grows as data arrives, so a count taken from a damaged header
/// fails with `UnexpectedEof` instead of reserving the whole amount.
pub fn read_bytes<R: Read>(r: &mut R, count: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(count.min(READ_CHUNK));
    r.by_ref().take(count as u64).read_to_end(&mut buf)?;
    if buf.len() != count {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {} bytes, found {}", count, buf.len()),
        ));
    }
    Ok(buf)
}

/// Reads a length-prefixed string.
///
/// The prefix is a signed 32-bit character count that includes the trailing
/// NUL. A positive count means Latin-1 bytes follow, a negative count means
/// UTF-16LE code units follow. Zero is the empty string.
pub fn read_string<R: Read>(r: &mut R) -> io::Result<String> {
    let len = read_i32_le(r)?;
    if len == 0 {
        return Ok(String::new());
    }

    let chars = len.unsigned_abs() as usize;
    if chars > MAX_STRING_LEN {
        return Err(invalid_data(format!("string length {} is too large", len)));
    }

    let mut text = if len > 0 {
        let bytes = read_bytes(r, chars)?;
        bytes.iter().map(|&b| b as char).collect::<String>()
    } else {
        let bytes = read_bytes(r, chars * 2)?;
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16(&units).map_err(|e| invalid_data(e.to_string()))?
    };

    if !text.ends_with('\0') {
        return Err(invalid_data("string is not NUL terminated"));
    }
    text.pop();
    Ok(text)
}

/// Decodes a fixed-width NUL padded ASCII name.
pub fn fixed_name(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
