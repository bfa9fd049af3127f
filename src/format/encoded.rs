//! Bit-packed entry records used by version 10+ indices.
//!
//! Every record starts with a 32-bit flags word:
//!
//! | Bits | Meaning |
//! |------|---------|
//! | 31 | offset fits in 32 bits |
//! | 30 | uncompressed size fits in 32 bits |
//! | 29 | size fits in 32 bits (compressed entries only) |
//! | 23-28 | compression method index |
//! | 22 | encrypted |
//! | 6-21 | block count |
//! | 0-5 | block size in 2 KiB units, `0x3f` if an explicit `u32` follows |
//!
//! The fields follow in order: explicit block size, offset, uncompressed
//! size, size, then one `u32` per block giving its compressed length. Block
//! ranges are not stored; they are derived from the header size and the
//! block lengths.

use std::io::{self, Cursor, Read};

use super::entry::{PakCompressedBlock, PakEntry};
use super::reader::{read_size, read_u32_le};
use crate::crypto::AES_BLOCK_SIZE;

const OFFSET_32_BIT: u32 = 1 << 31;
const UNCOMPRESSED_SIZE_32_BIT: u32 = 1 << 30;
const SIZE_32_BIT: u32 = 1 << 29;
const METHOD_SHIFT: u32 = 23;
const METHOD_MASK: u32 = 0x3f;
const ENCRYPTED: u32 = 1 << 22;
const BLOCK_COUNT_SHIFT: u32 = 6;
const BLOCK_COUNT_MASK: u32 = 0xffff;
const BLOCK_SIZE_MASK: u32 = 0x3f;
const BLOCK_SIZE_SHIFT: u32 = 11;

fn read_var<R: Read>(r: &mut R, is_32_bit: bool) -> io::Result<u64> {
    if is_32_bit {
        read_u32_le(r).map(u64::from)
    } else {
        read_size(r)
    }
}

fn checked_add(a: u64, b: u64) -> io::Result<u64> {
    a.checked_add(b)
        .filter(|sum| *sum <= i64::MAX as u64)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "encoded entry block range overflows"))
}

/// Decodes the record starting at `data[0]`.
///
/// Returns the entry and the number of bytes the record occupies.
/// `relative_offsets` selects whether derived block ranges are relative to
/// the entry start or absolute.
pub fn decode_entry(data: &[u8], version: u32, relative_offsets: bool) -> io::Result<(PakEntry, usize)> {
    let mut r = Cursor::new(data);
    let bits = read_u32_le(&mut r)?;

    let block_size = if bits & BLOCK_SIZE_MASK == BLOCK_SIZE_MASK {
        read_u32_le(&mut r)?
    } else {
        (bits & BLOCK_SIZE_MASK) << BLOCK_SIZE_SHIFT
    };

    let offset = read_var(&mut r, bits & OFFSET_32_BIT != 0)?;
    let uncompressed_size = read_var(&mut r, bits & UNCOMPRESSED_SIZE_32_BIT != 0)?;
    let compression_method_index = (bits >> METHOD_SHIFT) & METHOD_MASK;
    let size = if compression_method_index != 0 {
        read_var(&mut r, bits & SIZE_32_BIT != 0)?
    } else {
        uncompressed_size
    };

    let encrypted = bits & ENCRYPTED != 0;
    let block_count = ((bits >> BLOCK_COUNT_SHIFT) & BLOCK_COUNT_MASK) as usize;

    let mut entry = PakEntry {
        offset,
        size,
        uncompressed_size,
        compression_method_index,
        flags: if encrypted { PakEntry::FLAG_ENCRYPTED } else { 0 },
        ..PakEntry::default()
    };

    if block_count > 0 {
        // A single block spans the whole file
        entry.compression_block_size = if block_count == 1 {
            u32::try_from(uncompressed_size).unwrap_or(block_size)
        } else {
            block_size
        };
        entry.compression_blocks = vec![PakCompressedBlock::default(); block_count];
    }

    let base = if relative_offsets { 0 } else { offset };
    let header_size = entry.serialized_size(version);

    if block_count == 1 && !encrypted {
        let start = checked_add(base, header_size)?;
        entry.compression_blocks[0] = PakCompressedBlock::new(start, checked_add(start, size)?);
    } else if block_count > 0 {
        let alignment = if encrypted { AES_BLOCK_SIZE as u64 } else { 1 };
        let mut cursor = checked_add(base, header_size)?;
        for block in entry.compression_blocks.iter_mut() {
            let len = u64::from(read_u32_le(&mut r)?);
            *block = PakCompressedBlock::new(cursor, checked_add(cursor, len)?);
            cursor = checked_add(cursor, len.div_ceil(alignment) * alignment)?;
        }
    }

    Ok((entry, r.position() as usize))
}
