//! Pak entry descriptors.

use std::io::{self, Read};

use super::reader::{read_array, read_count, read_i32_le, read_size, read_u8, read_u32_le};
use super::{HASH_SIZE, version};

/// Upper bound on blocks per entry; larger counts only appear in damaged data.
const MAX_BLOCKS: usize = 1 << 24;

/// Byte range of one compressed block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PakCompressedBlock {
    /// Start offset of the compressed bytes.
    pub compressed_start: u64,
    /// End offset (exclusive) of the compressed bytes.
    pub compressed_end: u64,
}

impl PakCompressedBlock {
    /// Creates a block covering `start..end`.
    pub fn new(compressed_start: u64, compressed_end: u64) -> Self {
        Self {
            compressed_start,
            compressed_end,
        }
    }

    /// Returns the compressed length, zero for inverted ranges.
    pub fn len(&self) -> u64 {
        self.compressed_end.saturating_sub(self.compressed_start)
    }

    /// Returns `true` if the block covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Metadata for one file stored in a pak.
///
/// The same record is stored twice: once in the index and once in front of
/// the payload. [`PakEntry::index_data_eq`] compares the two copies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PakEntry {
    /// Absolute offset of the entry header.
    pub offset: u64,
    /// Stored payload size (compressed, unpadded).
    pub size: u64,
    /// Size after decompression.
    pub uncompressed_size: u64,
    /// Index into the archive's compression method table; 0 means none.
    pub compression_method_index: u32,
    /// SHA-1 of the stored payload.
    pub hash: [u8; HASH_SIZE],
    /// Compressed block ranges, in payload order.
    pub compression_blocks: Vec<PakCompressedBlock>,
    /// Uncompressed size of every block but the last.
    pub compression_block_size: u32,
    /// Entry flags, see [`PakEntry::FLAG_ENCRYPTED`].
    pub flags: u8,
}

impl PakEntry {
    /// The payload is AES encrypted.
    pub const FLAG_ENCRYPTED: u8 = 0x01;
    /// The entry is a delete record.
    pub const FLAG_DELETED: u8 = 0x02;

    /// Returns `true` if the payload is encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.flags & Self::FLAG_ENCRYPTED != 0
    }

    /// Returns `true` if the entry is a delete record.
    pub fn is_delete_record(&self) -> bool {
        self.flags & Self::FLAG_DELETED != 0
    }

    /// Returns `true` if the payload is compressed.
    pub fn is_compressed(&self) -> bool {
        self.compression_method_index != 0
    }

    /// Returns the size of the serialized header for `version`.
    pub fn serialized_size(&self, version: u32) -> u64 {
        // offset + size + uncompressed size + hash + method
        let mut size = 8 + 8 + 8 + HASH_SIZE as u64 + 4;
        if version >= version::COMPRESSION_ENCRYPTION {
            size += 1 + 4;
            if self.is_compressed() {
                size += 4 + 16 * self.compression_blocks.len() as u64;
            }
        }
        if version < version::NO_TIMESTAMPS {
            size += 8;
        }
        size
    }

    /// Reads a serialized entry header.
    ///
    /// Before version 8 the method is a bit set, which is mapped onto the
    /// legacy method table (`Zlib`, `Gzip`, `Oodle`).
    pub fn read_from<R: Read>(r: &mut R, version: u32) -> io::Result<Self> {
        let offset = read_size(r)?;
        let size = read_size(r)?;
        let uncompressed_size = read_size(r)?;

        let compression_method_index = if version >= version::FNAME_BASED_COMPRESSION_METHOD {
            read_u32_le(r)?
        } else {
            legacy_method_index(read_i32_le(r)?)
        };

        if version < version::NO_TIMESTAMPS {
            let _timestamp = read_array::<8, _>(r)?;
        }

        let hash = read_array::<HASH_SIZE, _>(r)?;

        let mut entry = Self {
            offset,
            size,
            uncompressed_size,
            compression_method_index,
            hash,
            ..Self::default()
        };

        if version >= version::COMPRESSION_ENCRYPTION {
            if entry.is_compressed() {
                let count = read_count(r)?;
                if count > MAX_BLOCKS {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("entry has {} compression blocks", count),
                    ));
                }
                entry.compression_blocks = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    let start = read_size(r)?;
                    let end = read_size(r)?;
                    entry
                        .compression_blocks
                        .push(PakCompressedBlock::new(start, end));
                }
            }
            entry.flags = read_u8(r)?;
            entry.compression_block_size = read_u32_le(r)?;
        }

        Ok(entry)
    }

    /// Compares the fields that both copies of a descriptor must agree on.
    ///
    /// The offset is excluded because the header in front of the payload
    /// does not repeat the absolute offset. The hash is excluded because
    /// encoded index entries do not store it.
    pub fn index_data_eq(&self, other: &PakEntry) -> bool {
        self.size == other.size
            && self.uncompressed_size == other.uncompressed_size
            && self.compression_method_index == other.compression_method_index
            && self.flags == other.flags
            && self.compression_block_size == other.compression_block_size
            && self.compression_blocks == other.compression_blocks
    }

    /// Returns the uncompressed length of block `index`.
    ///
    /// Every block holds `compression_block_size` bytes except the last,
    /// which holds the remainder.
    pub fn block_uncompressed_len(&self, index: usize) -> u64 {
        let block_size = self.compression_block_size as u64;
        let consumed = block_size.saturating_mul(index as u64);
        self.uncompressed_size.saturating_sub(consumed).min(block_size)
    }
}

fn legacy_method_index(flags: i32) -> u32 {
    const ZLIB: i32 = 0x01;
    const GZIP: i32 = 0x02;
    const CUSTOM: i32 = 0x04;

    if flags == 0 {
        0
    } else if flags & ZLIB != 0 {
        1
    } else if flags & GZIP != 0 {
        2
    } else if flags & CUSTOM != 0 {
        3
    } else {
        // Unknown bits; index past the legacy table so lookups fail
        u32::MAX
    }
}
