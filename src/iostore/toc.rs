//! The IoStore table of contents (`.utoc`).

use std::fmt;
use std::io::{self, Cursor, Read};

use crate::codec::CompressionMethod;
use crate::crypto::Guid;
use crate::format::reader::{
    fixed_name, read_array, read_bytes, read_i32_le, read_u8, read_u32_le, read_u40_be,
    read_u64_le,
};
use crate::{Error, Result};

/// Magic bytes at the start of every TOC file.
pub const TOC_MAGIC: &[u8; 16] = b"-==--==--==--==-";

/// Serialized size of the TOC header.
pub const TOC_HEADER_SIZE: u32 = 144;

/// Serialized size of one compression block entry.
pub const COMPRESSION_BLOCK_ENTRY_SIZE: u32 = 12;

/// TOC versions and the features they introduced.
pub mod version {
    /// First released version.
    pub const INITIAL: u8 = 1;
    /// Directory index.
    pub const DIRECTORY_INDEX: u8 = 2;
    /// Partitioned payload files.
    pub const PARTITION_SIZE: u8 = 3;
    /// Perfect hash chunk lookup.
    pub const PERFECT_HASH: u8 = 4;
    /// Perfect hash with overflow list.
    pub const PERFECT_HASH_WITH_OVERFLOW: u8 = 5;
    /// On-demand metadata.
    pub const ON_DEMAND_META_DATA: u8 = 6;
    /// On-demand metadata removed.
    pub const REMOVED_ON_DEMAND_META_DATA: u8 = 7;
    /// Chunk hashes replaced.
    pub const REPLACE_IO_CHUNK_HASH_WITH_IO_HASH: u8 = 8;
    /// Newest version this crate reads.
    pub const LATEST: u8 = REPLACE_IO_CHUNK_HASH_WITH_IO_HASH;
}

/// Container flag bits.
pub mod flags {
    /// Payload blocks are compressed.
    pub const COMPRESSED: u8 = 1 << 0;
    /// Payload blocks and directory index are encrypted.
    pub const ENCRYPTED: u8 = 1 << 1;
    /// Block signatures are present.
    pub const SIGNED: u8 = 1 << 2;
    /// A directory index is present.
    pub const INDEXED: u8 = 1 << 3;
}

/// A 12-byte chunk identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChunkId([u8; 12]);

impl ChunkId {
    /// Creates a chunk id from its raw bytes.
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Returns the chunk type stored in the last byte.
    pub fn chunk_type(&self) -> u8 {
        self.0[11]
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

impl fmt::Debug for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkId({})", self)
    }
}

/// Position of a chunk in the uncompressed address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OffsetAndLength {
    /// Offset of the first byte.
    pub offset: u64,
    /// Length in bytes.
    pub length: u64,
}

/// One compression block of the payload files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompressionBlockEntry {
    /// Offset in the partitioned payload address space.
    pub offset: u64,
    /// Stored size, before AES padding.
    pub compressed_size: u32,
    /// Size after decompression.
    pub uncompressed_size: u32,
    /// Index into the method table; 0 means none.
    pub compression_method_index: u8,
}

impl CompressionBlockEntry {
    fn parse(bytes: &[u8; 12]) -> Self {
        let mut offset = [0u8; 8];
        offset[..5].copy_from_slice(&bytes[0..5]);
        let size24 = |b: &[u8]| u32::from_le_bytes([b[0], b[1], b[2], 0]);
        Self {
            offset: u64::from_le_bytes(offset),
            compressed_size: size24(&bytes[5..8]),
            uncompressed_size: size24(&bytes[8..11]),
            compression_method_index: bytes[11],
        }
    }
}

/// The fixed-size TOC header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocHeader {
    /// Format version.
    pub version: u8,
    /// Number of chunks.
    pub entry_count: u32,
    /// Number of compression blocks.
    pub compressed_block_entry_count: u32,
    /// Number of compression method names.
    pub compression_method_name_count: u32,
    /// Width of each compression method name.
    pub compression_method_name_length: u32,
    /// Uncompressed size of every compression block but the last.
    pub compression_block_size: u32,
    /// Size of the directory index in bytes.
    pub directory_index_size: u32,
    /// Number of payload partitions.
    pub partition_count: u32,
    /// Container identifier.
    pub container_id: u64,
    /// Identifier of the key that encrypts this container.
    pub encryption_key_guid: Guid,
    /// Container flags, see [`flags`].
    pub container_flags: u8,
    /// Number of perfect hash seeds.
    pub perfect_hash_seeds_count: u32,
    /// Maximum size of one partition file.
    pub partition_size: u64,
    /// Number of chunks outside the perfect hash.
    pub chunks_without_perfect_hash_count: u32,
}

impl TocHeader {
    fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let magic = read_array::<16, _>(r)?;
        if &magic != TOC_MAGIC {
            return Err(Error::InvalidFormat("not an IoStore TOC file".into()));
        }

        let version = read_u8(r)?;
        let _reserved0 = read_u8(r)?;
        let _reserved1 = read_array::<2, _>(r)?;
        let header_size = read_u32_le(r)?;
        let entry_count = read_u32_le(r)?;
        let compressed_block_entry_count = read_u32_le(r)?;
        let compressed_block_entry_size = read_u32_le(r)?;
        let compression_method_name_count = read_u32_le(r)?;
        let compression_method_name_length = read_u32_le(r)?;
        let compression_block_size = read_u32_le(r)?;
        let directory_index_size = read_u32_le(r)?;
        let partition_count = read_u32_le(r)?;
        let container_id = read_u64_le(r)?;
        let encryption_key_guid = Guid::read_from(r)?;
        let container_flags = read_u8(r)?;
        let _reserved3 = read_u8(r)?;
        let _reserved4 = read_array::<2, _>(r)?;
        let perfect_hash_seeds_count = read_u32_le(r)?;
        let partition_size = read_u64_le(r)?;
        let chunks_without_perfect_hash_count = read_u32_le(r)?;
        let _reserved7 = read_u32_le(r)?;
        let _reserved8 = read_array::<40, _>(r)?;

        if version == 0 || version > version::LATEST {
            return Err(Error::UnsupportedVersion {
                version: version as u32,
            });
        }
        if header_size != TOC_HEADER_SIZE {
            return Err(Error::InvalidFormat(format!(
                "TOC header size {} is not {}",
                header_size, TOC_HEADER_SIZE
            )));
        }
        if compressed_block_entry_size != COMPRESSION_BLOCK_ENTRY_SIZE {
            return Err(Error::InvalidFormat(format!(
                "compression block entry size {} is not {}",
                compressed_block_entry_size, COMPRESSION_BLOCK_ENTRY_SIZE
            )));
        }
        if compressed_block_entry_count > 0 && compression_block_size == 0 {
            return Err(Error::InvalidFormat("compression block size is zero".into()));
        }

        let (partition_count, partition_size) = if version < version::PARTITION_SIZE {
            (1, u64::MAX)
        } else {
            (partition_count.max(1), if partition_size == 0 { u64::MAX } else { partition_size })
        };

        Ok(Self {
            version,
            entry_count,
            compressed_block_entry_count,
            compression_method_name_count,
            compression_method_name_length,
            compression_block_size,
            directory_index_size,
            partition_count,
            container_id,
            encryption_key_guid,
            container_flags,
            perfect_hash_seeds_count,
            partition_size,
            chunks_without_perfect_hash_count,
        })
    }

    /// Returns `true` if payload blocks are encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.container_flags & flags::ENCRYPTED != 0
    }

    /// Returns `true` if block signatures follow the method table.
    pub fn is_signed(&self) -> bool {
        self.container_flags & flags::SIGNED != 0
    }

    /// Returns `true` if the container carries a directory index.
    pub fn is_indexed(&self) -> bool {
        self.container_flags & flags::INDEXED != 0
    }
}

/// A parsed TOC file.
#[derive(Debug, Clone)]
pub struct Toc {
    /// The TOC header.
    pub header: TocHeader,
    /// Chunk ids, by TOC index.
    pub chunk_ids: Vec<ChunkId>,
    /// Chunk positions, by TOC index.
    pub chunk_offset_lengths: Vec<OffsetAndLength>,
    /// Compression blocks in payload order.
    pub compression_blocks: Vec<CompressionBlockEntry>,
    /// Compression methods; index 0 is always [`CompressionMethod::None`].
    pub compression_methods: Vec<CompressionMethod>,
    /// The raw (possibly encrypted) directory index.
    pub directory_index: Vec<u8>,
}

impl Toc {
    /// Parses a complete TOC file held in memory.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = Cursor::new(data);
        let header = TocHeader::read_from(&mut r).map_err(|e| match e {
            Error::Io(io) if io.kind() == io::ErrorKind::UnexpectedEof => {
                Error::InvalidFormat("TOC file is truncated".into())
            }
            other => other,
        })?;

        let section = |what: &str| {
            let what = what.to_string();
            move |e: io::Error| Error::corrupt_index(0, format!("{}: {}", what, e))
        };

        let remaining = data.len() as u64;
        let table_bytes = header.entry_count as u64 * (12 + 10)
            + header.compressed_block_entry_count as u64 * COMPRESSION_BLOCK_ENTRY_SIZE as u64;
        if table_bytes > remaining {
            return Err(Error::corrupt_index(
                TOC_HEADER_SIZE as u64,
                format!("{} chunks do not fit in {} bytes", header.entry_count, remaining),
            ));
        }

        let mut chunk_ids = Vec::with_capacity(header.entry_count as usize);
        for _ in 0..header.entry_count {
            chunk_ids.push(ChunkId(read_array::<12, _>(&mut r).map_err(section("chunk ids"))?));
        }

        let mut chunk_offset_lengths = Vec::with_capacity(header.entry_count as usize);
        for _ in 0..header.entry_count {
            let offset = read_u40_be(&mut r).map_err(section("chunk offsets"))?;
            let length = read_u40_be(&mut r).map_err(section("chunk offsets"))?;
            chunk_offset_lengths.push(OffsetAndLength { offset, length });
        }

        // Perfect hash tables; chunk lookup here is by map
        let mut skip = 0u64;
        if header.version >= version::PERFECT_HASH {
            skip += header.perfect_hash_seeds_count as u64 * 4;
        }
        if header.version >= version::PERFECT_HASH_WITH_OVERFLOW {
            skip += header.chunks_without_perfect_hash_count as u64 * 4;
        }
        skip_bytes(&mut r, skip).map_err(section("perfect hash seeds"))?;

        let mut compression_blocks = Vec::with_capacity(header.compressed_block_entry_count as usize);
        for _ in 0..header.compressed_block_entry_count {
            let raw = read_array::<12, _>(&mut r).map_err(section("compression blocks"))?;
            compression_blocks.push(CompressionBlockEntry::parse(&raw));
        }

        let mut compression_methods = vec![CompressionMethod::None];
        for _ in 0..header.compression_method_name_count {
            let raw = read_bytes(&mut r, header.compression_method_name_length as usize)
                .map_err(section("compression methods"))?;
            compression_methods.push(CompressionMethod::from_name(&fixed_name(&raw)));
        }

        if header.is_signed() {
            let hash_size = read_i32_le(&mut r).map_err(section("signatures"))?;
            let hash_size = u64::try_from(hash_size)
                .map_err(|_| Error::corrupt_index(r.position(), "negative signature size"))?;
            let block_hashes = header.compressed_block_entry_count as u64 * 20;
            skip_bytes(&mut r, hash_size * 2 + block_hashes).map_err(section("signatures"))?;
        }

        let directory_index = if header.is_indexed()
            && header.version >= version::DIRECTORY_INDEX
            && header.directory_index_size > 0
        {
            read_bytes(&mut r, header.directory_index_size as usize)
                .map_err(section("directory index"))?
        } else {
            Vec::new()
        };

        Ok(Self {
            header,
            chunk_ids,
            chunk_offset_lengths,
            compression_blocks,
            compression_methods,
            directory_index,
        })
    }

    /// Returns the indices of the compression blocks covering `range`.
    pub fn block_range(&self, range: &OffsetAndLength) -> std::ops::Range<usize> {
        let block_size = self.header.compression_block_size as u64;
        if block_size == 0 || range.length == 0 {
            let first = if block_size == 0 { 0 } else { (range.offset / block_size) as usize };
            return first..first;
        }
        let first = range.offset / block_size;
        let last = (range.offset + range.length - 1) / block_size;
        first as usize..last as usize + 1
    }
}

fn skip_bytes<R: Read>(r: &mut R, count: u64) -> io::Result<()> {
    let skipped = io::copy(&mut r.take(count), &mut io::sink())?;
    if skipped != count {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "section extends past end of file",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(version: u8, entries: u32, blocks: u32, flags: u8) -> Vec<u8> {
        let mut out = TOC_MAGIC.to_vec();
        out.push(version);
        out.extend_from_slice(&[0, 0, 0]);
        for v in [TOC_HEADER_SIZE, entries, blocks, 12, 1, 32, 0x10000, 0, 1] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out.extend_from_slice(&7u64.to_le_bytes());
        out.extend_from_slice(&[0u8; 16]);
        out.push(flags);
        out.extend_from_slice(&[0, 0, 0]);
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&u64::MAX.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&[0u8; 40]);
        out
    }

    #[test]
    fn test_header_size() {
        assert_eq!(header_bytes(3, 0, 0, 0).len(), TOC_HEADER_SIZE as usize);
    }

    #[test]
    fn test_parse_minimal_toc() {
        let mut data = header_bytes(3, 1, 1, flags::COMPRESSED);
        data.extend_from_slice(&[0xAB; 12]);
        data.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0, 0, 100]);
        // block: offset 0x10, compressed 50, uncompressed 100, method 1
        data.extend_from_slice(&[0x10, 0, 0, 0, 0, 50, 0, 0, 100, 0, 0, 1]);
        let mut name = [0u8; 32];
        name[..4].copy_from_slice(b"Zlib");
        data.extend_from_slice(&name);

        let toc = Toc::parse(&data).unwrap();
        assert_eq!(toc.chunk_ids[0].to_string(), "AB".repeat(12));
        assert_eq!(toc.chunk_offset_lengths[0].length, 100);
        assert_eq!(
            toc.compression_blocks[0],
            CompressionBlockEntry {
                offset: 0x10,
                compressed_size: 50,
                uncompressed_size: 100,
                compression_method_index: 1,
            }
        );
        assert_eq!(toc.compression_methods[1], CompressionMethod::Zlib);
        assert!(toc.directory_index.is_empty());
    }

    #[test]
    fn test_bad_magic() {
        let mut data = header_bytes(3, 0, 0, 0);
        data[0] = b'x';
        assert!(matches!(Toc::parse(&data), Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_unsupported_version() {
        let data = header_bytes(9, 0, 0, 0);
        assert!(matches!(
            Toc::parse(&data),
            Err(Error::UnsupportedVersion { version: 9 })
        ));
    }

    #[test]
    fn test_truncated_tables() {
        let data = header_bytes(3, 1000, 0, 0);
        assert!(matches!(Toc::parse(&data), Err(Error::CorruptIndex { .. })));
        assert!(matches!(Toc::parse(&data[..20]), Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_old_versions_have_one_partition() {
        let toc = Toc::parse(&header_bytes(2, 0, 0, 0)).unwrap();
        assert_eq!(toc.header.partition_count, 1);
        assert_eq!(toc.header.partition_size, u64::MAX);
    }

    #[test]
    fn test_block_range() {
        let toc = Toc::parse(&header_bytes(3, 0, 0, 0)).unwrap();
        let range = |offset, length| toc.block_range(&OffsetAndLength { offset, length });
        assert_eq!(range(0, 0x10000), 0..1);
        assert_eq!(range(0, 0x10001), 0..2);
        assert_eq!(range(0x18000, 0x10000), 1..3);
        assert_eq!(range(0x20000, 0), 2..2);
    }
}
