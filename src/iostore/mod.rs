//! Reader for IoStore containers (`.utoc` + `.ucas`).
//!
//! An IoStore container splits its table of contents from its payload. The
//! TOC lists chunks by opaque [`ChunkId`] and maps each onto a range of an
//! uncompressed address space cut into fixed-size compression blocks. The
//! payload lives in one or more partition files next to the TOC:
//! `<name>.ucas`, `<name>_s1.ucas`, `<name>_s2.ucas`, ...
//!
//! File names are not part of the TOC proper. They come from an optional
//! [`DirectoryIndex`] that maps paths to TOC indices.
//!
//! # Example
//!
//! ```rust,no_run
//! use paktools::crypto::KeyChain;
//! use paktools::iostore::{DirectoryHandle, IoStoreReader};
//!
//! let mut reader = IoStoreReader::open("global.utoc", &KeyChain::new())?;
//! for (path, toc_index) in reader.walk(DirectoryHandle::ROOT).collect::<Vec<_>>() {
//!     let info = reader.chunk_info(toc_index)?;
//!     let data = reader.read_chunk(&info.id)?;
//!     println!("{}: {} bytes", path, data.len());
//! }
//! # Ok::<(), paktools::Error>(())
//! ```

pub mod directory;
pub mod toc;

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::crypto::{self, AesKey, KeyChain};
use crate::{Error, Result};

pub use directory::{DirectoryHandle, DirectoryIndex, DirectoryWalk};
pub use toc::{ChunkId, CompressionBlockEntry, OffsetAndLength, Toc, TocHeader};

/// Metadata of one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkInfo {
    /// The chunk identifier.
    pub id: ChunkId,
    /// Path from the directory index, or `<hex id>` if the chunk has none.
    pub file_name: String,
    /// Whether `file_name` came from the directory index.
    pub has_valid_file_name: bool,
    /// Offset in the uncompressed address space.
    pub offset: u64,
    /// Uncompressed size.
    pub size: u64,
    /// Sum of the stored sizes of the covering compression blocks.
    pub compressed_size: u64,
    /// Number of covering compression blocks.
    pub num_compressed_blocks: usize,
    /// Position in the TOC.
    pub toc_index: u32,
}

/// Returns the partition file paths for a container base path.
pub fn partition_paths(base: &Path, count: u32) -> impl Iterator<Item = PathBuf> + '_ {
    (0..count).map(move |i| {
        let mut name = base.as_os_str().to_os_string();
        if i > 0 {
            name.push(format!("_s{}", i));
        }
        name.push(".ucas");
        PathBuf::from(name)
    })
}

/// Reads chunks from an IoStore container.
pub struct IoStoreReader<R = BufReader<File>> {
    toc: Toc,
    directory: DirectoryIndex,
    partitions: Vec<R>,
    key: Option<AesKey>,
    file_names: Vec<Option<String>>,
    chunk_lookup: HashMap<ChunkId, u32>,
}

impl<R> std::fmt::Debug for IoStoreReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoStoreReader")
            .field("version", &self.toc.header.version)
            .field("chunks", &self.toc.chunk_ids.len())
            .field("partitions", &self.partitions.len())
            .field("mount_point", &self.directory.mount_point())
            .finish_non_exhaustive()
    }
}

impl IoStoreReader {
    /// Opens the container whose TOC is at `path`.
    ///
    /// The partition files are looked up next to the TOC.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingKey`] if the container declares a key that is not
    ///   in `keys`, or is encrypted and no key resolves
    /// - [`Error::InvalidFormat`] or [`Error::CorruptIndex`] for a damaged TOC
    /// - [`Error::Io`] if the TOC or a partition cannot be opened
    pub fn open(path: impl AsRef<Path>, keys: &KeyChain) -> Result<Self> {
        let path = path.as_ref();
        let toc_data = std::fs::read(path)?;
        let toc = Toc::parse(&toc_data)?;
        check_key(&toc, keys)?;

        let base = path.with_extension("");
        let mut partitions = Vec::new();
        for partition in partition_paths(&base, toc.header.partition_count) {
            log::debug!("Opening partition {}", partition.display());
            partitions.push(BufReader::new(File::open(&partition)?));
        }

        Self::from_parts(toc, partitions, keys)
    }
}

fn check_key(toc: &Toc, keys: &KeyChain) -> Result<()> {
    let guid = toc.header.encryption_key_guid;
    if guid.is_valid() && !keys.contains(&guid) {
        return Err(Error::MissingKey { guid });
    }
    Ok(())
}

impl<R: Read + Seek> IoStoreReader<R> {
    /// Creates a reader from a parsed TOC and its partition readers.
    pub fn from_parts(toc: Toc, partitions: Vec<R>, keys: &KeyChain) -> Result<Self> {
        check_key(&toc, keys)?;
        if partitions.len() < toc.header.partition_count as usize {
            return Err(Error::InvalidFormat(format!(
                "container has {} partitions but {} were provided",
                toc.header.partition_count,
                partitions.len()
            )));
        }

        let key = if toc.header.is_encrypted() {
            let guid = toc.header.encryption_key_guid;
            Some(keys.resolve(&guid).cloned().ok_or(Error::MissingKey { guid })?)
        } else {
            None
        };

        let directory = if toc.directory_index.is_empty() {
            DirectoryIndex::default()
        } else {
            let mut data = toc.directory_index.clone();
            if let Some(key) = &key {
                crypto::decrypt_in_place(key, &mut data)?;
            }
            DirectoryIndex::parse(&data).map_err(|e| Error::corrupt_index(0, e.to_string()))?
        };

        let count = toc.chunk_ids.len();
        let mut file_names = vec![None; count];
        for (path, toc_index) in directory.walk(DirectoryHandle::ROOT) {
            match file_names.get_mut(toc_index as usize) {
                Some(slot) => *slot = Some(path),
                None => log::warn!("Directory entry '{}' has invalid TOC index {}", path, toc_index),
            }
        }

        let chunk_lookup = toc
            .chunk_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i as u32))
            .collect();

        Ok(Self {
            toc,
            directory,
            partitions,
            key,
            file_names,
            chunk_lookup,
        })
    }

    /// Returns the parsed TOC.
    pub fn toc(&self) -> &Toc {
        &self.toc
    }

    /// Returns the mount point of the directory index.
    pub fn mount_point(&self) -> &str {
        self.directory.mount_point()
    }

    /// Returns the directory index.
    pub fn directory_index(&self) -> &DirectoryIndex {
        &self.directory
    }

    /// Walks the directory index below `root`, see [`DirectoryIndex::walk`].
    pub fn walk(&self, root: DirectoryHandle) -> DirectoryWalk<'_> {
        self.directory.walk(root)
    }

    /// Returns the number of chunks.
    pub fn chunk_count(&self) -> usize {
        self.toc.chunk_ids.len()
    }

    /// Returns the metadata of the chunk at `toc_index`.
    pub fn chunk_info(&self, toc_index: u32) -> Result<ChunkInfo> {
        let i = toc_index as usize;
        let (id, range) = match (self.toc.chunk_ids.get(i), self.toc.chunk_offset_lengths.get(i)) {
            (Some(id), Some(range)) => (*id, *range),
            _ => {
                return Err(Error::ChunkNotFound {
                    id: format!("TOC index {}", toc_index),
                });
            }
        };

        let blocks = self.toc.block_range(&range);
        let compressed_size = self
            .toc
            .compression_blocks
            .get(blocks.clone())
            .map(|b| b.iter().map(|b| b.compressed_size as u64).sum())
            .unwrap_or(0);

        let (file_name, has_valid_file_name) = match &self.file_names[i] {
            Some(name) => (name.clone(), true),
            None => (format!("<{}>", id), false),
        };

        Ok(ChunkInfo {
            id,
            file_name,
            has_valid_file_name,
            offset: range.offset,
            size: range.length,
            compressed_size,
            num_compressed_blocks: blocks.len(),
            toc_index,
        })
    }

    /// Iterates over the metadata of every chunk in TOC order.
    pub fn chunks(&self) -> impl Iterator<Item = Result<ChunkInfo>> + '_ {
        (0..self.chunk_count() as u32).map(move |i| self.chunk_info(i))
    }

    /// Calls `visitor` for every chunk in TOC order until it returns `false`.
    pub fn enumerate_chunks<F>(&self, mut visitor: F) -> Result<()>
    where
        F: FnMut(&ChunkInfo) -> bool,
    {
        for info in self.chunks() {
            if !visitor(&info?) {
                break;
            }
        }
        Ok(())
    }

    /// Reads the full contents of a chunk.
    ///
    /// Covering blocks are read in order, decrypted and decompressed, and
    /// the chunk's range is sliced out of them.
    pub fn read_chunk(&mut self, id: &ChunkId) -> Result<Vec<u8>> {
        let toc_index = *self.chunk_lookup.get(id).ok_or_else(|| Error::ChunkNotFound {
            id: id.to_string(),
        })?;
        let range = self.toc.chunk_offset_lengths[toc_index as usize];
        let block_size = self.toc.header.compression_block_size as u64;

        // The range must be backed by blocks before anything is reserved for it
        let blocks = self.toc.block_range(&range);
        if blocks.end > self.toc.compression_blocks.len() {
            return Err(Error::corrupt_index(
                0,
                format!(
                    "chunk {} references blocks up to {} of {}",
                    id,
                    blocks.end,
                    self.toc.compression_blocks.len()
                ),
            ));
        }
        let covered = blocks.len() as u64 * block_size;
        if range.length > covered {
            return Err(Error::corrupt_index(
                0,
                format!("chunk {} claims {} bytes but its blocks hold {}", id, range.length, covered),
            ));
        }

        let mut out = Vec::with_capacity(range.length as usize);
        let mut offset_in_block = if block_size == 0 { 0 } else { range.offset % block_size };
        let mut remaining = range.length;
        let mut compressed = Vec::new();
        let mut uncompressed = Vec::new();

        for block_index in blocks {
            let block = *self.toc.compression_blocks.get(block_index).ok_or_else(|| {
                Error::corrupt_index(0, format!("chunk {} references missing block {}", id, block_index))
            })?;
            self.read_block(&block, block_index, &mut compressed, &mut uncompressed)?;

            let start = offset_in_block as usize;
            let len = (block_size - offset_in_block).min(remaining) as usize;
            let slice = uncompressed.get(start..start + len).ok_or_else(|| {
                Error::corrupt_index(0, format!("block {} is shorter than its chunk range", block_index))
            })?;
            out.extend_from_slice(slice);
            offset_in_block = 0;
            remaining -= len as u64;
        }

        if remaining != 0 {
            return Err(Error::corrupt_index(
                0,
                format!("chunk {} is missing {} bytes", id, remaining),
            ));
        }
        Ok(out)
    }

    fn read_block(
        &mut self,
        block: &CompressionBlockEntry,
        block_index: usize,
        compressed: &mut Vec<u8>,
        uncompressed: &mut Vec<u8>,
    ) -> Result<()> {
        let partition_size = self.toc.header.partition_size;
        let partition = (block.offset / partition_size) as usize;
        let offset = block.offset % partition_size;
        let reader = self.partitions.get_mut(partition).ok_or_else(|| {
            Error::corrupt_index(0, format!("block {} is in missing partition {}", block_index, partition))
        })?;

        let stored = block.compressed_size as u64;
        let read_len = if self.key.is_some() { crypto::align_up(stored) } else { stored };
        compressed.resize(read_len as usize, 0);
        reader.seek(SeekFrom::Start(offset))?;
        reader.read_exact(compressed)?;

        if let Some(key) = &self.key {
            crypto::decrypt_in_place(key, compressed)?;
        }

        let method = self
            .toc
            .compression_methods
            .get(block.compression_method_index as usize)
            .ok_or_else(|| {
                Error::corrupt_index(
                    0,
                    format!("block {} uses unknown method {}", block_index, block.compression_method_index),
                )
            })?;

        uncompressed.resize(block.uncompressed_size as usize, 0);
        method
            .decompress(uncompressed, &compressed[..stored as usize])
            .map_err(|e| match e {
                Error::Io(io) => {
                    log::debug!("Block {} failed to decode: {}", block_index, io);
                    Error::Decompression {
                        method: method.name().to_string(),
                        block: block_index,
                    }
                }
                other => other,
            })
    }
}
