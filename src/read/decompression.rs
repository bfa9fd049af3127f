//! Entry payload transfer.
//!
//! Stored payloads come in two shapes. Uncompressed entries are a single
//! run of bytes, encrypted as a whole when the entry is encrypted.
//! Compressed entries are a sequence of independently compressed blocks,
//! each encrypted on its own. Both shapes pad encrypted data to the AES
//! block size, so reads are rounded up while writes use the logical length.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::crypto::{KeyChain, align_down, align_up, decrypt_in_place};
use crate::format::{PakEntry, PakInfo};
use crate::{Error, Result};

/// A grow-only byte buffer reused across the entries of one archive pass.
///
/// Holds the compressed input of one block followed by its decompressed
/// output.
#[derive(Debug, Default)]
pub struct ScratchBuffer {
    data: Vec<u8>,
}

impl ScratchBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current size of the buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if no memory has been allocated yet.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns a slice of at least `len` bytes, growing the buffer if needed.
    ///
    /// The buffer never shrinks.
    pub fn ensure(&mut self, len: usize) -> &mut [u8] {
        if self.data.len() < len {
            log::debug!("Growing scratch buffer from {} to {} bytes", self.data.len(), len);
            self.data.resize(len, 0);
        }
        &mut self.data[..len]
    }
}

/// Largest block, compressed or not, that a pak entry may declare.
const MAX_BLOCK_LEN: u64 = i32::MAX as u64;

fn invalid_data(msg: String) -> Error {
    Error::Io(io::Error::new(io::ErrorKind::InvalidData, msg))
}

/// Copies an uncompressed entry payload from `source` to `dest`.
///
/// `source` must be positioned at the first payload byte. `buffer` is used
/// in multiples of the AES block size; encrypted entries are decrypted with
/// the principal key. Returns the number of bytes written, which always
/// equals `entry.size` on success.
///
/// # Errors
///
/// - [`Error::NoDecryptionKey`] if the entry is encrypted and the key chain
///   has no principal key
/// - [`Error::Io`] if `buffer` is smaller than one AES block or a read or
///   write fails
pub fn copy_plain<R, W>(
    dest: &mut W,
    source: &mut R,
    entry: &PakEntry,
    buffer: &mut [u8],
    keys: &KeyChain,
) -> Result<u64>
where
    R: Read,
    W: Write,
{
    let chunk_len = align_down(buffer.len());
    if chunk_len == 0 {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("copy buffer of {} bytes is smaller than one AES block", buffer.len()),
        )));
    }
    let buffer = &mut buffer[..chunk_len];

    let key = if entry.is_encrypted() {
        Some(keys.principal().ok_or(Error::NoDecryptionKey)?)
    } else {
        None
    };

    let mut remaining = entry.size;
    while remaining > 0 {
        let wanted = remaining.min(chunk_len as u64) as usize;
        let read_len = match key {
            Some(_) => align_up(wanted as u64) as usize,
            None => wanted,
        };

        let chunk = &mut buffer[..read_len];
        source.read_exact(chunk)?;
        if let Some(key) = key {
            decrypt_in_place(key, chunk)?;
        }
        dest.write_all(&chunk[..wanted])?;
        remaining -= wanted as u64;
    }

    Ok(entry.size)
}

/// Decompresses a block-compressed entry from `source` into `dest`.
///
/// Blocks are processed in order and written as soon as they decode, so a
/// failing block leaves every preceding block in `dest`. Encrypted blocks
/// are decrypted with the archive's key, falling back to the principal key.
/// Returns the number of bytes written.
///
/// # Errors
///
/// - [`Error::UnsupportedMethod`] if the entry's method is unknown or has
///   no decoder in this build
/// - [`Error::NoDecryptionKey`] if the entry is encrypted and no key resolves
/// - [`Error::Decompression`] if a block fails to decode
/// - [`Error::Io`] if the block table is inconsistent or I/O fails
pub fn copy_compressed<R, W>(
    dest: &mut W,
    source: &mut R,
    entry: &PakEntry,
    scratch: &mut ScratchBuffer,
    keys: &KeyChain,
    info: &PakInfo,
) -> Result<u64>
where
    R: Read + Seek,
    W: Write,
{
    if entry.uncompressed_size == 0 {
        return Ok(0);
    }

    let method = info
        .compression_method(entry.compression_method_index)
        .ok_or_else(|| Error::unsupported_method(format!("#{}", entry.compression_method_index)))?;
    if !method.is_supported() {
        return Err(Error::unsupported_method(method.name()));
    }

    let block_size = entry.compression_block_size as u64;
    if block_size == 0 {
        return Err(invalid_data("compressed entry has a zero block size".into()));
    }
    let expected_blocks = entry.uncompressed_size.div_ceil(block_size);
    if entry.compression_blocks.len() as u64 != expected_blocks {
        return Err(invalid_data(format!(
            "entry lists {} compression blocks, expected {}",
            entry.compression_blocks.len(),
            expected_blocks
        )));
    }

    let key = if entry.is_encrypted() {
        Some(
            keys.resolve(&info.encryption_key_guid)
                .ok_or(Error::NoDecryptionKey)?,
        )
    } else {
        None
    };

    // Block sizes come from the index and must fit in the entry before the
    // scratch buffer is sized from them
    let output_len = block_size.min(entry.uncompressed_size);
    if output_len > MAX_BLOCK_LEN {
        return Err(invalid_data(format!(
            "compression block size {} is too large",
            entry.compression_block_size
        )));
    }
    let block_limit = entry.size.min(MAX_BLOCK_LEN);
    if let Some((index, block)) = entry
        .compression_blocks
        .iter()
        .enumerate()
        .find(|(_, block)| block.len() > block_limit)
    {
        return Err(invalid_data(format!(
            "compression block {} spans {} bytes, entry holds {}",
            index,
            block.len(),
            entry.size
        )));
    }

    let largest_block = entry
        .compression_blocks
        .iter()
        .map(|block| align_up(block.len()))
        .max()
        .unwrap_or(0);
    let input_len = usize::try_from(method.compress_bound(output_len).max(largest_block))
        .map_err(|_| invalid_data("compression block is too large".into()))?;
    let output_len = output_len as usize;
    let working = scratch.ensure(input_len + output_len);
    let (input, output) = working.split_at_mut(input_len);

    let base = if info.has_relative_compressed_chunk_offsets() {
        entry.offset
    } else {
        0
    };

    let mut written = 0u64;
    for (index, block) in entry.compression_blocks.iter().enumerate() {
        let compressed_len = block.len() as usize;
        let uncompressed_len = entry.block_uncompressed_len(index) as usize;
        let read_len = match key {
            Some(_) => align_up(compressed_len as u64) as usize,
            None => compressed_len,
        };

        source.seek(SeekFrom::Start(base + block.compressed_start))?;
        let raw = &mut input[..read_len];
        source.read_exact(raw)?;
        if let Some(key) = key {
            decrypt_in_place(key, raw)?;
        }

        let out = &mut output[..uncompressed_len];
        method
            .decompress(out, &raw[..compressed_len])
            .map_err(|e| match e {
                Error::Io(_) => Error::Decompression {
                    method: method.name().to_string(),
                    block: index,
                },
                other => other,
            })?;
        dest.write_all(out)?;
        written += uncompressed_len as u64;
    }

    Ok(written)
}
