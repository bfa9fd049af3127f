//! The pak footer.

use std::io::{Cursor, Read, Seek, SeekFrom};

use super::reader::{fixed_name, read_array, read_i32_le, read_size, read_u8, read_u32_le};
use super::{
    COMPRESSION_METHOD_NAME_LEN, HASH_SIZE, LEGACY_COMPRESSION_METHODS, MAX_COMPRESSION_METHODS, PAK_MAGIC,
    version,
};
use crate::codec::CompressionMethod;
use crate::crypto::Guid;
use crate::{Error, Result};

/// Method table used before compression methods were named in the footer.
///
/// Index 0 is always "no compression".
const LEGACY_METHODS: [CompressionMethod; 4] = [
    CompressionMethod::None,
    CompressionMethod::Zlib,
    CompressionMethod::Gzip,
    CompressionMethod::Oodle,
];

/// Archive-level metadata read from the pak footer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PakInfo {
    /// Format version.
    pub version: u32,
    /// Identifier of the key that encrypts this archive, zero if none.
    pub encryption_key_guid: Guid,
    /// Whether the index is encrypted.
    pub encrypted_index: bool,
    /// Absolute offset of the index.
    pub index_offset: u64,
    /// Size of the index in bytes, padded when encrypted.
    pub index_size: u64,
    /// SHA-1 of the decrypted index bytes.
    pub index_hash: [u8; HASH_SIZE],
    /// Whether the index is frozen (version 9 only).
    pub index_is_frozen: bool,
    /// Compression methods; index 0 is always [`CompressionMethod::None`].
    pub compression_methods: Vec<CompressionMethod>,
}

impl PakInfo {
    /// Returns the serialized footer size for `version`.
    pub fn serialized_size(version: u32) -> u64 {
        Self::footer_len(version, MAX_COMPRESSION_METHODS)
    }

    /// Footer layouts from newest to oldest, with their method name counts.
    ///
    /// Version 8 footers were written with four method names before the
    /// fifth slot was added, so that version has two layouts.
    fn layouts() -> impl Iterator<Item = (u32, usize)> {
        (version::INITIAL..=version::LATEST).rev().flat_map(|v| {
            let slots: &[usize] = if v == version::FNAME_BASED_COMPRESSION_METHOD {
                &[MAX_COMPRESSION_METHODS, LEGACY_COMPRESSION_METHODS]
            } else if v > version::FNAME_BASED_COMPRESSION_METHOD {
                &[MAX_COMPRESSION_METHODS]
            } else {
                &[0]
            };
            slots.iter().map(move |&n| (v, n))
        })
    }

    fn footer_len(version: u32, method_slots: usize) -> u64 {
        // encrypted flag + magic + version + offset + size + hash
        let mut size = 1 + 4 + 4 + 8 + 8 + HASH_SIZE as u64;
        if version >= version::ENCRYPTION_KEY_GUID {
            size += 16;
        }
        if version == version::FROZEN_INDEX {
            size += 1;
        }
        if version >= version::FNAME_BASED_COMPRESSION_METHOD {
            size += (COMPRESSION_METHOD_NAME_LEN * method_slots) as u64;
        }
        size
    }

    /// Locates and reads the footer at the end of `reader`.
    ///
    /// Layouts are tried from newest to oldest; the first one whose magic
    /// and version fields agree wins.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] if no layout matches, or if the
    /// index region lies outside the file.
    pub fn read_from<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let file_len = reader.seek(SeekFrom::End(0))?;

        for (candidate, method_slots) in Self::layouts() {
            let footer_len = Self::footer_len(candidate, method_slots);
            if footer_len > file_len {
                continue;
            }
            reader.seek(SeekFrom::Start(file_len - footer_len))?;
            let mut bytes = vec![0u8; footer_len as usize];
            reader.read_exact(&mut bytes)?;

            if let Some(info) = Self::parse(&bytes, candidate, method_slots)? {
                info.validate(file_len)?;
                log::debug!(
                    "Pak footer: version {} ({} method slots), index at {:#x} ({} bytes)",
                    info.version,
                    method_slots,
                    info.index_offset,
                    info.index_size
                );
                return Ok(info);
            }
        }

        Err(Error::InvalidFormat(
            "no pak footer with a valid magic value".into(),
        ))
    }

    fn parse(bytes: &[u8], candidate: u32, method_slots: usize) -> Result<Option<Self>> {
        let mut r = Cursor::new(bytes);
        let encryption_key_guid = if candidate >= version::ENCRYPTION_KEY_GUID {
            Guid::read_from(&mut r)?
        } else {
            Guid::ZERO
        };
        let encrypted_index = read_u8(&mut r)? != 0;
        let magic = read_u32_le(&mut r)?;
        let version = read_i32_le(&mut r)?;
        if magic != PAK_MAGIC || version != candidate as i32 {
            return Ok(None);
        }

        let index_offset = read_size(&mut r)?;
        let index_size = read_size(&mut r)?;
        let index_hash = read_array::<HASH_SIZE, _>(&mut r)?;
        let index_is_frozen = candidate == version::FROZEN_INDEX && read_u8(&mut r)? != 0;

        let compression_methods = if candidate >= version::FNAME_BASED_COMPRESSION_METHOD {
            let mut methods = vec![CompressionMethod::None];
            for _ in 0..method_slots {
                let name = read_array::<COMPRESSION_METHOD_NAME_LEN, _>(&mut r)?;
                let name = fixed_name(&name);
                if !name.is_empty() {
                    methods.push(CompressionMethod::from_name(&name));
                }
            }
            methods
        } else {
            LEGACY_METHODS.to_vec()
        };

        Ok(Some(Self {
            version: candidate,
            encryption_key_guid,
            encrypted_index,
            index_offset,
            index_size,
            index_hash,
            index_is_frozen,
            compression_methods,
        }))
    }

    fn validate(&self, file_len: u64) -> Result<()> {
        let end = self.index_offset.checked_add(self.index_size);
        if end.is_none_or(|end| end > file_len) {
            return Err(Error::InvalidFormat(format!(
                "index region {:#x}+{} exceeds file size {}",
                self.index_offset, self.index_size, file_len
            )));
        }
        if self.index_is_frozen {
            return Err(Error::InvalidFormat("frozen pak indices are not supported".into()));
        }
        Ok(())
    }

    /// Returns the compression method for an entry's method index.
    pub fn compression_method(&self, index: u32) -> Option<&CompressionMethod> {
        self.compression_methods.get(index as usize)
    }

    /// Returns `true` if block offsets are relative to the entry start.
    pub fn has_relative_compressed_chunk_offsets(&self) -> bool {
        self.version >= version::RELATIVE_CHUNK_OFFSETS
    }

    /// Returns `true` if the archive declares its own encryption key.
    pub fn has_encryption_key(&self) -> bool {
        self.encryption_key_guid.is_valid()
    }
}
