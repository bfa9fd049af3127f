//! The pak entry index.
//!
//! Two layouts exist. Before version 10 the index is a flat list of
//! `(path, entry)` pairs. From version 10 on, entries are bit-packed into one
//! buffer (see [`encoded`](super::encoded)), entries that cannot be packed are
//! kept in a side list, and paths live in a separate full directory index
//! that maps `directory -> file -> location`. A location `>= 0` is a byte
//! offset into the packed buffer, a location `< 0` selects side list entry
//! `-location - 1`.
//!
//! Archives may be built without the directory index. Their entries can
//! still be enumerated, but they carry no paths.

use std::io::{self, Cursor, Read, Seek, SeekFrom};

use sha1::{Digest, Sha1};

use super::encoded::decode_entry;
use super::entry::PakEntry;
use super::info::PakInfo;
use super::reader::{
    read_array, read_bool32, read_count, read_size, read_string, read_u64_le,
};
use super::{HASH_SIZE, version};
use crate::crypto::{self, AesKey, KeyChain};
use crate::{Error, Result};

/// One entry of the index, with its path if the archive records one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedEntry {
    /// Path relative to the mount point.
    pub path: Option<String>,
    /// The entry descriptor as recorded in the index.
    pub entry: PakEntry,
}

/// The loaded and validated index of a pak archive.
#[derive(Debug, Clone, Default)]
pub struct PakIndex {
    mount_point: String,
    entries: Vec<IndexedEntry>,
    has_filenames: bool,
}

/// Location of a secondary index region.
struct Region {
    offset: u64,
    size: u64,
    hash: [u8; HASH_SIZE],
}

impl PakIndex {
    /// Reads, decrypts and validates the index described by `info`.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingKey`] if the index is encrypted and no key resolves
    /// - [`Error::CorruptIndex`] if a hash does not match or the index does
    ///   not parse
    pub fn read_from<R: Read + Seek>(reader: &mut R, info: &PakInfo, keys: &KeyChain) -> Result<Self> {
        let key = if info.encrypted_index {
            Some(keys.resolve(&info.encryption_key_guid).ok_or(Error::MissingKey {
                guid: info.encryption_key_guid,
            })?)
        } else {
            None
        };

        let primary = Region {
            offset: info.index_offset,
            size: info.index_size,
            hash: info.index_hash,
        };
        let data = read_region(reader, &primary, key)?;
        let corrupt = |e: io::Error| Error::corrupt_index(info.index_offset, e.to_string());

        let mut cursor = Cursor::new(data.as_slice());
        let index = if info.version >= version::PATH_HASH_INDEX {
            Self::parse_path_hash_index(&mut cursor, reader, info, key)?
        } else {
            Self::parse_legacy_index(&mut cursor, info.version).map_err(corrupt)?
        };

        log::debug!(
            "Loaded pak index: {} entries, mount point '{}'",
            index.entries.len(),
            index.mount_point
        );
        Ok(index)
    }

    fn parse_legacy_index(r: &mut Cursor<&[u8]>, version: u32) -> io::Result<Self> {
        let mount_point = read_string(r)?;
        let count = read_count(r)?;
        let mut entries = Vec::with_capacity(count.min(64 * 1024));
        for _ in 0..count {
            let path = read_string(r)?;
            let entry = PakEntry::read_from(r, version)?;
            entries.push(IndexedEntry {
                path: Some(path),
                entry,
            });
        }
        Ok(Self {
            mount_point,
            entries,
            has_filenames: true,
        })
    }

    fn parse_path_hash_index<R: Read + Seek>(
        r: &mut Cursor<&[u8]>,
        reader: &mut R,
        info: &PakInfo,
        key: Option<&AesKey>,
    ) -> Result<Self> {
        let corrupt = |e: io::Error| Error::corrupt_index(info.index_offset, e.to_string());

        let mount_point = read_string(r).map_err(corrupt)?;
        let entry_count = read_count(r).map_err(corrupt)?;
        let _path_hash_seed = read_u64_le(r).map_err(corrupt)?;

        // The path hash index is only needed for lookups by path
        if read_bool32(r).map_err(corrupt)? {
            read_region_location(r).map_err(corrupt)?;
        }
        let directory_index = if read_bool32(r).map_err(corrupt)? {
            Some(read_region_location(r).map_err(corrupt)?)
        } else {
            None
        };

        let encoded_len = read_count(r).map_err(corrupt)?;
        let bytes: &[u8] = *r.get_ref();
        let remaining = bytes.len() as u64 - r.position();
        if encoded_len as u64 > remaining {
            return Err(Error::corrupt_index(
                info.index_offset,
                format!("encoded entries ({} bytes) exceed the index", encoded_len),
            ));
        }
        let start = r.position() as usize;
        let encoded = &bytes[start..start + encoded_len];
        r.set_position((start + encoded_len) as u64);

        let file_count = read_count(r).map_err(corrupt)?;
        let mut files = Vec::with_capacity(file_count.min(64 * 1024));
        for _ in 0..file_count {
            files.push(PakEntry::read_from(r, info.version).map_err(corrupt)?);
        }

        let relative = info.has_relative_compressed_chunk_offsets();
        let (entries, has_filenames) = match directory_index {
            Some(region) => {
                let data = read_region(reader, &region, key)?;
                let entries = resolve_directory_index(&data, encoded, &files, info.version, relative)
                    .map_err(|e| Error::corrupt_index(region.offset, e.to_string()))?;
                (entries, true)
            }
            None => {
                let entries = sequential_entries(encoded, &files, info.version, relative)
                    .map_err(corrupt)?;
                (entries, false)
            }
        };

        if entries.len() != entry_count {
            log::debug!(
                "Index declares {} entries but {} were resolved",
                entry_count,
                entries.len()
            );
        }

        Ok(Self {
            mount_point,
            entries,
            has_filenames,
        })
    }

    /// Returns the mount point every entry path is relative to.
    pub fn mount_point(&self) -> &str {
        &self.mount_point
    }

    /// Returns `false` if the archive was built without a filename table.
    pub fn has_filenames(&self) -> bool {
        self.has_filenames
    }

    /// Returns the entries in index order.
    pub fn entries(&self) -> &[IndexedEntry] {
        &self.entries
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn read_region_location(r: &mut Cursor<&[u8]>) -> io::Result<Region> {
    Ok(Region {
        offset: read_size(r)?,
        size: read_size(r)?,
        hash: read_array::<HASH_SIZE, _>(r)?,
    })
}

/// Reads an index region, decrypts it and checks its SHA-1.
fn read_region<R: Read + Seek>(reader: &mut R, region: &Region, key: Option<&AesKey>) -> Result<Vec<u8>> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    if region.offset.checked_add(region.size).is_none_or(|end| end > file_len) {
        return Err(Error::corrupt_index(
            region.offset,
            format!("region of {} bytes exceeds file size {}", region.size, file_len),
        ));
    }

    reader.seek(SeekFrom::Start(region.offset))?;
    let mut data = vec![0u8; region.size as usize];
    reader.read_exact(&mut data)?;

    if let Some(key) = key {
        crypto::decrypt_in_place(key, &mut data)
            .map_err(|e| Error::corrupt_index(region.offset, e.to_string()))?;
    }

    let digest = Sha1::digest(&data);
    if digest.as_slice() != region.hash {
        return Err(Error::corrupt_index(
            region.offset,
            format!(
                "SHA-1 mismatch: expected {}, found {}",
                hex::encode(region.hash),
                hex::encode(digest)
            ),
        ));
    }
    Ok(data)
}

fn entry_at_location(
    location: i32,
    encoded: &[u8],
    files: &[PakEntry],
    version: u32,
    relative: bool,
) -> io::Result<PakEntry> {
    if location >= 0 {
        let at = location as usize;
        if at >= encoded.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("encoded entry offset {} out of range", at),
            ));
        }
        decode_entry(&encoded[at..], version, relative).map(|(entry, _)| entry)
    } else {
        let at = (-(location as i64) - 1) as usize;
        files.get(at).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("entry list index {} out of range", at),
            )
        })
    }
}

fn resolve_directory_index(
    data: &[u8],
    encoded: &[u8],
    files: &[PakEntry],
    version: u32,
    relative: bool,
) -> io::Result<Vec<IndexedEntry>> {
    let mut r = Cursor::new(data);
    let dir_count = read_count(&mut r)?;
    let mut entries = Vec::new();
    for _ in 0..dir_count {
        let directory = read_string(&mut r)?;
        let file_count = read_count(&mut r)?;
        for _ in 0..file_count {
            let file = read_string(&mut r)?;
            let location = super::reader::read_i32_le(&mut r)?;
            let entry = entry_at_location(location, encoded, files, version, relative)?;
            entries.push(IndexedEntry {
                path: Some(combine_path(&directory, &file)),
                entry,
            });
        }
    }
    Ok(entries)
}

fn sequential_entries(
    encoded: &[u8],
    files: &[PakEntry],
    version: u32,
    relative: bool,
) -> io::Result<Vec<IndexedEntry>> {
    let mut entries = Vec::new();
    let mut at = 0;
    while at < encoded.len() {
        let (entry, used) = decode_entry(&encoded[at..], version, relative)?;
        entries.push(IndexedEntry { path: None, entry });
        at += used;
    }
    entries.extend(files.iter().cloned().map(|entry| IndexedEntry { path: None, entry }));
    Ok(entries)
}

/// Joins a directory index directory and file name.
///
/// Directories are stored relative to the mount point with a trailing
/// slash; the root directory is `/`.
fn combine_path(directory: &str, file: &str) -> String {
    let directory = directory.trim_start_matches('/');
    if directory.is_empty() {
        file.to_string()
    } else if directory.ends_with('/') {
        format!("{}{}", directory, file)
    } else {
        format!("{}/{}", directory, file)
    }
}
