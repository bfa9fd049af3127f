//! Pak archive reading API.
//!
//! This module opens pak archives, exposes their index, and provides the
//! block transfer engine that turns stored entry payloads back into plain
//! bytes.
//!
//! # Example
//!
//! ```rust,no_run
//! use paktools::crypto::KeyChain;
//! use paktools::read::{PakArchive, ScratchBuffer, copy_compressed, copy_plain};
//!
//! let keys = KeyChain::new();
//! let mut archive = PakArchive::open_path("game.pak", &keys)?;
//! println!("Mount point: {}", archive.mount_point());
//!
//! for item in archive.entries() {
//!     println!("{:?}: {} bytes", item.path, item.entry.uncompressed_size);
//! }
//! # Ok::<(), paktools::Error>(())
//! ```

mod archive_open;
mod decompression;
mod info;
mod options;

pub use decompression::{ScratchBuffer, copy_compressed, copy_plain};
pub use info::ExtractReport;
pub use options::{DEFAULT_BUFFER_SIZE, ExtractOptions};

use std::io::{Read, Seek, SeekFrom};

use crate::Result;
use crate::format::{IndexedEntry, PakEntry, PakIndex, PakInfo};

/// A pak archive reader.
pub struct PakArchive<R> {
    pub(crate) reader: R,
    pub(crate) info: PakInfo,
    pub(crate) index: PakIndex,
}

impl<R> std::fmt::Debug for PakArchive<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PakArchive")
            .field("version", &self.info.version)
            .field("mount_point", &self.index.mount_point())
            .field("entries", &self.index.len())
            .finish_non_exhaustive()
    }
}

impl<R: Read + Seek> PakArchive<R> {
    /// Returns the footer metadata.
    pub fn info(&self) -> &PakInfo {
        &self.info
    }

    /// Returns the loaded index.
    pub fn index(&self) -> &PakIndex {
        &self.index
    }

    /// Returns the mount point every entry path is relative to.
    pub fn mount_point(&self) -> &str {
        self.index.mount_point()
    }

    /// Returns `false` if the archive was built without a filename table.
    ///
    /// Entries of such archives cannot be extracted by name.
    pub fn has_filenames(&self) -> bool {
        self.index.has_filenames()
    }

    /// Returns the entries in index order.
    pub fn entries(&self) -> std::slice::Iter<'_, IndexedEntry> {
        self.index.entries().iter()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns the underlying reader.
    ///
    /// Its position is unspecified between calls.
    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Splits the archive into its metadata and its reader.
    ///
    /// Lets callers iterate the index while reading payloads.
    pub fn split_mut(&mut self) -> (&PakInfo, &PakIndex, &mut R) {
        (&self.info, &self.index, &mut self.reader)
    }

    /// Re-reads the header stored in front of `entry`'s payload.
    ///
    /// Leaves the reader positioned at the first payload byte.
    pub fn read_entry_header(&mut self, entry: &PakEntry) -> Result<PakEntry> {
        read_entry_header(&mut self.reader, entry, self.info.version)
    }

    /// Consumes the archive and returns the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Seeks to `entry.offset` and reads the stored header.
pub(crate) fn read_entry_header<R: Read + Seek>(reader: &mut R, entry: &PakEntry, version: u32) -> Result<PakEntry> {
    reader.seek(SeekFrom::Start(entry.offset))?;
    Ok(PakEntry::read_from(reader, version)?)
}
