//! Archive opening methods.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use crate::crypto::KeyChain;
use crate::format::{PakIndex, PakInfo};
use crate::{Error, Result};

use super::PakArchive;

impl PakArchive<BufReader<File>> {
    /// Opens a pak archive from a file path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArchiveNotFound`] if `path` does not exist, otherwise
    /// the same errors as [`PakArchive::open`].
    pub fn open_path(path: impl AsRef<Path>, keys: &KeyChain) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::ArchiveNotFound {
                path: path.to_path_buf(),
            },
            _ => Error::Io(e),
        })?;
        Self::open(BufReader::new(file), keys)
    }
}

impl<R: Read + Seek> PakArchive<R> {
    /// Opens a pak archive from a seekable reader.
    ///
    /// Reads the footer, checks that a key is available for the archive's
    /// declared key GUID and loads the index.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidFormat`] if no footer is found
    /// - [`Error::MissingKey`] if the archive names a key the chain lacks
    /// - [`Error::CorruptIndex`] if the index fails validation
    pub fn open(mut reader: R, keys: &KeyChain) -> Result<Self> {
        let info = PakInfo::read_from(&mut reader)?;

        if info.has_encryption_key() && !keys.contains(&info.encryption_key_guid) {
            return Err(Error::MissingKey {
                guid: info.encryption_key_guid,
            });
        }

        let index = PakIndex::read_from(&mut reader, &info, keys)?;
        log::debug!(
            "Opened pak v{} with {} entries (encrypted index: {})",
            info.version,
            index.len(),
            info.encrypted_index
        );

        Ok(Self {
            reader,
            info,
            index,
        })
    }
}
