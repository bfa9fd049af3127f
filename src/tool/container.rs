//! Container kind detection and dispatch.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use crate::crypto::KeyChain;
use crate::format::join_mount_path;
use crate::iostore::IoStoreReader;
use crate::read::{ExtractOptions, ExtractReport, PakArchive};
use crate::{Error, Result};

use super::destination::ExtractDestination;
use super::extract::{extract_iostore, extract_pak};
use super::ToolFileEntry;

/// The two container formats, told apart by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// A single-file `.pak` archive.
    Pak,
    /// A `.utoc` table of contents with `.ucas` partitions.
    IoStore,
}

impl ContainerKind {
    /// Detects the container kind from a path's extension.
    ///
    /// No I/O is performed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedExtension`] for anything but `.pak` and
    /// `.utoc`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("pak") => Ok(Self::Pak),
            Some(ext) if ext.eq_ignore_ascii_case("utoc") => Ok(Self::IoStore),
            _ => Err(Error::UnsupportedExtension {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Returns the display name used in listings.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pak => "Pak",
            Self::IoStore => "IoStore",
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An opened container of either kind.
#[derive(Debug)]
pub enum Container<R = BufReader<File>> {
    /// A pak archive.
    Pak(PakArchive<R>),
    /// An IoStore container.
    IoStore(IoStoreReader<R>),
}

impl Container {
    /// Opens the container at `path`, dispatching on its extension.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedExtension`] before any I/O for unknown extensions
    /// - [`Error::ArchiveNotFound`] if `path` does not exist
    /// - any error of [`PakArchive::open`] or [`IoStoreReader::open`]
    pub fn open(path: impl AsRef<Path>, keys: &KeyChain) -> Result<Self> {
        let path = path.as_ref();
        let kind = ContainerKind::from_path(path)?;
        if !path.is_file() {
            return Err(Error::ArchiveNotFound {
                path: path.to_path_buf(),
            });
        }

        match kind {
            ContainerKind::Pak => Ok(Self::Pak(PakArchive::open_path(path, keys)?)),
            ContainerKind::IoStore => Ok(Self::IoStore(IoStoreReader::open(path, keys)?)),
        }
    }
}

impl<R: Read + Seek> Container<R> {
    /// Returns the kind of this container.
    pub fn kind(&self) -> ContainerKind {
        match self {
            Self::Pak(_) => ContainerKind::Pak,
            Self::IoStore(_) => ContainerKind::IoStore,
        }
    }

    /// Returns the mount point.
    pub fn mount_point(&self) -> &str {
        match self {
            Self::Pak(archive) => archive.mount_point(),
            Self::IoStore(reader) => reader.mount_point(),
        }
    }

    /// Collects listing records without reading any payload.
    ///
    /// Pak entries are reported one per index entry, delete records
    /// included. IoStore chunks are merged per file name, keeping the order
    /// in which names first appear.
    pub fn file_entries(&self) -> Result<Vec<ToolFileEntry>> {
        match self {
            Self::Pak(archive) => Ok(pak_file_entries(archive)),
            Self::IoStore(reader) => iostore_file_entries(reader),
        }
    }

    /// Extracts every entry into `dest`.
    ///
    /// # Errors
    ///
    /// Only archive-level failures are returned; entry failures are
    /// counted in the report.
    pub fn extract_to(
        &mut self,
        dest: &mut dyn ExtractDestination,
        keys: &KeyChain,
        options: &ExtractOptions,
    ) -> Result<ExtractReport> {
        match self {
            Self::Pak(archive) => extract_pak(archive, dest, keys, options),
            Self::IoStore(reader) => extract_iostore(reader, dest),
        }
    }
}

fn pak_file_entries<R: Read + Seek>(archive: &PakArchive<R>) -> Vec<ToolFileEntry> {
    let mount_point = archive.mount_point();
    let mut result = Vec::with_capacity(archive.len());
    for item in archive.entries() {
        let Some(path) = &item.path else {
            log::error!("Unable to get filename for pak file entry.");
            continue;
        };
        result.push(ToolFileEntry {
            path: join_mount_path(mount_point, path),
            uncompressed_size: item.entry.uncompressed_size,
            compressed_size: item.entry.size,
            source: ContainerKind::Pak,
        });
    }
    result
}

fn iostore_file_entries<R: Read + Seek>(reader: &IoStoreReader<R>) -> Result<Vec<ToolFileEntry>> {
    log::info!("Reading from IoStore");
    log::info!("  Mount Point: {}", reader.mount_point());

    let mut result: Vec<ToolFileEntry> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();
    reader.enumerate_chunks(|chunk| {
        let slot = *by_name.entry(chunk.file_name.clone()).or_insert_with(|| {
            result.push(ToolFileEntry {
                path: chunk.file_name.clone(),
                uncompressed_size: 0,
                compressed_size: 0,
                source: ContainerKind::IoStore,
            });
            result.len() - 1
        });
        result[slot].uncompressed_size += chunk.size;
        result[slot].compressed_size += chunk.compressed_size;
        true
    })?;
    Ok(result)
}
