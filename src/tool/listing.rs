//! Container listings.

use std::path::Path;

use crate::crypto::KeyChain;
use crate::{Error, Result};

use super::container::{Container, ContainerKind};
use super::{ToolFileEntry, compression_percent, human_size};

/// The merged, sorted listing of one or more containers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    entries: Vec<ToolFileEntry>,
}

impl Listing {
    /// Builds a listing from unsorted records.
    pub fn new(mut entries: Vec<ToolFileEntry>) -> Self {
        sort_by_compressed_size(&mut entries);
        Self { entries }
    }

    /// Returns the records, largest compressed size first.
    pub fn entries(&self) -> &[ToolFileEntry] {
        &self.entries
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the listing is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the sum of all compressed sizes.
    pub fn total_compressed(&self) -> u64 {
        self.entries.iter().map(|e| e.compressed_size).sum()
    }

    /// Formats one line per record.
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.entries.iter().map(|e| {
            format!(
                "{} ({}) [Compression: {:.2}%]",
                e.path,
                human_size(e.compressed_size),
                compression_percent(e.compressed_size, e.uncompressed_size)
            )
        })
    }

    /// Formats the summary line.
    pub fn total_line(&self) -> String {
        format!("Total compressed data: {}", human_size(self.total_compressed()))
    }
}

/// Sorts records by compressed size, largest first.
///
/// The sort is stable: records of equal size keep their relative order.
pub fn sort_by_compressed_size(entries: &mut [ToolFileEntry]) {
    entries.sort_by(|a, b| b.compressed_size.cmp(&a.compressed_size));
}

/// Lists the contents of every container in `paths`.
///
/// Containers are read one after another and merged before sorting, so
/// nothing is reported unless every container could be listed.
///
/// # Errors
///
/// - [`Error::UnsupportedExtension`] before any I/O if a path has an
///   unknown extension
/// - the first open error of any container
/// - [`Error::NoReadableEntries`] if a container lists no entries
pub fn list_files<P: AsRef<Path>>(paths: &[P], keys: &KeyChain) -> Result<Listing> {
    for path in paths {
        ContainerKind::from_path(path)?;
    }

    let mut entries = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let container = Container::open(path, keys)?;
        let files = container.file_entries()?;
        if files.is_empty() {
            return Err(Error::NoReadableEntries {
                path: path.to_path_buf(),
            });
        }
        log::debug!("Listed {} entries from {}", files.len(), path.display());
        entries.extend(files);
    }

    Ok(Listing::new(entries))
}
