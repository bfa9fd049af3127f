//! Extraction of whole containers.

use std::io::{Read, Seek, Write};
use std::path::Path;

use crate::crypto::KeyChain;
use crate::iostore::{DirectoryHandle, IoStoreReader};
use crate::read::{
    ExtractOptions, ExtractReport, PakArchive, ScratchBuffer, copy_compressed, copy_plain, read_entry_header,
};
use crate::{Error, Result};

use super::container::{Container, ContainerKind};
use super::destination::{ExtractDestination, FilesystemDestination};
use super::normalize_logical_name;

/// Extracts every entry of the container at `archive` below `output_dir`.
///
/// Both paths are made absolute and logged. Entry failures are counted in
/// the returned report and logged; the run continues with the next entry.
///
/// # Errors
///
/// - [`Error::UnsupportedExtension`] before any I/O for unknown extensions
/// - [`Error::ArchiveNotFound`] if the archive does not exist
/// - [`Error::MissingKey`], [`Error::CorruptIndex`] and other open errors
/// - [`Error::MissingFilenames`] for a pak built without a filename table
pub fn extract_files(
    archive: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    keys: &KeyChain,
    options: &ExtractOptions,
) -> Result<ExtractReport> {
    ContainerKind::from_path(archive.as_ref())?;
    let archive = std::path::absolute(archive.as_ref())?;
    let output_dir = std::path::absolute(output_dir.as_ref())?;

    log::info!("Extracting files from {}", archive.display());
    log::info!("Output directory: {}", output_dir.display());

    let mut container = Container::open(&archive, keys)?;
    let mut dest = FilesystemDestination::new(&output_dir);
    let report = container.extract_to(&mut dest, keys, options)?;

    if report.errors > 0 {
        log::error!("Failed to extract {} files.", report.errors);
    }
    Ok(report)
}

fn record_entry_failure(report: &mut ExtractReport, name: &str, error: &Error) {
    log::error!("Failed to extract \"{}\": {}", name, error);
    report.record_failure(name, error);
}

/// Extracts every live entry of a pak archive into `dest`.
///
/// Before its payload is read, each entry's header is re-read from the
/// data region and compared with the index copy. Delete records are
/// skipped.
///
/// # Errors
///
/// Returns [`Error::MissingFilenames`] if the archive has no filename table.
pub fn extract_pak<R: Read + Seek>(
    archive: &mut PakArchive<R>,
    dest: &mut dyn ExtractDestination,
    keys: &KeyChain,
    options: &ExtractOptions,
) -> Result<ExtractReport> {
    log::info!("Mount Point: {}", archive.mount_point());

    if !archive.has_filenames() {
        log::error!("Pak was loaded without filenames, cannot extract.");
        return Err(Error::MissingFilenames);
    }

    let mut report = ExtractReport::default();
    let mut buffer = vec![0u8; options.copy_buffer_size()];
    let mut scratch = ScratchBuffer::new();
    let (info, index, reader) = archive.split_mut();

    for item in index.entries() {
        let entry = &item.entry;
        if entry.is_delete_record() {
            continue;
        }

        let Some(name) = item.path.as_deref() else {
            log::warn!("Unable to get filename for pak file entry at offset {:#x}.", entry.offset);
            report.record_failure(format!("<offset {:#x}>", entry.offset), &Error::MissingFilenames);
            continue;
        };

        log::info!("Extracting '{}'", name);

        let header = match read_entry_header(reader, entry, info.version) {
            Ok(header) => header,
            Err(e) => {
                record_entry_failure(&mut report, name, &e);
                continue;
            }
        };
        if !header.index_data_eq(entry) {
            log::error!("PakEntry mismatch for \"{}\".", name);
            report.record_failure(name, &Error::EntryMismatch { path: name.to_string() });
            continue;
        }

        let mut writer = match dest.create_writer(name) {
            Ok(writer) => writer,
            Err(e) => {
                log::error!("Unable to create file \"{}\": {}", name, e);
                report.record_failure(name, &e);
                continue;
            }
        };

        let copied = if entry.is_compressed() {
            copy_compressed(&mut writer, reader, entry, &mut scratch, keys, info)
        } else {
            copy_plain(&mut writer, reader, entry, &mut buffer, keys)
        };
        let result = copied.and_then(|bytes| {
            writer.flush()?;
            Ok(bytes)
        });

        match result {
            Ok(bytes) => report.record_success(bytes),
            Err(e) => record_entry_failure(&mut report, name, &e),
        }
    }

    Ok(report)
}

/// Extracts every file named by an IoStore directory index into `dest`.
///
/// Names are normalized with [`normalize_logical_name`] before use.
pub fn extract_iostore<R: Read + Seek>(
    reader: &mut IoStoreReader<R>,
    dest: &mut dyn ExtractDestination,
) -> Result<ExtractReport> {
    log::info!("Reading from IoStore");
    log::info!("  Mount Point: {}", reader.mount_point());

    let mut report = ExtractReport::default();
    let files: Vec<(String, u32)> = reader.walk(DirectoryHandle::ROOT).collect();

    for (walked_name, toc_index) in files {
        let name = normalize_logical_name(&walked_name);
        log::info!("Extracting '{}'", name);

        let chunk = match reader.chunk_info(toc_index) {
            Ok(chunk) => chunk,
            Err(e) => {
                log::error!("Unable to get chunk info for '{}': {}", name, e);
                report.record_failure(name, &e);
                continue;
            }
        };

        let data = match reader.read_chunk(&chunk.id) {
            Ok(data) => data,
            Err(e) => {
                log::error!("Cannot read file \"{}\": {}", name, e);
                report.record_failure(name, &e);
                continue;
            }
        };

        let mut writer = match dest.create_writer(name) {
            Ok(writer) => writer,
            Err(e) => {
                log::error!("Unable to create file \"{}\": {}", name, e);
                report.record_failure(name, &e);
                continue;
            }
        };

        match writer.write_all(&data).and_then(|()| writer.flush()) {
            Ok(()) => report.record_success(data.len() as u64),
            Err(e) => record_entry_failure(&mut report, name, &Error::Io(e)),
        }
    }

    Ok(report)
}
