//! Damaged container tests.
//!
//! Valid fixtures are written by `common` and then cut or patched so that
//! sizes and offsets no longer agree with the data. Opening or extracting
//! them must fail with an error instead of panicking or reserving memory
//! for the sizes they claim.

use std::io::Cursor;

use paktools::crypto::KeyChain;
use paktools::read::{ExtractOptions, PakArchive};
use paktools::tool::{MemoryDestination, extract_iostore, extract_pak};
use paktools::{Error, IoStoreReader};

mod common;

use common::{EntrySpec, PakBuilder, UtocBuilder, random_bytes};

/// Offset of the directory index size in the TOC header.
const TOC_DIRECTORY_INDEX_SIZE: usize = 48;
/// Size of the TOC header.
const TOC_HEADER_SIZE: usize = 144;

fn open_pak(bytes: Vec<u8>) -> paktools::Result<PakArchive<Cursor<Vec<u8>>>> {
    PakArchive::open(Cursor::new(bytes), &KeyChain::new())
}

// =============================================================================
// Pak footer and index
// =============================================================================

#[test]
fn test_truncated_footer() {
    let bytes = PakBuilder::new(11).entry(EntrySpec::stored("a.txt", b"alpha")).build();

    for cut in [1, 16, 100] {
        let truncated = bytes[..bytes.len() - cut].to_vec();
        let err = open_pak(truncated).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)), "cut {cut}: {err:?}");
    }

    let err = open_pak(bytes[bytes.len() - 30..].to_vec()).unwrap_err();
    assert!(matches!(err, Error::InvalidFormat(_)));
}

#[test]
fn test_encoded_entry_size_overflow() {
    // compressed, one block, 32-bit offset and uncompressed size, 64-bit size
    let bits: u32 = (1 << 31) | (1 << 30) | (1 << 23) | (1 << 6);
    let mut encoded = bits.to_le_bytes().to_vec();
    encoded.extend_from_slice(&0u32.to_le_bytes());
    encoded.extend_from_slice(&10u32.to_le_bytes());
    encoded.extend_from_slice(&u64::MAX.to_le_bytes());

    let bytes = PakBuilder::new(11)
        .entry(EntrySpec::stored("a.txt", b"alpha"))
        .without_filenames()
        .encoded_entries(&encoded)
        .build();

    let err = open_pak(bytes).unwrap_err();
    assert!(matches!(err, Error::CorruptIndex { .. }), "{err:?}");
}

#[test]
fn test_encoded_entry_block_range_overflow() {
    // compressed, one block, 32-bit offset and uncompressed size, 64-bit size
    let bits: u32 = (1 << 31) | (1 << 30) | (1 << 23) | (1 << 6);
    let mut encoded = bits.to_le_bytes().to_vec();
    encoded.extend_from_slice(&0u32.to_le_bytes());
    encoded.extend_from_slice(&10u32.to_le_bytes());
    // a valid size, but the block ends past i64::MAX once the header is added
    encoded.extend_from_slice(&(i64::MAX as u64).to_le_bytes());

    let bytes = PakBuilder::new(11)
        .without_filenames()
        .encoded_entries(&encoded)
        .build();

    let err = open_pak(bytes).unwrap_err();
    assert!(matches!(err, Error::CorruptIndex { .. }), "{err:?}");
}

#[cfg(feature = "deflate")]
#[test]
fn test_oversized_block_range_is_an_entry_failure() {
    let bytes = PakBuilder::new(11)
        .entry(EntrySpec::stored("good.txt", b"good"))
        .entry(EntrySpec::compressed("big.bin", &random_bytes(3000, 7), "Zlib", 1024))
        .oversize_blocks("big.bin")
        .build();

    let keys = KeyChain::new();
    let mut archive = open_pak(bytes).unwrap();
    let mut dest = MemoryDestination::new();
    let report = extract_pak(&mut archive, &mut dest, &keys, &ExtractOptions::default()).unwrap();

    assert_eq!(report.files_extracted, 1);
    assert_eq!(report.errors, 1);
    assert_eq!(report.failures[0].0, "big.bin");
    assert_eq!(dest.get("good.txt"), Some(&b"good"[..]));
}

#[test]
fn test_version_8_footer_with_four_method_slots() {
    let data = random_bytes(500, 3);
    let bytes = PakBuilder::new(8)
        .entry(EntrySpec::stored("a.bin", &data))
        .method_slots(4)
        .build();

    let keys = KeyChain::new();
    let mut archive = open_pak(bytes).unwrap();
    assert_eq!(archive.info().version, 8);

    let mut dest = MemoryDestination::new();
    let report = extract_pak(&mut archive, &mut dest, &keys, &ExtractOptions::default()).unwrap();
    assert!(report.is_ok());
    assert_eq!(dest.get("a.bin"), Some(&data[..]));
}

// =============================================================================
// IoStore TOC
// =============================================================================

#[test]
fn test_truncated_toc_header() {
    let dir = tempfile::tempdir().unwrap();
    let utoc = UtocBuilder::new()
        .file("Game/a.bin", b"alpha")
        .write_to(dir.path(), "global");
    let toc = std::fs::read(&utoc).unwrap();
    std::fs::write(&utoc, &toc[..100]).unwrap();

    let err = IoStoreReader::open(&utoc, &KeyChain::new()).unwrap_err();
    assert!(matches!(err, Error::InvalidFormat(_)), "{err:?}");
}

#[test]
fn test_oversized_directory_index() {
    let dir = tempfile::tempdir().unwrap();
    let utoc = UtocBuilder::new()
        .file("Game/a.bin", b"alpha")
        .write_to(dir.path(), "global");
    let mut toc = std::fs::read(&utoc).unwrap();
    toc[TOC_DIRECTORY_INDEX_SIZE..TOC_DIRECTORY_INDEX_SIZE + 4].copy_from_slice(&u32::MAX.to_le_bytes());
    std::fs::write(&utoc, toc).unwrap();

    let err = IoStoreReader::open(&utoc, &KeyChain::new()).unwrap_err();
    assert!(matches!(err, Error::CorruptIndex { .. }), "{err:?}");
}

#[test]
fn test_chunk_length_beyond_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let a = random_bytes(2000, 1);
    let b = random_bytes(300, 2);
    let utoc = UtocBuilder::new()
        .block_size(1024)
        .file("Game/a.bin", &a)
        .file("Game/b.bin", &b)
        .write_to(dir.path(), "global");

    // 40-bit big-endian length of the first chunk follows its offset
    let mut toc = std::fs::read(&utoc).unwrap();
    let length_at = TOC_HEADER_SIZE + 2 * 12 + 5;
    toc[length_at..length_at + 5].copy_from_slice(&[0xFF; 5]);
    std::fs::write(&utoc, toc).unwrap();

    let mut reader = IoStoreReader::open(&utoc, &KeyChain::new()).unwrap();
    let info = reader.chunk_info(0).unwrap();
    assert_eq!(info.size, 0xFF_FFFF_FFFF);
    let err = reader.read_chunk(&info.id).unwrap_err();
    assert!(matches!(err, Error::CorruptIndex { .. }), "{err:?}");

    let id = reader.chunk_info(1).unwrap().id;
    assert_eq!(reader.read_chunk(&id).unwrap(), b);

    let mut dest = MemoryDestination::new();
    let report = extract_iostore(&mut reader, &mut dest).unwrap();
    assert_eq!(report.files_extracted, 1);
    assert_eq!(report.errors, 1);
    assert_eq!(dest.get("Game/b.bin"), Some(&b[..]));
}
