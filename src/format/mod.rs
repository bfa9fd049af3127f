//! Pak container format constants, definitions, and parsing.
//!
//! A pak file is laid out as
//!
//! ```text
//! [entry header][entry payload] ... [index] [directory index] [footer]
//! ```
//!
//! The footer ([`PakInfo`]) is found by probing the end of the file. It
//! locates the index, which lists every entry ([`PakEntry`]) together with
//! its logical path. Each payload is preceded by a copy of its entry header,
//! which lets readers verify the index against the data before extracting.

pub mod encoded;
pub mod entry;
pub mod index;
pub mod info;
pub mod reader;

pub use entry::{PakCompressedBlock, PakEntry};
pub use index::{IndexedEntry, PakIndex};
pub use info::PakInfo;

/// Magic value stored in every pak footer.
pub const PAK_MAGIC: u32 = 0x5A6F_12E1;

/// Length of a SHA-1 digest.
pub const HASH_SIZE: usize = 20;

/// Width of a compression method name in the footer.
pub const COMPRESSION_METHOD_NAME_LEN: usize = 32;

/// Number of compression method names stored in the footer.
pub const MAX_COMPRESSION_METHODS: usize = 5;

/// Number of compression method names in early version 8 footers.
pub const LEGACY_COMPRESSION_METHODS: usize = 4;

/// Pak format versions and the features they introduced.
pub mod version {
    /// First released version.
    pub const INITIAL: u32 = 1;
    /// Entry timestamps removed.
    pub const NO_TIMESTAMPS: u32 = 2;
    /// Per-entry compression blocks and encryption flag.
    pub const COMPRESSION_ENCRYPTION: u32 = 3;
    /// Encrypted index.
    pub const INDEX_ENCRYPTION: u32 = 4;
    /// Block offsets relative to the entry start.
    pub const RELATIVE_CHUNK_OFFSETS: u32 = 5;
    /// Delete records.
    pub const DELETE_RECORDS: u32 = 6;
    /// Encryption key GUID in the footer.
    pub const ENCRYPTION_KEY_GUID: u32 = 7;
    /// Compression methods named in the footer.
    pub const FNAME_BASED_COMPRESSION_METHOD: u32 = 8;
    /// Frozen index.
    pub const FROZEN_INDEX: u32 = 9;
    /// Path hash index, full directory index and encoded entries.
    pub const PATH_HASH_INDEX: u32 = 10;
    /// Fixed FNV-64 path hashing.
    pub const FNV64_BUG_FIX: u32 = 11;
    /// Newest version this crate reads.
    pub const LATEST: u32 = FNV64_BUG_FIX;
}

/// Joins a pak mount point and a relative entry path.
///
/// Exactly one `/` separates the two parts.
pub fn join_mount_path(mount_point: &str, path: &str) -> String {
    if mount_point.is_empty() {
        return path.to_string();
    }
    let path = path.trim_start_matches('/');
    if mount_point.ends_with('/') {
        format!("{}{}", mount_point, path)
    } else {
        format!("{}/{}", mount_point, path)
    }
}
