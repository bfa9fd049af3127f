//! Error types for pak and IoStore container operations.
//!
//! This module provides the [`Error`] enum which represents all possible
//! failure modes when listing or extracting containers, along with a
//! convenient [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! All fallible operations in this crate return `Result<T, Error>`. Errors
//! fall into three groups that callers usually treat differently:
//!
//! | Group | Variants | Effect on a run |
//! |-------|----------|-----------------|
//! | Archive-fatal | [`ArchiveNotFound`][Error::ArchiveNotFound], [`InvalidFormat`][Error::InvalidFormat], [`CorruptIndex`][Error::CorruptIndex], [`MissingKey`][Error::MissingKey], [`MissingFilenames`][Error::MissingFilenames], [`UnsupportedVersion`][Error::UnsupportedVersion] | Abort the run |
//! | Entry-level | [`EntryMismatch`][Error::EntryMismatch], [`Decompression`][Error::Decompression], [`UnsupportedMethod`][Error::UnsupportedMethod], [`NoDecryptionKey`][Error::NoDecryptionKey], [`PathTraversal`][Error::PathTraversal], [`ChunkNotFound`][Error::ChunkNotFound] | Counted, run continues |
//! | Usage | [`UnsupportedExtension`][Error::UnsupportedExtension], [`InvalidKey`][Error::InvalidKey] | Reported before any archive I/O |
//!
//! ```rust
//! use paktools::Error;
//!
//! fn print_user_message(error: &Error) {
//!     match error {
//!         Error::MissingKey { guid } => println!("Need the AES key for {}", guid),
//!         Error::UnsupportedExtension { .. } => println!("Expected a .pak or .utoc file."),
//!         e if e.is_corruption() => println!("The container is damaged: {}", e),
//!         _ => println!("Error: {}", error),
//!     }
//! }
//! ```

use std::io;
use std::path::PathBuf;

use crate::crypto::Guid;

/// The main error type for container operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The archive file does not exist.
    #[error("Archive '{}' does not exist", path.display())]
    ArchiveNotFound {
        /// The path that was looked up.
        path: PathBuf,
    },

    /// The file is not a container this crate understands.
    ///
    /// Returned when no footer or TOC header with a valid magic value could
    /// be located.
    #[error("Invalid container format: {0}")]
    InvalidFormat(String),

    /// The container declares a format version this crate cannot read.
    #[error("Unsupported container version {version}")]
    UnsupportedVersion {
        /// The version number found on disk.
        version: u32,
    },

    /// The entry index or directory index failed structural validation.
    #[error("Corrupt index at offset {offset:#x}: {reason}")]
    CorruptIndex {
        /// Byte offset of the index region that failed validation.
        offset: u64,
        /// A description of the corruption.
        reason: String,
    },

    /// The container requires an encryption key that is not in the key chain.
    ///
    /// This is fatal for the whole run: nothing in the container can be
    /// read without the key.
    #[error("Missing encryption key {guid}")]
    MissingKey {
        /// Identifier of the key the container declares.
        guid: Guid,
    },

    /// Encrypted data was found but neither the container's key nor the
    /// principal key is available.
    #[error("No decryption key available for encrypted data")]
    NoDecryptionKey,

    /// The container was built without a filename table.
    #[error("Archive has no filename table, entries cannot be extracted")]
    MissingFilenames,

    /// A key supplied on the command line or in a key file is malformed.
    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    /// A key file could not be parsed.
    #[error("Invalid key chain file: {0}")]
    KeyFile(#[from] serde_json::Error),

    /// The entry uses a compression method not supported by this build.
    #[error("Unsupported compression method '{method}'")]
    UnsupportedMethod {
        /// Name of the compression method.
        method: String,
    },

    /// A compression block failed to decompress.
    #[error("Failed to decompress block {block} with {method}")]
    Decompression {
        /// Name of the compression method.
        method: String,
        /// Index of the failing block within its entry.
        block: usize,
    },

    /// The descriptor re-read from the data region differs from the index.
    #[error("Pak entry mismatch for \"{path}\"")]
    EntryMismatch {
        /// Logical path of the entry.
        path: String,
    },

    /// An entry's logical name would escape the output directory.
    #[error("Path traversal detected in entry: {path}")]
    PathTraversal {
        /// The offending logical path.
        path: String,
    },

    /// A chunk id or TOC index is not present in the container.
    #[error("Chunk not found: {id}")]
    ChunkNotFound {
        /// Hex form of the chunk id or the TOC index.
        id: String,
    },

    /// The input file extension is neither `.pak` nor `.utoc`.
    #[error("Expected .pak or .utoc file but got '{}'", path.display())]
    UnsupportedExtension {
        /// The rejected input path.
        path: PathBuf,
    },

    /// A listing pass produced no entries for an archive.
    #[error("No readable entries in '{}'", path.display())]
    NoReadableEntries {
        /// The archive that produced no entries.
        path: PathBuf,
    },
}

impl Error {
    /// Returns `true` if this error aborts a whole run rather than a single entry.
    pub fn is_archive_fatal(&self) -> bool {
        matches!(
            self,
            Error::ArchiveNotFound { .. }
                | Error::InvalidFormat(_)
                | Error::UnsupportedVersion { .. }
                | Error::CorruptIndex { .. }
                | Error::MissingKey { .. }
                | Error::MissingFilenames
                | Error::NoReadableEntries { .. }
        )
    }

    /// Returns `true` if this error stems from bad user input.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedExtension { .. } | Error::InvalidKey(_) | Error::KeyFile(_)
        )
    }

    /// Returns `true` if this error indicates damaged container data.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::CorruptIndex { .. } | Error::EntryMismatch { .. } | Error::Decompression { .. }
        )
    }

    /// Returns `true` if this error is related to encryption keys.
    pub fn is_encryption_error(&self) -> bool {
        matches!(
            self,
            Error::MissingKey { .. } | Error::NoDecryptionKey | Error::InvalidKey(_)
        )
    }

    /// Creates a [`CorruptIndex`](Error::CorruptIndex) error.
    pub fn corrupt_index(offset: u64, reason: impl Into<String>) -> Self {
        Error::CorruptIndex {
            offset,
            reason: reason.into(),
        }
    }

    /// Creates an [`UnsupportedMethod`](Error::UnsupportedMethod) error.
    pub fn unsupported_method(method: impl Into<String>) -> Self {
        Error::UnsupportedMethod {
            method: method.into(),
        }
    }
}

/// A specialized Result type for container operations.
///
/// # Example
///
/// ```rust
/// use paktools::Result;
///
/// fn my_function() -> Result<()> {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_from() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_missing_key_message() {
        let guid = Guid::new(1, 2, 3, 4);
        let err = Error::MissingKey { guid };
        assert_eq!(
            err.to_string(),
            "Missing encryption key 00000001000000020000000300000004"
        );
        assert!(err.is_archive_fatal());
        assert!(err.is_encryption_error());
    }

    #[test]
    fn test_entry_errors_are_not_fatal() {
        let mismatch = Error::EntryMismatch {
            path: "Content/a.uasset".into(),
        };
        assert!(!mismatch.is_archive_fatal());
        assert!(mismatch.is_corruption());

        let decode = Error::Decompression {
            method: "Zlib".into(),
            block: 2,
        };
        assert!(!decode.is_archive_fatal());
        assert_eq!(decode.to_string(), "Failed to decompress block 2 with Zlib");
    }

    #[test]
    fn test_usage_errors() {
        let err = Error::UnsupportedExtension {
            path: PathBuf::from("data.zip"),
        };
        assert!(err.is_usage_error());
        assert_eq!(
            err.to_string(),
            "Expected .pak or .utoc file but got 'data.zip'"
        );
    }

    #[test]
    fn test_convenience_constructors() {
        let err = Error::corrupt_index(0x100, "hash mismatch");
        assert!(matches!(err, Error::CorruptIndex { offset: 0x100, .. }));
        assert_eq!(err.to_string(), "Corrupt index at offset 0x100: hash mismatch");

        let err = Error::unsupported_method("Oodle");
        assert_eq!(err.to_string(), "Unsupported compression method 'Oodle'");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
