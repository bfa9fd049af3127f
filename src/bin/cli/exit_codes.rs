//! Exit codes for the CLI tool.

use paktools::Error;

/// Exit code constants
pub const SUCCESS: i32 = 0;
/// Fatal error occurred
pub const FATAL_ERROR: i32 = 2;
/// Container format error
pub const BAD_ARCHIVE: i32 = 3;
/// Encryption key missing or invalid
pub const MISSING_KEY: i32 = 4;
/// I/O error
pub const IO_ERROR: i32 = 5;
/// Invalid command line arguments
pub const BAD_ARGS: i32 = 255;

/// Exit code enum for structured handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    FatalError,
    BadArchive,
    MissingKey,
    IoError,
    BadArgs,
}

impl ExitCode {
    /// Returns the numeric exit code
    pub fn code(self) -> i32 {
        match self {
            Self::Success => SUCCESS,
            Self::FatalError => FATAL_ERROR,
            Self::BadArchive => BAD_ARCHIVE,
            Self::MissingKey => MISSING_KEY,
            Self::IoError => IO_ERROR,
            Self::BadArgs => BAD_ARGS,
        }
    }
}

/// Converts a paktools error to an exit code
pub fn error_to_exit_code(error: &Error) -> ExitCode {
    match error {
        Error::Io(_) => ExitCode::IoError,
        Error::ArchiveNotFound { .. } => ExitCode::IoError,
        Error::InvalidFormat(_) | Error::CorruptIndex { .. } => ExitCode::BadArchive,
        Error::UnsupportedVersion { .. } => ExitCode::BadArchive,
        Error::NoReadableEntries { .. } | Error::MissingFilenames => ExitCode::BadArchive,
        Error::MissingKey { .. } | Error::NoDecryptionKey => ExitCode::MissingKey,
        Error::InvalidKey(_) | Error::KeyFile(_) => ExitCode::BadArgs,
        Error::UnsupportedExtension { .. } => ExitCode::BadArgs,
        // Future error variants - required by #[non_exhaustive]
        _ => ExitCode::FatalError,
    }
}
