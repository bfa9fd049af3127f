//! Block codec registry for pak and IoStore containers.
//!
//! Containers name their compression methods by string. Each payload block
//! is compressed independently, so codecs here work on whole in-memory
//! blocks: the caller knows the exact uncompressed length of every block and
//! provides an output slice of that length.
//!
//! | Method | Feature | Backend |
//! |--------|---------|---------|
//! | Zlib, Gzip | `deflate` | `flate2` |
//! | LZ4 | `lz4` | `lz4_flex` (raw blocks) |
//! | Zstd | `zstd` | `zstd` |
//! | Oodle | - | not supported |

#[cfg(feature = "deflate")]
pub mod deflate;

#[cfg(feature = "lz4")]
pub mod lz4;

#[cfg(feature = "zstd")]
pub mod zstd;

use std::fmt;

use crate::{Error, Result};

/// Block size used by the Oodle bound computation.
const OODLE_BLOCK_LEN: u64 = 256 * 1024;

/// A compression method as named by a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum CompressionMethod {
    /// Stored without compression.
    #[default]
    None,
    /// zlib stream (RFC 1950).
    Zlib,
    /// gzip stream (RFC 1952).
    Gzip,
    /// Oodle, a proprietary codec.
    Oodle,
    /// Raw LZ4 block.
    Lz4,
    /// Zstandard frame.
    Zstd,
    /// Any other method name.
    Other(String),
}

impl CompressionMethod {
    /// Resolves a method from its container name, ignoring case.
    ///
    /// An empty name and `"None"` both mean no compression.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        match name.to_ascii_lowercase().as_str() {
            "" | "none" => Self::None,
            "zlib" => Self::Zlib,
            "gzip" => Self::Gzip,
            "oodle" => Self::Oodle,
            "lz4" => Self::Lz4,
            "zstd" => Self::Zstd,
            _ => Self::Other(name.to_string()),
        }
    }

    /// Returns the canonical method name.
    pub fn name(&self) -> &str {
        match self {
            Self::None => "None",
            Self::Zlib => "Zlib",
            Self::Gzip => "Gzip",
            Self::Oodle => "Oodle",
            Self::Lz4 => "LZ4",
            Self::Zstd => "Zstd",
            Self::Other(name) => name,
        }
    }

    /// Returns `true` for [`CompressionMethod::None`].
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns `true` if this build can decompress the method.
    pub fn is_supported(&self) -> bool {
        match self {
            Self::None => true,
            Self::Zlib | Self::Gzip => cfg!(feature = "deflate"),
            Self::Lz4 => cfg!(feature = "lz4"),
            Self::Zstd => cfg!(feature = "zstd"),
            Self::Oodle | Self::Other(_) => false,
        }
    }

    /// Returns the worst-case compressed size of a `len` byte block.
    ///
    /// Unknown methods report `len`; callers must still account for
    /// recorded block sizes exceeding the bound.
    pub fn compress_bound(&self, len: u64) -> u64 {
        match self {
            Self::None | Self::Other(_) => len,
            Self::Zlib => zlib_bound(len),
            Self::Gzip => zlib_bound(len) + 18,
            Self::Oodle => len + 274 * len.div_ceil(OODLE_BLOCK_LEN),
            Self::Lz4 => len + len / 255 + 16,
            Self::Zstd => {
                let margin = if len < (128 << 10) {
                    ((128 << 10) - len) >> 11
                } else {
                    0
                };
                len + (len >> 8) + margin
            }
        }
    }

    /// Decompresses `src` into `dst`, which must be filled exactly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedMethod`] if this build has no decoder for
    /// the method, and [`Error::Io`] with [`std::io::ErrorKind::InvalidData`]
    /// if the data does not decode to exactly `dst.len()` bytes.
    pub fn decompress(&self, dst: &mut [u8], src: &[u8]) -> Result<()> {
        match self {
            Self::None => {
                if src.len() != dst.len() {
                    return Err(Error::Io(length_mismatch(dst.len(), src.len())));
                }
                dst.copy_from_slice(src);
                Ok(())
            }
            #[cfg(feature = "deflate")]
            Self::Zlib => deflate::decompress_zlib(dst, src).map_err(Error::Io),
            #[cfg(feature = "deflate")]
            Self::Gzip => deflate::decompress_gzip(dst, src).map_err(Error::Io),
            #[cfg(feature = "lz4")]
            Self::Lz4 => lz4::decompress_block(dst, src).map_err(Error::Io),
            #[cfg(feature = "zstd")]
            Self::Zstd => self::zstd::decompress_block(dst, src).map_err(Error::Io),
            _ => Err(Error::unsupported_method(self.name())),
        }
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn zlib_bound(len: u64) -> u64 {
    len + (len >> 12) + (len >> 14) + (len >> 25) + 13
}

pub(crate) fn length_mismatch(expected: usize, actual: usize) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!(
            "block decoded to {} bytes, expected {}",
            actual, expected
        ),
    )
}
