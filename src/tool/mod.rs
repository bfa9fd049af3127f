//! List and extract operations over pak and IoStore containers.
//!
//! This is the layer the `paktools` binary drives. It opens containers by
//! extension, turns their contents into [`ToolFileEntry`] records for
//! listing, and extracts entries through an [`ExtractDestination`],
//! counting per-entry failures in an [`ExtractReport`] instead of aborting.
//!
//! # Example
//!
//! ```rust,no_run
//! use paktools::crypto::KeyChain;
//! use paktools::read::ExtractOptions;
//! use paktools::tool::{extract_files, list_files};
//!
//! let keys = KeyChain::new();
//! let listing = list_files(&["game.pak"], &keys)?;
//! for line in listing.lines() {
//!     println!("{}", line);
//! }
//!
//! let report = extract_files("game.pak", "out", &keys, &ExtractOptions::default())?;
//! println!("{} files written", report.files_extracted);
//! # Ok::<(), paktools::Error>(())
//! ```
//!
//! [`ExtractReport`]: crate::read::ExtractReport

mod container;
mod destination;
mod extract;
mod listing;

pub use container::{Container, ContainerKind};
pub use destination::{ExtractDestination, FilesystemDestination, MemoryDestination, sanitize_relative_path};
pub use extract::{extract_files, extract_iostore, extract_pak};
pub use listing::{Listing, list_files, sort_by_compressed_size};

/// One file as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFileEntry {
    /// Logical path, including the container's mount point.
    pub path: String,
    /// Size after decompression.
    pub uncompressed_size: u64,
    /// Stored size.
    pub compressed_size: u64,
    /// The kind of container the entry came from.
    pub source: ContainerKind,
}

const SIZE_UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Formats a byte count with two decimals in binary units.
///
/// # Example
///
/// ```rust
/// use paktools::tool::human_size;
///
/// assert_eq!(human_size(512), "512.00 B");
/// assert_eq!(human_size(1536), "1.50 KB");
/// ```
pub fn human_size(size: u64) -> String {
    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, SIZE_UNITS[unit])
}

/// Returns the stored size as a percentage of the uncompressed size.
///
/// Empty entries report 0.
pub fn compression_percent(compressed: u64, uncompressed: u64) -> f64 {
    if uncompressed == 0 {
        return 0.0;
    }
    100.0 * compressed as f64 / uncompressed as f64
}

/// Strips the leading run of `.`, `/` and `\` from a logical name.
///
/// IoStore directory walks prefix names with the mount point, which is
/// usually a relative path such as `../../../`.
pub fn normalize_logical_name(name: &str) -> &str {
    name.trim_start_matches(['.', '/', '\\'])
}
