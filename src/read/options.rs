//! Extraction options.

use crate::crypto::{AES_BLOCK_SIZE, align_down};

/// Default size of the buffer used to copy uncompressed entries.
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// Options for extraction operations.
///
/// # Example
///
/// ```rust
/// use paktools::read::ExtractOptions;
///
/// let options = ExtractOptions::new().buffer_size(1000);
/// assert_eq!(options.copy_buffer_size(), 992);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    buffer_size: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl ExtractOptions {
    /// Creates options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the buffer size used for uncompressed entries.
    ///
    /// The size is rounded down to the AES block size, with a minimum of
    /// one block.
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = align_down(size).max(AES_BLOCK_SIZE);
        self
    }

    /// Returns the effective copy buffer size.
    pub fn copy_buffer_size(&self) -> usize {
        self.buffer_size
    }
}
