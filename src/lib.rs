//! # paktools
//!
//! A pure-Rust library for listing and extracting Unreal Engine pak and
//! IoStore containers.
//!
//! Two container formats are supported:
//!
//! - `.pak` archives: a single file holding the payload, an entry index and
//!   a footer. Entries may be compressed in fixed-size blocks and encrypted
//!   with AES-256.
//! - IoStore containers: a `.utoc` table of contents addressing chunks in
//!   one or more `.ucas` partition files, with an optional directory index
//!   that names them.
//!
//! ## Quick Start
//!
//! ### Listing containers
//!
//! ```rust,no_run
//! use paktools::{KeyChain, Result};
//! use paktools::tool::list_files;
//!
//! fn main() -> Result<()> {
//!     let listing = list_files(&["pakchunk0.pak", "global.utoc"], &KeyChain::new())?;
//!     for line in listing.lines() {
//!         println!("{}", line);
//!     }
//!     println!("{}", listing.total_line());
//!     Ok(())
//! }
//! ```
//!
//! ### Extracting an encrypted archive
//!
//! ```rust,no_run
//! use paktools::{AesKey, ExtractOptions, KeyChain, Result};
//! use paktools::tool::extract_files;
//!
//! fn main() -> Result<()> {
//!     let key = AesKey::parse("0x0000000000000000000000000000000000000000000000000000000000000000")?;
//!     let keys = KeyChain::new().with_principal_key(key);
//!     let report = extract_files("pakchunk0.pak", "./output", &keys, &ExtractOptions::default())?;
//!     if report.is_err() {
//!         eprintln!("{} entries failed", report.errors);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ### Working with a pak archive directly
//!
//! ```rust,no_run
//! use paktools::read::{PakArchive, ScratchBuffer, copy_compressed, copy_plain};
//! use paktools::{KeyChain, Result};
//!
//! fn main() -> Result<()> {
//!     let keys = KeyChain::new();
//!     let mut archive = PakArchive::open_path("pakchunk0.pak", &keys)?;
//!     let mut buffer = vec![0u8; 64 * 1024];
//!     let mut scratch = ScratchBuffer::new();
//!
//!     let entries: Vec<_> = archive.entries().cloned().collect();
//!     for item in entries {
//!         let header = archive.read_entry_header(&item.entry)?;
//!         let mut out = Vec::new();
//!         let (info, _, reader) = archive.split_mut();
//!         if header.is_compressed() {
//!             copy_compressed(&mut out, reader, &item.entry, &mut scratch, &keys, info)?;
//!         } else {
//!             copy_plain(&mut out, reader, &item.entry, &mut buffer, &keys)?;
//!         }
//!         println!("{:?}: {} bytes", item.path, out.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `deflate` | Yes | Zlib and Gzip blocks via `flate2` |
//! | `lz4` | Yes | LZ4 blocks via `lz4_flex` |
//! | `zstd` | Yes | Zstandard blocks via `zstd` |
//! | `cli` | No | The `paktools` command-line tool |
//!
//! Oodle-compressed entries are recognized but cannot be decoded; they are
//! reported as per-entry failures.
//!
//! ## Error handling
//!
//! Every fallible operation returns [`Result`]. Errors that make a whole
//! container unreadable (a missing key, a corrupt index) are returned from
//! the open and extract functions. Failures of single entries during
//! extraction are collected in an [`ExtractReport`] and logged through the
//! [`log`](https://docs.rs/log) facade.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod codec;
pub mod crypto;
pub mod error;
pub mod format;
pub mod iostore;
pub mod read;
pub mod tool;

pub use error::{Error, Result};

pub use codec::CompressionMethod;
pub use crypto::{AesKey, Guid, KeyChain, NamedKey};

// Re-export reading API at crate root for convenience
pub use read::{ExtractOptions, ExtractReport, PakArchive};

pub use iostore::IoStoreReader;
pub use tool::{Container, ContainerKind, ToolFileEntry};
