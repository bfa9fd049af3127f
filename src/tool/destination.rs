//! Extraction destinations.
//!
//! - [`FilesystemDestination`] writes files below an output directory
//! - [`MemoryDestination`] keeps extracted files in memory

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// Where extracted entries are written.
pub trait ExtractDestination {
    /// Creates a writer for the entry with logical name `name`.
    ///
    /// Data is written sequentially; the writer is flushed by the caller
    /// and closed when dropped.
    fn create_writer(&mut self, name: &str) -> Result<Box<dyn Write + '_>>;
}

/// Converts a logical name to a relative path that stays inside the output
/// directory.
///
/// Both `/` and `\` separate components. Empty and `.` components are
/// dropped.
///
/// # Errors
///
/// Returns [`Error::PathTraversal`] for absolute names, names with `..`
/// components or drive prefixes, and names with no components left.
pub fn sanitize_relative_path(name: &str) -> Result<PathBuf> {
    let traversal = || Error::PathTraversal {
        path: name.to_string(),
    };

    if name.starts_with('/') || name.starts_with('\\') {
        return Err(traversal());
    }

    let mut out = PathBuf::new();
    for part in name.split(['/', '\\']) {
        match part {
            "" | "." => continue,
            ".." => return Err(traversal()),
            _ if part.contains(':') => return Err(traversal()),
            _ => {}
        }
        if !matches!(Path::new(part).components().next(), Some(Component::Normal(_))) {
            return Err(traversal());
        }
        out.push(part);
    }

    if out.as_os_str().is_empty() {
        return Err(traversal());
    }
    Ok(out)
}

/// Filesystem extraction destination.
///
/// Parent directories are created as needed. Partially written files are
/// kept, so a failing entry leaves the bytes decoded before the failure.
#[derive(Debug, Clone)]
pub struct FilesystemDestination {
    output_dir: PathBuf,
}

impl FilesystemDestination {
    /// Creates a destination rooted at `output_dir`.
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// Returns the output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Resolves the output path of the entry named `name`.
    pub fn resolve_path(&self, name: &str) -> Result<PathBuf> {
        Ok(self.output_dir.join(sanitize_relative_path(name)?))
    }
}

impl ExtractDestination for FilesystemDestination {
    fn create_writer(&mut self, name: &str) -> Result<Box<dyn Write + '_>> {
        let path = self.resolve_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        Ok(Box::new(BufWriter::new(file)))
    }
}

/// In-memory extraction destination.
///
/// Files are keyed by their sanitized relative path with `/` separators.
#[derive(Debug, Clone, Default)]
pub struct MemoryDestination {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryDestination {
    /// Creates an empty destination.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all extracted files.
    pub fn files(&self) -> &HashMap<String, Vec<u8>> {
        &self.files
    }

    /// Returns the contents of one file.
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// Returns the number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if nothing was extracted.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl ExtractDestination for MemoryDestination {
    fn create_writer(&mut self, name: &str) -> Result<Box<dyn Write + '_>> {
        let key = sanitize_relative_path(name)?
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .collect::<Vec<_>>()
            .join("/");
        let buffer = self.files.entry(key).or_default();
        buffer.clear();
        Ok(Box::new(buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_accepts_relative_names() {
        assert_eq!(sanitize_relative_path("a/b/c.txt").unwrap(), Path::new("a").join("b").join("c.txt"));
        assert_eq!(sanitize_relative_path("a\\b.txt").unwrap(), Path::new("a").join("b.txt"));
        assert_eq!(sanitize_relative_path("a//./b").unwrap(), Path::new("a").join("b"));
    }

    #[test]
    fn test_sanitize_rejects_escapes() {
        for name in ["../x", "a/../../x", "/etc/passwd", "\\\\server\\share", "C:\\x", "", "./"] {
            let err = sanitize_relative_path(name).unwrap_err();
            assert!(matches!(err, Error::PathTraversal { .. }), "{name}");
        }
    }

    #[test]
    fn test_filesystem_destination_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let mut dest = FilesystemDestination::new(dir.path());
        {
            let mut writer = dest.create_writer("Game/Content/a.bin").unwrap();
            writer.write_all(b"hello").unwrap();
            writer.flush().unwrap();
        }
        let written = fs::read(dir.path().join("Game").join("Content").join("a.bin")).unwrap();
        assert_eq!(written, b"hello");
    }

    #[test]
    fn test_filesystem_destination_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let mut dest = FilesystemDestination::new(dir.path().join("out"));
        assert!(dest.create_writer("../escape.txt").is_err());
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[test]
    fn test_memory_destination() {
        let mut dest = MemoryDestination::new();
        dest.create_writer("dir\\file.txt").unwrap().write_all(b"abc").unwrap();
        assert_eq!(dest.get("dir/file.txt"), Some(&b"abc"[..]));
        assert_eq!(dest.len(), 1);
    }
}
