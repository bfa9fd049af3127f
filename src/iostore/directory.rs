//! The IoStore directory index.
//!
//! The index is a tree stored as flat tables. Directories point to their
//! first child, next sibling and first file; files point to the next file in
//! the same directory and carry the TOC index of their chunk. Names are
//! indices into a shared string table. A handle of `u32::MAX` means "none".

use std::io::{self, Cursor};

use crate::format::reader::{read_count, read_string, read_u32_le};

/// The "no entry" handle value.
pub const INVALID_HANDLE: u32 = u32::MAX;

/// Handle of a directory in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirectoryHandle(u32);

impl DirectoryHandle {
    /// The root directory.
    pub const ROOT: DirectoryHandle = DirectoryHandle(0);

    /// Returns the raw table index.
    pub fn index(&self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DirectoryEntry {
    name: u32,
    first_child: u32,
    next_sibling: u32,
    first_file: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileEntry {
    name: u32,
    next_file: u32,
    toc_index: u32,
}

/// A decoded directory index.
#[derive(Debug, Clone, Default)]
pub struct DirectoryIndex {
    mount_point: String,
    directories: Vec<DirectoryEntry>,
    files: Vec<FileEntry>,
    strings: Vec<String>,
}

fn check_handle(handle: u32, len: usize, what: &str) -> io::Result<()> {
    if handle != INVALID_HANDLE && handle as usize >= len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} handle {} out of range ({} entries)", what, handle, len),
        ));
    }
    Ok(())
}

impl DirectoryIndex {
    /// Parses a decrypted directory index.
    pub fn parse(data: &[u8]) -> io::Result<Self> {
        let mut r = Cursor::new(data);
        let mount_point = read_string(&mut r)?;

        let dir_count = read_count(&mut r)?;
        let mut directories = Vec::with_capacity(dir_count.min(data.len() / 16));
        for _ in 0..dir_count {
            directories.push(DirectoryEntry {
                name: read_u32_le(&mut r)?,
                first_child: read_u32_le(&mut r)?,
                next_sibling: read_u32_le(&mut r)?,
                first_file: read_u32_le(&mut r)?,
            });
        }

        let file_count = read_count(&mut r)?;
        let mut files = Vec::with_capacity(file_count.min(data.len() / 12));
        for _ in 0..file_count {
            files.push(FileEntry {
                name: read_u32_le(&mut r)?,
                next_file: read_u32_le(&mut r)?,
                toc_index: read_u32_le(&mut r)?,
            });
        }

        let string_count = read_count(&mut r)?;
        let mut strings = Vec::with_capacity(string_count.min(data.len() / 4));
        for _ in 0..string_count {
            strings.push(read_string(&mut r)?);
        }

        for dir in &directories {
            check_handle(dir.name, strings.len(), "directory name")?;
            check_handle(dir.first_child, directories.len(), "directory")?;
            check_handle(dir.next_sibling, directories.len(), "directory")?;
            check_handle(dir.first_file, files.len(), "file")?;
        }
        for file in &files {
            check_handle(file.name, strings.len(), "file name")?;
            check_handle(file.next_file, files.len(), "file")?;
        }

        Ok(Self {
            mount_point,
            directories,
            files,
            strings,
        })
    }

    /// Returns the mount point prefixed to every walked path.
    pub fn mount_point(&self) -> &str {
        &self.mount_point
    }

    /// Returns `true` if the index holds no directories.
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }

    fn name(&self, handle: u32) -> &str {
        self.strings
            .get(handle as usize)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Walks the tree below `root`, depth first.
    ///
    /// Each directory's files are yielded before its subdirectories. Paths
    /// are `mount point / directory path / file name`.
    pub fn walk(&self, root: DirectoryHandle) -> DirectoryWalk<'_> {
        let mut stack = Vec::new();
        if (root.0 as usize) < self.directories.len() {
            stack.push((root.0, String::new()));
        }
        DirectoryWalk {
            index: self,
            stack,
            current: None,
            budget: self.files.len() + self.directories.len(),
        }
    }
}

/// Joins two path fragments with a single `/`.
fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else if name.is_empty() {
        base.to_string()
    } else if base.ends_with('/') {
        format!("{}{}", base, name.trim_start_matches('/'))
    } else {
        format!("{}/{}", base, name.trim_start_matches('/'))
    }
}

/// A lazy depth-first walk over a [`DirectoryIndex`].
///
/// Yields `(path, toc_index)` pairs. Dropping the iterator early stops the
/// walk. Malformed indices with cyclic links are cut off after every entry
/// could have been visited once.
#[derive(Debug)]
pub struct DirectoryWalk<'a> {
    index: &'a DirectoryIndex,
    stack: Vec<(u32, String)>,
    current: Option<(u32, String)>,
    budget: usize,
}

impl Iterator for DirectoryWalk<'_> {
    type Item = (String, u32);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.budget == 0 {
                let pending_file = matches!(self.current, Some((file, _)) if file != INVALID_HANDLE);
                if pending_file || !self.stack.is_empty() {
                    log::warn!("Directory index contains cycles, walk stopped");
                    self.current = None;
                    self.stack.clear();
                }
                return None;
            }

            if let Some((file, dir_path)) = self.current.take() {
                if file != INVALID_HANDLE {
                    self.budget -= 1;
                    let entry = self.index.files[file as usize];
                    let base = join(self.index.mount_point(), &dir_path);
                    let path = join(&base, self.index.name(entry.name));
                    self.current = Some((entry.next_file, dir_path));
                    return Some((path, entry.toc_index));
                }
            }

            let (dir, path) = self.stack.pop()?;
            self.budget -= 1;
            let entry = self.index.directories[dir as usize];

            let mut children = Vec::new();
            let mut child = entry.first_child;
            while child != INVALID_HANDLE && children.len() < self.index.directories.len() {
                let child_entry = self.index.directories[child as usize];
                children.push((child, join(&path, self.index.name(child_entry.name))));
                child = child_entry.next_sibling;
            }
            self.stack.extend(children.into_iter().rev());
            self.current = Some((entry.first_file, path));
        }
    }
}
