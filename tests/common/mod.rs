//! Shared test utilities for integration tests.
//!
//! Containers are only ever read by the library, so the fixtures used by the
//! integration tests are produced by the small writers in this module.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use paktools::crypto::{AesKey, Guid, align_up, encrypt_in_place};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use sha1::{Digest, Sha1};

pub const PAK_MAGIC: u32 = 0x5A6F_12E1;

/// Returns `len` pseudo-random bytes from a fixed seed.
pub fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut data = vec![0u8; len];
    StdRng::seed_from_u64(seed).fill_bytes(&mut data);
    data
}

/// Returns `len` bytes that compress well.
pub fn text_bytes(len: usize) -> Vec<u8> {
    b"The quick brown fox jumps over the lazy dog. "
        .iter()
        .copied()
        .cycle()
        .take(len)
        .collect()
}

/// Compresses one block with the named method.
pub fn compress(method: &str, data: &[u8]) -> Vec<u8> {
    match method.to_ascii_lowercase().as_str() {
        #[cfg(feature = "deflate")]
        "zlib" => {
            use std::io::Write;
            let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(data).unwrap();
            encoder.finish().unwrap()
        }
        #[cfg(feature = "deflate")]
        "gzip" => {
            use std::io::Write;
            let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(data).unwrap();
            encoder.finish().unwrap()
        }
        #[cfg(feature = "lz4")]
        "lz4" => lz4_flex::block::compress(data),
        #[cfg(feature = "zstd")]
        "zstd" => zstd::bulk::compress(data, 3).unwrap(),
        other => panic!("test writer cannot compress with {other}"),
    }
}

fn sha1(data: &[u8]) -> [u8; 20] {
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&Sha1::digest(data));
    hash
}

fn fstring(s: &str) -> Vec<u8> {
    let mut out = ((s.len() + 1) as i32).to_le_bytes().to_vec();
    out.extend_from_slice(s.as_bytes());
    out.push(0);
    out
}

fn pad_and_encrypt(key: &AesKey, data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    out.resize(align_up(data.len() as u64) as usize, 0);
    encrypt_in_place(key, &mut out).unwrap();
    out
}

/// How one pak entry is stored.
#[derive(Debug, Clone)]
pub struct EntrySpec {
    pub path: String,
    pub data: Vec<u8>,
    /// Compression method name, `None` for stored entries.
    pub method: Option<String>,
    pub block_size: u32,
    pub encrypted: bool,
    pub deleted: bool,
}

impl EntrySpec {
    pub fn stored(path: &str, data: &[u8]) -> Self {
        Self {
            path: path.to_string(),
            data: data.to_vec(),
            method: None,
            block_size: 0,
            encrypted: false,
            deleted: false,
        }
    }

    pub fn compressed(path: &str, data: &[u8], method: &str, block_size: u32) -> Self {
        Self {
            method: Some(method.to_string()),
            block_size,
            ..Self::stored(path, data)
        }
    }

    pub fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self
    }

    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }
}

/// Descriptor fields as written to disk.
#[derive(Debug, Clone, Default)]
struct RawEntry {
    offset: u64,
    size: u64,
    uncompressed_size: u64,
    method: u32,
    blocks: Vec<(u64, u64)>,
    flags: u8,
    block_size: u32,
}

impl RawEntry {
    fn write(&self, version: u32, offset: u64) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(offset as i64).to_le_bytes());
        out.extend_from_slice(&(self.size as i64).to_le_bytes());
        out.extend_from_slice(&(self.uncompressed_size as i64).to_le_bytes());
        if version >= 8 {
            out.extend_from_slice(&self.method.to_le_bytes());
        } else {
            let legacy: i32 = match self.method {
                0 => 0,
                1 => 0x01,
                2 => 0x02,
                _ => 0x04,
            };
            out.extend_from_slice(&legacy.to_le_bytes());
        }
        if version < 2 {
            out.extend_from_slice(&0i64.to_le_bytes());
        }
        out.extend_from_slice(&[0u8; 20]);
        if version >= 3 {
            if self.method != 0 {
                out.extend_from_slice(&(self.blocks.len() as i32).to_le_bytes());
                for (start, end) in &self.blocks {
                    out.extend_from_slice(&(*start as i64).to_le_bytes());
                    out.extend_from_slice(&(*end as i64).to_le_bytes());
                }
            }
            out.push(self.flags);
            out.extend_from_slice(&self.block_size.to_le_bytes());
        }
        out
    }
}

/// Builds `.pak` files.
///
/// Versions below 10 use the flat index. Versions 10 and 11 use the path
/// hash index with a full directory index unless
/// [`without_filenames`](Self::without_filenames) is set; every entry is
/// stored as a full descriptor and addressed through a negative location.
#[derive(Debug, Clone)]
pub struct PakBuilder {
    version: u32,
    mount_point: String,
    methods: Vec<String>,
    key: Option<AesKey>,
    guid: Guid,
    encrypt_index: bool,
    entries: Vec<EntrySpec>,
    corrupt_header_of: Option<String>,
    oversize_blocks_of: Option<String>,
    directory_index: bool,
    encoded: Vec<u8>,
    method_slots: usize,
}

impl PakBuilder {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            mount_point: "../../../".to_string(),
            methods: Vec::new(),
            key: None,
            guid: Guid::ZERO,
            encrypt_index: false,
            entries: Vec::new(),
            corrupt_header_of: None,
            oversize_blocks_of: None,
            directory_index: true,
            encoded: Vec::new(),
            method_slots: 5,
        }
    }

    pub fn mount_point(mut self, mount_point: &str) -> Self {
        self.mount_point = mount_point.to_string();
        self
    }

    /// Sets the key used for encrypted entries and the index.
    pub fn key(mut self, key: AesKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Declares the archive's key GUID in the footer.
    pub fn guid(mut self, guid: Guid) -> Self {
        self.guid = guid;
        self
    }

    pub fn encrypt_index(mut self) -> Self {
        self.encrypt_index = true;
        self
    }

    pub fn entry(mut self, entry: EntrySpec) -> Self {
        self.entries.push(entry);
        self
    }

    /// Makes the in-data header of `path` disagree with the index.
    pub fn corrupt_header(mut self, path: &str) -> Self {
        self.corrupt_header_of = Some(path.to_string());
        self
    }

    /// Stretches the last block of compressed `path` to end 1 TiB past its
    /// start, in both the index and the in-data header.
    pub fn oversize_blocks(mut self, path: &str) -> Self {
        self.oversize_blocks_of = Some(path.to_string());
        self
    }

    /// Leaves the directory index out of a version 10+ archive.
    pub fn without_filenames(mut self) -> Self {
        self.directory_index = false;
        self
    }

    /// Places `bytes` verbatim in the encoded entry area of a version 10+
    /// index.
    pub fn encoded_entries(mut self, bytes: &[u8]) -> Self {
        self.encoded = bytes.to_vec();
        self
    }

    /// Sets how many compression method names a version 8+ footer carries.
    pub fn method_slots(mut self, slots: usize) -> Self {
        self.method_slots = slots;
        self
    }

    fn method_index(&mut self, name: &str) -> u32 {
        if self.version < 8 {
            return match name.to_ascii_lowercase().as_str() {
                "zlib" => 1,
                "gzip" => 2,
                _ => 3,
            };
        }
        if let Some(i) = self.methods.iter().position(|m| m.eq_ignore_ascii_case(name)) {
            return i as u32 + 1;
        }
        self.methods.push(name.to_string());
        self.methods.len() as u32
    }

    fn header_len(&self, compressed: bool, blocks: usize) -> u64 {
        let mut len = 8 + 8 + 8 + 4 + 20;
        if self.version < 2 {
            len += 8;
        }
        if self.version >= 3 {
            len += 1 + 4;
            if compressed {
                len += 4 + 16 * blocks as u64;
            }
        }
        len
    }

    fn encrypt(&self, data: &[u8]) -> Vec<u8> {
        let key = self.key.as_ref().expect("encrypted entries need a key");
        pad_and_encrypt(key, data)
    }

    /// Serializes the archive.
    pub fn build(mut self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut raw_entries = Vec::new();
        let specs = std::mem::take(&mut self.entries);

        for spec in &specs {
            let offset = out.len() as u64;
            let flags = (spec.encrypted as u8) | ((spec.deleted as u8) << 1);
            let mut raw = RawEntry {
                offset,
                uncompressed_size: spec.data.len() as u64,
                flags,
                ..RawEntry::default()
            };

            let payload = match &spec.method {
                None => {
                    raw.size = spec.data.len() as u64;
                    if spec.encrypted { self.encrypt(&spec.data) } else { spec.data.clone() }
                }
                Some(method) => {
                    raw.method = self.method_index(method);
                    raw.block_size = spec.block_size;
                    let chunks: Vec<&[u8]> = spec.data.chunks(spec.block_size as usize).collect();
                    let header_len = self.header_len(true, chunks.len());
                    let base = if self.version >= 5 { 0 } else { offset };
                    let mut payload = Vec::new();
                    for chunk in chunks {
                        let compressed = compress(method, chunk);
                        let start = base + header_len + payload.len() as u64;
                        raw.blocks.push((start, start + compressed.len() as u64));
                        raw.size += compressed.len() as u64;
                        if spec.encrypted {
                            payload.extend(self.encrypt(&compressed));
                        } else {
                            payload.extend(compressed);
                        }
                    }
                    payload
                }
            };

            if self.oversize_blocks_of.as_deref() == Some(spec.path.as_str()) {
                if let Some(last) = raw.blocks.last_mut() {
                    last.1 = last.0 + (1 << 40);
                }
            }

            let mut header = raw.clone();
            if self.corrupt_header_of.as_deref() == Some(spec.path.as_str()) {
                header.uncompressed_size += 1;
            }
            out.extend(header.write(self.version, 0));
            out.extend(payload);
            raw_entries.push(raw);
        }

        let (index_offset, index_size, index_hash) = if self.version >= 10 {
            self.write_path_hash_index(&mut out, &specs, &raw_entries)
        } else {
            let mut index = fstring(&self.mount_point);
            index.extend_from_slice(&(specs.len() as i32).to_le_bytes());
            for (spec, raw) in specs.iter().zip(&raw_entries) {
                index.extend(fstring(&spec.path));
                index.extend(raw.write(self.version, raw.offset));
            }
            self.append_region(&mut out, index)
        };

        self.write_footer(&mut out, index_offset, index_size, index_hash);
        out
    }

    /// Appends an index region, encrypting it if requested.
    fn append_region(&self, out: &mut Vec<u8>, mut data: Vec<u8>) -> (u64, u64, [u8; 20]) {
        let offset = out.len() as u64;
        if self.encrypt_index {
            data.resize(align_up(data.len() as u64) as usize, 0);
        }
        let hash = sha1(&data);
        if self.encrypt_index {
            let key = self.key.as_ref().expect("encrypted index needs a key");
            encrypt_in_place(key, &mut data).unwrap();
        }
        out.extend_from_slice(&data);
        (offset, data.len() as u64, hash)
    }

    fn write_path_hash_index(
        &self,
        out: &mut Vec<u8>,
        specs: &[EntrySpec],
        raw_entries: &[RawEntry],
    ) -> (u64, u64, [u8; 20]) {
        // directory -> [(file name, entry number)], in first-seen order
        let mut dirs: Vec<(String, Vec<(String, usize)>)> = Vec::new();
        let mut dir_slots: HashMap<String, usize> = HashMap::new();
        for (i, spec) in specs.iter().enumerate() {
            let (dir, file) = match spec.path.rfind('/') {
                Some(at) => (format!("{}/", &spec.path[..at]), spec.path[at + 1..].to_string()),
                None => ("/".to_string(), spec.path.clone()),
            };
            let slot = *dir_slots.entry(dir.clone()).or_insert_with(|| {
                dirs.push((dir, Vec::new()));
                dirs.len() - 1
            });
            dirs[slot].1.push((file, i));
        }

        let mut index = fstring(&self.mount_point);
        index.extend_from_slice(&(specs.len() as i32).to_le_bytes());
        index.extend_from_slice(&0u64.to_le_bytes());
        index.extend_from_slice(&0u32.to_le_bytes());

        let mut directory = (dirs.len() as i32).to_le_bytes().to_vec();
        for (dir, files) in &dirs {
            directory.extend(fstring(dir));
            directory.extend_from_slice(&(files.len() as i32).to_le_bytes());
            for (file, i) in files {
                directory.extend(fstring(file));
                directory.extend_from_slice(&(-(*i as i32) - 1).to_le_bytes());
            }
        }
        if self.directory_index {
            let (dir_offset, dir_size, dir_hash) = self.append_region(out, directory);
            index.extend_from_slice(&1u32.to_le_bytes());
            index.extend_from_slice(&(dir_offset as i64).to_le_bytes());
            index.extend_from_slice(&(dir_size as i64).to_le_bytes());
            index.extend_from_slice(&dir_hash);
        } else {
            index.extend_from_slice(&0u32.to_le_bytes());
        }
        index.extend_from_slice(&(self.encoded.len() as i32).to_le_bytes());
        index.extend_from_slice(&self.encoded);
        index.extend_from_slice(&(raw_entries.len() as i32).to_le_bytes());
        for raw in raw_entries {
            index.extend(raw.write(self.version, raw.offset));
        }
        self.append_region(out, index)
    }

    fn write_footer(&self, out: &mut Vec<u8>, index_offset: u64, index_size: u64, index_hash: [u8; 20]) {
        if self.version >= 7 {
            out.extend_from_slice(&self.guid.to_bytes());
        }
        out.push(self.encrypt_index as u8);
        out.extend_from_slice(&PAK_MAGIC.to_le_bytes());
        out.extend_from_slice(&(self.version as i32).to_le_bytes());
        out.extend_from_slice(&(index_offset as i64).to_le_bytes());
        out.extend_from_slice(&(index_size as i64).to_le_bytes());
        out.extend_from_slice(&index_hash);
        if self.version == 9 {
            out.push(0);
        }
        if self.version >= 8 {
            for i in 0..self.method_slots {
                let mut name = [0u8; 32];
                if let Some(method) = self.methods.get(i) {
                    name[..method.len()].copy_from_slice(method.as_bytes());
                }
                out.extend_from_slice(&name);
            }
        }
    }

    /// Serializes the archive to `dir/name`.
    pub fn write_to(self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.build()).unwrap();
        path
    }
}

#[derive(Debug, Default)]
struct TreeDir {
    name: u32,
    first_child: u32,
    next_sibling: u32,
    first_file: u32,
    last_child: u32,
    last_file: u32,
}

/// Builds `.utoc` + `.ucas` pairs with one chunk per file.
#[derive(Debug, Clone)]
pub struct UtocBuilder {
    version: u8,
    block_size: u32,
    mount_point: String,
    method: Option<String>,
    key: Option<AesKey>,
    guid: Guid,
    files: Vec<(String, Vec<u8>)>,
    unnamed: Vec<Vec<u8>>,
}

impl UtocBuilder {
    pub fn new() -> Self {
        Self {
            version: 8,
            block_size: 64 * 1024,
            mount_point: "../../../".to_string(),
            method: None,
            key: None,
            guid: Guid::ZERO,
            files: Vec::new(),
            unnamed: Vec::new(),
        }
    }

    pub fn block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn mount_point(mut self, mount_point: &str) -> Self {
        self.mount_point = mount_point.to_string();
        self
    }

    /// Compresses every block with `method`.
    pub fn method(mut self, method: &str) -> Self {
        self.method = Some(method.to_string());
        self
    }

    /// Encrypts blocks and the directory index with `key` under `guid`.
    pub fn key(mut self, guid: Guid, key: AesKey) -> Self {
        self.guid = guid;
        self.key = Some(key);
        self
    }

    pub fn file(mut self, path: &str, data: &[u8]) -> Self {
        self.files.push((path.to_string(), data.to_vec()));
        self
    }

    /// Adds a chunk that no directory entry names.
    pub fn unnamed_chunk(mut self, data: &[u8]) -> Self {
        self.unnamed.push(data.to_vec());
        self
    }

    fn directory_index(&self) -> Vec<u8> {
        const NONE: u32 = u32::MAX;
        let mut strings: Vec<String> = Vec::new();
        let intern = |s: &str, strings: &mut Vec<String>| -> u32 {
            match strings.iter().position(|x| x == s) {
                Some(i) => i as u32,
                None => {
                    strings.push(s.to_string());
                    strings.len() as u32 - 1
                }
            }
        };

        let mut dirs = vec![TreeDir {
            name: NONE,
            first_child: NONE,
            next_sibling: NONE,
            first_file: NONE,
            last_child: NONE,
            last_file: NONE,
        }];
        let mut files: Vec<[u32; 3]> = Vec::new();

        for (toc_index, (path, _)) in self.files.iter().enumerate() {
            let parts: Vec<&str> = path.split('/').collect();
            let (file_name, dir_parts) = parts.split_last().unwrap();
            let mut dir = 0usize;
            for part in dir_parts {
                let name = intern(part, &mut strings);
                let mut child = dirs[dir].first_child;
                while child != NONE && dirs[child as usize].name != name {
                    child = dirs[child as usize].next_sibling;
                }
                if child == NONE {
                    child = dirs.len() as u32;
                    dirs.push(TreeDir {
                        name,
                        first_child: NONE,
                        next_sibling: NONE,
                        first_file: NONE,
                        last_child: NONE,
                        last_file: NONE,
                    });
                    match dirs[dir].last_child {
                        NONE => dirs[dir].first_child = child,
                        last => dirs[last as usize].next_sibling = child,
                    }
                    dirs[dir].last_child = child;
                }
                dir = child as usize;
            }

            let name = intern(file_name, &mut strings);
            let file = files.len() as u32;
            files.push([name, NONE, toc_index as u32]);
            match dirs[dir].last_file {
                NONE => dirs[dir].first_file = file,
                last => files[last as usize][1] = file,
            }
            dirs[dir].last_file = file;
        }

        let mut out = fstring(&self.mount_point);
        out.extend_from_slice(&(dirs.len() as i32).to_le_bytes());
        for d in &dirs {
            for v in [d.name, d.first_child, d.next_sibling, d.first_file] {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        out.extend_from_slice(&(files.len() as i32).to_le_bytes());
        for f in &files {
            for v in f {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        out.extend_from_slice(&(strings.len() as i32).to_le_bytes());
        for s in &strings {
            out.extend(fstring(s));
        }
        out
    }

    /// Writes `dir/<name>.utoc` and `dir/<name>.ucas`, returning the TOC path.
    pub fn write_to(self, dir: &Path, name: &str) -> PathBuf {
        let chunks: Vec<&Vec<u8>> = self.files.iter().map(|(_, d)| d).chain(self.unnamed.iter()).collect();
        let block_size = self.block_size as u64;

        let mut ucas = Vec::new();
        let mut chunk_ids = Vec::new();
        let mut offsets = Vec::new();
        let mut blocks = Vec::new();
        let mut next_block = 0u64;

        for (i, data) in chunks.iter().enumerate() {
            let mut id = [0u8; 12];
            id[..8].copy_from_slice(&(i as u64 + 1).to_le_bytes());
            id[11] = 2;
            chunk_ids.push(id);
            offsets.push((next_block * block_size, data.len() as u64));

            for block in data.chunks(self.block_size as usize) {
                let (stored, method_index) = match &self.method {
                    Some(method) => (compress(method, block), 1u8),
                    None => (block.to_vec(), 0u8),
                };
                let offset = ucas.len() as u64;
                let compressed_size = stored.len() as u32;
                match &self.key {
                    Some(key) => ucas.extend(pad_and_encrypt(key, &stored)),
                    None => ucas.extend(stored),
                }
                blocks.push((offset, compressed_size, block.len() as u32, method_index));
                next_block += 1;
            }
        }

        let mut directory = self.directory_index();
        if let Some(key) = &self.key {
            directory = pad_and_encrypt(key, &directory);
        }

        let mut flags = 1u8 << 3;
        if self.method.is_some() {
            flags |= 1;
        }
        if self.key.is_some() {
            flags |= 1 << 1;
        }

        let method_count = self.method.is_some() as u32;
        let mut toc = Vec::new();
        toc.extend_from_slice(b"-==--==--==--==-");
        toc.push(self.version);
        toc.push(0);
        toc.extend_from_slice(&[0, 0]);
        toc.extend_from_slice(&144u32.to_le_bytes());
        toc.extend_from_slice(&(chunk_ids.len() as u32).to_le_bytes());
        toc.extend_from_slice(&(blocks.len() as u32).to_le_bytes());
        toc.extend_from_slice(&12u32.to_le_bytes());
        toc.extend_from_slice(&method_count.to_le_bytes());
        toc.extend_from_slice(&32u32.to_le_bytes());
        toc.extend_from_slice(&self.block_size.to_le_bytes());
        toc.extend_from_slice(&(directory.len() as u32).to_le_bytes());
        toc.extend_from_slice(&1u32.to_le_bytes());
        toc.extend_from_slice(&0x1234u64.to_le_bytes());
        toc.extend_from_slice(&self.guid.to_bytes());
        toc.push(flags);
        toc.push(0);
        toc.extend_from_slice(&[0, 0]);
        toc.extend_from_slice(&0u32.to_le_bytes());
        toc.extend_from_slice(&0u64.to_le_bytes());
        toc.extend_from_slice(&0u32.to_le_bytes());
        toc.extend_from_slice(&0u32.to_le_bytes());
        toc.extend_from_slice(&[0u8; 40]);
        assert_eq!(toc.len(), 144);

        for id in &chunk_ids {
            toc.extend_from_slice(id);
        }
        for (offset, length) in &offsets {
            toc.extend_from_slice(&offset.to_be_bytes()[3..]);
            toc.extend_from_slice(&length.to_be_bytes()[3..]);
        }
        for (offset, compressed, uncompressed, method) in &blocks {
            toc.extend_from_slice(&offset.to_le_bytes()[..5]);
            toc.extend_from_slice(&compressed.to_le_bytes()[..3]);
            toc.extend_from_slice(&uncompressed.to_le_bytes()[..3]);
            toc.push(*method);
        }
        if let Some(method) = &self.method {
            let mut raw = [0u8; 32];
            raw[..method.len()].copy_from_slice(method.as_bytes());
            toc.extend_from_slice(&raw);
        }
        toc.extend(directory);

        let toc_path = dir.join(format!("{name}.utoc"));
        std::fs::write(&toc_path, toc).unwrap();
        std::fs::write(dir.join(format!("{name}.ucas")), ucas).unwrap();
        toc_path
    }
}

/// A fixed test key.
pub fn test_key(byte: u8) -> AesKey {
    AesKey::from_bytes([byte; 32])
}
