//! Shared helpers for integration tests.
//!
//! Archives are built through the public session API unless a test needs
//! bytes the writer would never produce (legacy charsets, odd flags); those
//! come from [`StoredZip`], a minimal hand-assembled writer for stored
//! entries.

#![allow(dead_code)]

use std::io::Read;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use zipsession::{Archive, OpenFlags, Password, Result};

/// General purpose bit 11: the name is UTF-8.
pub const UTF8_FLAG: u16 = 0x0800;

/// Creates a scratch directory and the path of a not yet existing archive in it.
pub fn scratch() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.zip");
    (dir, path)
}

/// Creates an archive at `path` holding `entries`.
pub fn create_archive(path: &Path, entries: &[(&str, &[u8])]) -> Result<()> {
    let archive = Archive::open(path, OpenFlags::CREATE)?;
    for (name, data) in entries {
        archive.add_bytes(name, data)?;
    }
    archive.close()
}

/// Creates a scratch archive with three small text entries.
pub fn sample_archive() -> (TempDir, PathBuf) {
    let (dir, path) = scratch();
    create_archive(
        &path,
        &[
            ("readme.txt", b"Read me first"),
            ("docs/guide.txt", b"A longer guide with some words in it"),
            ("docs/empty.txt", b""),
        ],
    )
    .unwrap();
    (dir, path)
}

/// Reads the whole content of the entry called `name`.
pub fn read_entry(archive: &Archive, name: &str, password: Option<&Password>) -> Result<Vec<u8>> {
    let mut stream = archive.input_stream_by_name(name, password)?;
    let mut data = Vec::new();
    loop {
        let mut chunk = [0u8; 4096];
        let n = stream.read_chunk(&mut chunk)?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&chunk[..n]);
    }
    Ok(data)
}

/// Reads the entry called `name` through the `std::io::Read` adapter.
pub fn read_entry_io(archive: &Archive, name: &str) -> Vec<u8> {
    let mut stream = archive.input_stream_by_name(name, None).unwrap();
    let mut data = Vec::new();
    stream.read_to_end(&mut data).unwrap();
    data
}

/// Reopens `path` read-only and returns every live entry's name and content.
pub fn read_all(path: &Path) -> Vec<(String, Vec<u8>)> {
    let archive = Archive::open(path, OpenFlags::READ_ONLY).unwrap();
    let entries: Vec<_> = archive.entries().collect::<Result<_>>().unwrap();
    let mut out = Vec::new();
    for entry in entries {
        let mut stream = archive.input_stream(&entry, None).unwrap();
        let mut data = Vec::new();
        stream.read_to_end(&mut data).unwrap();
        out.push((entry.name().to_string(), data));
    }
    archive.close().unwrap();
    out
}

/// Random bytes that do not compress well.
pub fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    use rand::{RngCore, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill_bytes(&mut data);
    data
}

/// Text that compresses well.
pub fn repetitive_text(len: usize) -> Vec<u8> {
    b"the quick brown fox jumps over the lazy dog\n"
        .iter()
        .copied()
        .cycle()
        .take(len)
        .collect()
}

/// A hand-assembled ZIP holding stored entries with raw names and flags.
#[derive(Default)]
pub struct StoredZip {
    entries: Vec<(Vec<u8>, Vec<u8>, u16)>,
    comment: Vec<u8>,
}

impl StoredZip {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry whose name bytes are written as given.
    pub fn entry(mut self, raw_name: &[u8], data: &[u8], flags: u16) -> Self {
        self.entries
            .push((raw_name.to_vec(), data.to_vec(), flags));
        self
    }

    pub fn comment(mut self, raw: &[u8]) -> Self {
        self.comment = raw.to_vec();
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        // 2020-01-01 00:00:00
        const DOS_DATE: u16 = (40 << 9) | (1 << 5) | 1;
        const DOS_TIME: u16 = 0;

        let mut out = Vec::new();
        let mut central = Vec::new();
        for (name, data, flags) in &self.entries {
            let offset = out.len() as u32;
            let crc = crc32fast::hash(data);
            let size = data.len() as u32;

            out.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
            out.extend_from_slice(&20u16.to_le_bytes());
            out.extend_from_slice(&flags.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&DOS_TIME.to_le_bytes());
            out.extend_from_slice(&DOS_DATE.to_le_bytes());
            out.extend_from_slice(&crc.to_le_bytes());
            out.extend_from_slice(&size.to_le_bytes());
            out.extend_from_slice(&size.to_le_bytes());
            out.extend_from_slice(&(name.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(name);
            out.extend_from_slice(data);

            central.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
            central.extend_from_slice(&20u16.to_le_bytes());
            central.extend_from_slice(&20u16.to_le_bytes());
            central.extend_from_slice(&flags.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&DOS_TIME.to_le_bytes());
            central.extend_from_slice(&DOS_DATE.to_le_bytes());
            central.extend_from_slice(&crc.to_le_bytes());
            central.extend_from_slice(&size.to_le_bytes());
            central.extend_from_slice(&size.to_le_bytes());
            central.extend_from_slice(&(name.len() as u16).to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&0u32.to_le_bytes());
            central.extend_from_slice(&offset.to_le_bytes());
            central.extend_from_slice(name);
        }

        let central_offset = out.len() as u32;
        let count = self.entries.len() as u16;
        out.extend_from_slice(&central);
        out.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&(central.len() as u32).to_le_bytes());
        out.extend_from_slice(&central_offset.to_le_bytes());
        out.extend_from_slice(&(self.comment.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.comment);
        out
    }

    pub fn write_to(&self, path: &Path) {
        std::fs::write(path, self.to_bytes()).unwrap();
    }
}
