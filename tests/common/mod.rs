#![allow(dead_code)]

use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};

/// How a test entry is stored in the archive.
#[derive(Clone, Copy)]
pub enum Method {
    Stored,
    Deflate,
    /// Payload copied as-is under an arbitrary method id.
    Other(u16),
}

pub struct TestEntry {
    pub name: &'static str,
    pub data: Vec<u8>,
    pub method: Method,
    /// Bytes placed in the local header's extra field only.
    pub local_extra: Vec<u8>,
}

impl TestEntry {
    pub fn stored(name: &'static str, data: impl Into<Vec<u8>>) -> Self {
        Self::with_method(name, data, Method::Stored)
    }

    pub fn deflated(name: &'static str, data: impl Into<Vec<u8>>) -> Self {
        Self::with_method(name, data, Method::Deflate)
    }

    pub fn directory(name: &'static str) -> Self {
        Self::with_method(name, Vec::new(), Method::Stored)
    }

    pub fn with_method(name: &'static str, data: impl Into<Vec<u8>>, method: Method) -> Self {
        Self {
            name,
            data: data.into(),
            method,
            local_extra: Vec::new(),
        }
    }

    pub fn local_extra(mut self, extra: &[u8]) -> Self {
        self.local_extra = extra.to_vec();
        self
    }
}

/// Byte layout of a built archive.
pub struct Layout {
    pub lfh_offsets: Vec<u64>,
    pub cd_offset: u64,
    pub cd_size: u64,
}

/// Assemble a ZIP archive with no archive comment.
pub fn build_zip(entries: &[TestEntry]) -> (Vec<u8>, Layout) {
    let mut out = Vec::new();
    let mut central = Vec::new();
    let mut lfh_offsets = Vec::new();

    for entry in entries {
        let crc = crc32fast::hash(&entry.data);
        let (method, payload) = match entry.method {
            Method::Stored => (0u16, entry.data.clone()),
            Method::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(&entry.data).unwrap();
                (8u16, encoder.finish().unwrap())
            }
            Method::Other(id) => (id, entry.data.clone()),
        };
        let offset = out.len() as u32;
        lfh_offsets.push(offset as u64);

        out.extend_from_slice(b"PK\x03\x04");
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&method.to_le_bytes());
        out.extend_from_slice(&0x6000u16.to_le_bytes());
        out.extend_from_slice(&0x5821u16.to_le_bytes());
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
        out.extend_from_slice(&(entry.local_extra.len() as u16).to_le_bytes());
        out.extend_from_slice(entry.name.as_bytes());
        out.extend_from_slice(&entry.local_extra);
        out.extend_from_slice(&payload);

        central.extend_from_slice(b"PK\x01\x02");
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&method.to_le_bytes());
        central.extend_from_slice(&0x6000u16.to_le_bytes());
        central.extend_from_slice(&0x5821u16.to_le_bytes());
        central.extend_from_slice(&crc.to_le_bytes());
        central.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        central.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
        central.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u32.to_le_bytes());
        central.extend_from_slice(&offset.to_le_bytes());
        central.extend_from_slice(entry.name.as_bytes());
    }

    let cd_offset = out.len() as u64;
    let cd_size = central.len() as u64;
    out.extend_from_slice(&central);

    out.extend_from_slice(b"PK\x05\x06");
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    out.extend_from_slice(&(cd_size as u32).to_le_bytes());
    out.extend_from_slice(&(cd_offset as u32).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());

    (
        out,
        Layout {
            lfh_offsets,
            cd_offset,
            cd_size,
        },
    )
}

/// Write `data` to `name` inside `dir` and return the path.
pub fn write_archive(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}

/// Deterministic, poorly compressible bytes.
pub fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}
