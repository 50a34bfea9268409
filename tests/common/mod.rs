//! Archive fixtures built in memory.
//!
//! Entries are written stored (method "store"), so the bundled engine can
//! read them back. Compressed entries carry their raw bytes but are flagged
//! with a compression method, which is enough to exercise the refusal path.

#![allow(dead_code)]

use std::path::PathBuf;

use tempfile::TempDir;

/// Modification time given to every fixture entry: 2020-09-13 12:26:40 UTC.
pub const MTIME_SECS: u64 = 1_600_000_000;
/// Access time written into RAR5 time records.
pub const ATIME_SECS: u32 = 1_600_000_100;
pub const ATIME_NANOS: u32 = 250;

const RAR4_SIGNATURE: &[u8] = b"Rar!\x1a\x07\x00";
const RAR5_SIGNATURE: &[u8] = b"Rar!\x1a\x07\x01\x00";

/// Install a test subscriber once; `RUST_LOG` selects what's shown.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xEDB8_8320
            } else {
                crc >> 1
            };
        }
    }
    !crc
}

#[derive(Debug, Clone)]
struct Item {
    name: String,
    data: Vec<u8>,
    dir: bool,
    compressed: bool,
    bad_crc: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ArchiveBuilder {
    items: Vec<Item>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(self, name: &str, data: &[u8]) -> Self {
        self.push(name, data, false, false, false)
    }

    pub fn dir(self, name: &str) -> Self {
        self.push(name, b"", true, false, false)
    }

    /// Entry flagged with a compression method.
    pub fn compressed(self, name: &str, data: &[u8]) -> Self {
        self.push(name, data, false, true, false)
    }

    /// Stored entry whose header CRC doesn't match its payload.
    pub fn corrupt(self, name: &str, data: &[u8]) -> Self {
        self.push(name, data, false, false, true)
    }

    fn push(mut self, name: &str, data: &[u8], dir: bool, compressed: bool, bad_crc: bool) -> Self {
        self.items.push(Item {
            name: name.to_string(),
            data: data.to_vec(),
            dir,
            compressed,
            bad_crc,
        });
        self
    }

    pub fn rar4(&self) -> Vec<u8> {
        let mut out = RAR4_SIGNATURE.to_vec();
        out.extend(rar4_block(0x73, 0x0000, &[0; 6]));

        for item in &self.items {
            let (name, unicode) = rar4_name(&item.name);
            let mut flags: u16 = 0x8000;
            if item.dir {
                flags |= 0x00E0;
            }
            if unicode {
                flags |= 0x0200;
            }

            let mut body = Vec::new();
            body.extend_from_slice(&(item.data.len() as u32).to_le_bytes());
            body.extend_from_slice(&(item.data.len() as u32).to_le_bytes());
            body.push(2);
            body.extend_from_slice(&item.crc().to_le_bytes());
            body.extend_from_slice(&dos_time().to_le_bytes());
            body.push(29);
            body.push(if item.compressed { 0x33 } else { 0x30 });
            body.extend_from_slice(&(name.len() as u16).to_le_bytes());
            body.extend_from_slice(&(if item.dir { 0x10u32 } else { 0x20 }).to_le_bytes());
            body.extend_from_slice(&name);

            out.extend(rar4_block(0x74, flags, &body));
            out.extend_from_slice(&item.data);
        }

        out.extend(rar4_block(0x7B, 0x4000, &[]));
        out
    }

    pub fn rar5(&self) -> Vec<u8> {
        let mut out = RAR5_SIGNATURE.to_vec();
        out.extend(rar5_block(&[1, 0, 0]));

        for item in &self.items {
            let extra = rar5_time_record();

            let mut body = Vec::new();
            vint(2, &mut body);
            let mut flags = 0x0001;
            if !item.data.is_empty() {
                flags |= 0x0002;
            }
            vint(flags, &mut body);
            vint(extra.len() as u64, &mut body);
            if !item.data.is_empty() {
                vint(item.data.len() as u64, &mut body);
            }

            let mut file_flags = 0x0002 | 0x0004;
            if item.dir {
                file_flags |= 0x0001;
            }
            vint(file_flags, &mut body);
            vint(item.data.len() as u64, &mut body);
            vint(if item.dir { 0x10 } else { 0x20 }, &mut body);
            body.extend_from_slice(&(MTIME_SECS as u32).to_le_bytes());
            body.extend_from_slice(&item.crc().to_le_bytes());
            // Compression info: method in bits 7-9, 0 = store.
            vint(if item.compressed { 3 << 7 } else { 0 }, &mut body);
            vint(1, &mut body);
            vint(item.name.len() as u64, &mut body);
            body.extend_from_slice(item.name.as_bytes());
            body.extend_from_slice(&extra);

            out.extend(rar5_block(&body));
            out.extend_from_slice(&item.data);
        }

        out.extend(rar5_block(&[5, 0, 0]));
        out
    }
}

impl Item {
    fn crc(&self) -> u32 {
        let crc = crc32(&self.data);
        if self.bad_crc {
            crc ^ 0xFFFF_FFFF
        } else {
            crc
        }
    }
}

/// Write `bytes` as `name` inside a fresh temporary directory.
pub fn write_archive(name: &str, bytes: &[u8]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    (dir, path)
}

fn rar4_block(kind: u8, flags: u16, body: &[u8]) -> Vec<u8> {
    let mut header = vec![0, 0, kind];
    header.extend_from_slice(&flags.to_le_bytes());
    header.extend_from_slice(&((7 + body.len()) as u16).to_le_bytes());
    header.extend_from_slice(body);
    let crc = (crc32(&header[2..]) & 0xFFFF) as u16;
    header[..2].copy_from_slice(&crc.to_le_bytes());
    header
}

/// RAR4 name field, using backslash separators. Non-ASCII names get the
/// narrow/wide layout with every unit stored in full.
fn rar4_name(name: &str) -> (Vec<u8>, bool) {
    let stored = name.replace('/', "\\");
    if stored.is_ascii() {
        return (stored.into_bytes(), false);
    }

    let mut field: Vec<u8> = stored
        .chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .collect();
    field.push(0);
    field.push(0);
    let units: Vec<u16> = stored.encode_utf16().collect();
    for group in units.chunks(4) {
        field.push(0xAA);
        for unit in group {
            field.extend_from_slice(&unit.to_le_bytes());
        }
    }
    (field, true)
}

fn dos_time() -> u32 {
    // 2020-09-13 12:26:40
    ((2020 - 1980) << 25) | (9 << 21) | (13 << 16) | (12 << 11) | (26 << 5) | (40 / 2)
}

fn vint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Header from HEAD_TYPE onward, framed with HEAD_SIZE and CRC32.
fn rar5_block(body: &[u8]) -> Vec<u8> {
    let mut sized = Vec::new();
    vint(body.len() as u64, &mut sized);
    sized.extend_from_slice(body);
    let mut header = crc32(&sized).to_le_bytes().to_vec();
    header.extend_from_slice(&sized);
    header
}

/// Extra-area time record carrying a Unix atime with nanoseconds.
fn rar5_time_record() -> Vec<u8> {
    let mut record = Vec::new();
    vint(0x03, &mut record);
    vint(0x01 | 0x08 | 0x10, &mut record);
    record.extend_from_slice(&ATIME_SECS.to_le_bytes());
    record.extend_from_slice(&ATIME_NANOS.to_le_bytes());

    let mut extra = Vec::new();
    vint(record.len() as u64, &mut extra);
    extra.extend_from_slice(&record);
    extra
}
