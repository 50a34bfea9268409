//! Volume file source: positioned reads from one archive file.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Inclusive byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadInterval {
    pub start: u64,
    pub end: u64,
}

impl ReadInterval {
    /// Range of `len` bytes starting at `start`. `len` must be non-zero.
    pub fn at(start: u64, len: u64) -> Self {
        Self {
            start,
            end: start + len - 1,
        }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// One archive volume on the local file system.
#[derive(Debug)]
pub struct VolumeFile {
    file: File,
    length: u64,
}

impl VolumeFile {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let length = file.metadata()?.len();
        Ok(Self { file, length })
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    /// Bytes left from `offset` to the end of the volume.
    pub fn remaining(&self, offset: u64) -> u64 {
        self.length.saturating_sub(offset)
    }

    pub fn read_range(&mut self, interval: ReadInterval) -> io::Result<Vec<u8>> {
        let mut buffer = vec![0u8; interval.len() as usize];
        self.read_exact_at(interval.start, &mut buffer)?;
        Ok(buffer)
    }

    pub fn read_exact_at(&mut self, offset: u64, buffer: &mut [u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buffer)
    }
}
