//! Random-access reads over a firmware image.
//!
//! The reader owns the underlying source for the duration of one operation
//! and is dropped (closing the handle) on scoped exit. All typed reads are
//! big-endian; the little-endian device sections are decoded from raw byte
//! ranges by their own decoders.

use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{FwError, Result};

/// Bounds-checked reader over an image file or an in-memory buffer.
#[derive(Debug)]
pub struct ImageReader<R> {
    src: R,
    len: u64,
}

impl ImageReader<File> {
    /// Open an image file read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut src = File::open(path)?;
        let len = src.seek(SeekFrom::End(0))?;
        Ok(Self { src, len })
    }
}

impl ImageReader<Cursor<Vec<u8>>> {
    /// Wrap an in-memory image.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let len = data.len() as u64;
        Self {
            src: Cursor::new(data),
            len,
        }
    }
}

impl<R: Read + Seek> ImageReader<R> {
    /// Total image length in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True for a zero-length image.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn check_range(&self, offset: u64, len: u64) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(FwError::OutOfRange {
                offset,
                len,
                image_len: self.len,
            }),
        }
    }

    /// Read `len` bytes at `offset`.
    pub fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_into(offset, &mut buf)?;
        Ok(buf)
    }

    /// Fill `buf` from `offset`.
    pub fn read_into(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.check_range(offset, buf.len() as u64)?;
        self.src.seek(SeekFrom::Start(offset))?;
        self.src.read_exact(buf)?;
        Ok(())
    }

    /// Read a big-endian 32-bit integer at `offset`.
    pub fn read_u32_be(&mut self, offset: u64) -> Result<u32> {
        self.check_range(offset, 4)?;
        self.src.seek(SeekFrom::Start(offset))?;
        Ok(self.src.read_u32::<BigEndian>()?)
    }

    /// Read a big-endian 64-bit integer at `offset`.
    pub fn read_u64_be(&mut self, offset: u64) -> Result<u64> {
        self.check_range(offset, 8)?;
        self.src.seek(SeekFrom::Start(offset))?;
        Ok(self.src.read_u64::<BigEndian>()?)
    }

    /// Read the whole image into memory (the rewriter works on owned bytes).
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        let len = usize::try_from(self.len)
            .map_err(|_| FwError::parse("image too large for this platform"))?;
        self.read_at(0, len)
    }

    /// Probe `candidates` in order for a 64-bit big-endian `pattern`; the
    /// earliest match wins. Candidates past the end of the image are skipped.
    pub fn find_first(&mut self, pattern: u64, candidates: &[u64]) -> Result<u64> {
        for &offset in candidates {
            if offset.checked_add(8).map_or(true, |end| end > self.len) {
                continue;
            }
            if self.read_u64_be(offset)? == pattern {
                return Ok(offset);
            }
        }
        Err(FwError::MagicNotFound)
    }
}
