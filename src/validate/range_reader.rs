//! Byte-range access to a container, independent of where it lives.

use crate::errors::{GdalError, Result};
use crate::vsi::{self, VsiFile};

/// Random-access reads from a local file, a memory buffer or a remote object.
pub trait RangeReader {
    /// Reads exactly `length` bytes at `offset`; a short read is an error.
    fn read_range(&self, offset: u64, length: usize) -> Result<Vec<u8>>;

    fn size(&self) -> u64;

    /// Human-readable name used in reports and errors.
    fn identifier(&self) -> &str;

    /// Remote sources make every read a network round trip.
    fn is_local(&self) -> bool {
        !vsi::is_remote(self.identifier())
    }
}

fn short_read(identifier: &str, offset: u64, length: usize, got: usize) -> GdalError {
    GdalError::BadArgument(format!(
        "'{identifier}' is truncated: wanted {length} bytes at offset {offset}, got {got}"
    ))
}

/// Reads through GDAL's virtual file system, so `/vsicurl/` and `/vsis3/`
/// sources work the same as local paths.
#[derive(Debug)]
pub struct VsiRangeReader {
    file: VsiFile,
}

impl VsiRangeReader {
    pub fn open(path: &str) -> Result<Self> {
        Ok(Self {
            file: VsiFile::open(path)?,
        })
    }
}

impl From<VsiFile> for VsiRangeReader {
    fn from(file: VsiFile) -> Self {
        Self { file }
    }
}

impl RangeReader for VsiRangeReader {
    fn read_range(&self, offset: u64, length: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; length];
        let got = self.file.read_at(offset, &mut buffer)?;
        if got != length {
            return Err(short_read(self.file.path(), offset, length, got));
        }
        Ok(buffer)
    }

    fn size(&self) -> u64 {
        self.file.size()
    }

    fn identifier(&self) -> &str {
        self.file.path()
    }
}

/// An in-memory container, used for synthetic layouts.
#[derive(Debug, Clone)]
pub struct MemoryReader {
    name: String,
    bytes: Vec<u8>,
}

impl MemoryReader {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

impl RangeReader for MemoryReader {
    fn read_range(&self, offset: u64, length: usize) -> Result<Vec<u8>> {
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(self.bytes.len());
        let end = start.saturating_add(length).min(self.bytes.len());
        if end - start != length {
            return Err(short_read(&self.name, offset, length, end - start));
        }
        Ok(self.bytes[start..end].to_vec())
    }

    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.name
    }

    fn is_local(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_memory_reader_bounds() {
        let reader = MemoryReader::new("mem", (0u8..10).collect());
        assert_eq!(reader.size(), 10);
        assert_eq!(reader.read_range(2, 3).unwrap(), vec![2, 3, 4]);
        assert_eq!(reader.read_range(10, 0).unwrap(), Vec::<u8>::new());
        assert!(reader.read_range(8, 4).is_err());
        assert!(reader.read_range(u64::MAX, 1).is_err());
        assert!(reader.is_local());
    }

    #[test]
    fn test_vsi_reader_on_mem_file() {
        let name = "/vsimem/range-reader-test.bin";
        vsi::create_mem_file(Path::new(name), b"II*\0abcdefgh".to_vec()).unwrap();
        let reader = VsiRangeReader::open(name).unwrap();
        assert_eq!(reader.size(), 12);
        assert_eq!(reader.read_range(0, 4).unwrap(), b"II*\0");
        assert!(reader.read_range(10, 4).is_err());
        assert!(reader.is_local());
        drop(reader);
        vsi::unlink_mem_file(Path::new(name)).unwrap();
    }
}
