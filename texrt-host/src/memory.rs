//! Memory bridge over the module's linear memory
//!
//! A [`MemoryBridge`] borrows the raw bytes of the shared memory region for the
//! duration of one host call and translates `(address, length)` pairs coming
//! from the module into slices and integers. It owns nothing and copies nothing
//! unless asked to.
//!
//! Every access is bounds-checked. A bad address is a fault in the integration,
//! so it is reported as [`HostError::MemoryAccess`] and ends the run; there is
//! no recovery path.

use crate::error::{HostError, HostResult};
use byteorder::{ByteOrder, LittleEndian};

/// Typed view of the shared memory region
pub struct MemoryBridge<'a> {
    data: &'a mut [u8],
}

impl<'a> MemoryBridge<'a> {
    /// Wrap the bytes of a memory region
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data }
    }

    /// Size of the region in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    fn range(&self, address: usize, length: usize) -> HostResult<std::ops::Range<usize>> {
        let end = address
            .checked_add(length)
            .filter(|end| *end <= self.data.len())
            .ok_or(HostError::MemoryAccess {
                address,
                length,
                size: self.data.len(),
            })?;
        Ok(address..end)
    }

    /// Borrow `length` bytes starting at `address`
    pub fn read_bytes(&self, address: usize, length: usize) -> HostResult<&[u8]> {
        let range = self.range(address, length)?;
        Ok(&self.data[range])
    }

    /// Mutably borrow `length` bytes starting at `address`
    pub fn bytes_mut(&mut self, address: usize, length: usize) -> HostResult<&mut [u8]> {
        let range = self.range(address, length)?;
        Ok(&mut self.data[range])
    }

    /// Copy `bytes` into memory at `address`
    pub fn write_bytes(&mut self, address: usize, bytes: &[u8]) -> HostResult<()> {
        self.bytes_mut(address, bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    pub fn read_u8(&self, address: usize) -> HostResult<u8> {
        Ok(self.read_bytes(address, 1)?[0])
    }

    pub fn write_u8(&mut self, address: usize, value: u8) -> HostResult<()> {
        self.bytes_mut(address, 1)?[0] = value;
        Ok(())
    }

    /// Read a little-endian `u32`
    pub fn read_u32(&self, address: usize) -> HostResult<u32> {
        Ok(LittleEndian::read_u32(self.read_bytes(address, 4)?))
    }

    /// Write a little-endian `u32`
    pub fn write_u32(&mut self, address: usize, value: u32) -> HostResult<()> {
        LittleEndian::write_u32(self.bytes_mut(address, 4)?, value);
        Ok(())
    }

    /// Read a string stored as one length byte followed by its bytes
    pub fn read_length_prefixed(&self, address: usize) -> HostResult<&[u8]> {
        let length = self.read_u8(address)? as usize;
        self.read_bytes(address + 1, length)
    }
}

/// Reserved address range at the top of the memory region
///
/// Content is staged here before the module starts, as a little-endian `u32`
/// length followed by the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScratchSegment {
    pub base: usize,
    pub len: usize,
}

impl ScratchSegment {
    /// Largest payload that fits after the length header
    pub fn capacity(&self) -> usize {
        self.len.saturating_sub(4)
    }

    /// Write `bytes` into the segment
    pub fn stage(&self, memory: &mut MemoryBridge<'_>, bytes: &[u8]) -> HostResult<()> {
        if bytes.len() > self.capacity() {
            return Err(HostError::MemoryAccess {
                address: self.base,
                length: bytes.len() + 4,
                size: self.base + self.len,
            });
        }
        memory.write_u32(self.base, bytes.len() as u32)?;
        memory.write_bytes(self.base + 4, bytes)
    }

    /// Borrow the staged bytes
    pub fn staged<'m>(&self, memory: &'m MemoryBridge<'_>) -> HostResult<&'m [u8]> {
        let length = (memory.read_u32(self.base)? as usize).min(self.capacity());
        memory.read_bytes(self.base + 4, length)
    }
}

/// Reinterpret a wasm `i32` pointer as an unsigned address
pub(crate) fn address(value: i32) -> usize {
    value as u32 as usize
}

/// Convert a wasm `i32` length or index into a host offset
pub(crate) fn offset(function: &'static str, value: i32) -> HostResult<usize> {
    usize::try_from(value)
        .map_err(|_| HostError::invalid_argument(function, format!("negative offset {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_bytes() {
        let mut backing = vec![0u8; 32];
        let mut memory = MemoryBridge::new(&mut backing);

        memory.write_bytes(4, b"tex").unwrap();
        assert_eq!(memory.read_bytes(4, 3).unwrap(), b"tex");
        assert_eq!(memory.read_u8(5).unwrap(), b'e');
    }

    #[test]
    fn test_u32_is_little_endian() {
        let mut backing = vec![0u8; 8];
        let mut memory = MemoryBridge::new(&mut backing);

        memory.write_u32(0, 0x0102_0304).unwrap();
        assert_eq!(memory.read_bytes(0, 4).unwrap(), &[4, 3, 2, 1]);
        assert_eq!(memory.read_u32(0).unwrap(), 0x0102_0304);
    }

    #[test]
    fn test_length_prefixed() {
        let mut backing = vec![0u8; 16];
        backing[2] = 5;
        backing[3..8].copy_from_slice(b"hello");
        let memory = MemoryBridge::new(&mut backing);

        assert_eq!(memory.read_length_prefixed(2).unwrap(), b"hello");
    }

    #[test]
    fn test_out_of_bounds() {
        let mut backing = vec![0u8; 16];
        let mut memory = MemoryBridge::new(&mut backing);

        assert!(matches!(
            memory.read_bytes(12, 8),
            Err(HostError::MemoryAccess {
                address: 12,
                length: 8,
                size: 16
            })
        ));
        assert!(memory.write_u32(14, 1).is_err());
        assert!(memory.read_bytes(usize::MAX, 2).is_err());
        // Empty reads at the very end are fine
        assert!(memory.read_bytes(16, 0).is_ok());
    }

    #[test]
    fn test_scratch_segment_staging() {
        let mut backing = vec![0u8; 64];
        let mut memory = MemoryBridge::new(&mut backing);
        let scratch = ScratchSegment { base: 48, len: 16 };

        scratch.stage(&mut memory, b"\\end\n").unwrap();
        assert_eq!(scratch.staged(&memory).unwrap(), b"\\end\n");

        assert!(scratch.stage(&mut memory, &[b'x'; 13]).is_err());
        assert!(scratch.stage(&mut memory, &[b'x'; 12]).is_ok());
    }

    #[test]
    fn test_negative_offset() {
        assert_eq!(offset("get", 12).unwrap(), 12);
        assert!(matches!(
            offset("get", -1),
            Err(HostError::InvalidArgument { function: "get", .. })
        ));
    }
}
