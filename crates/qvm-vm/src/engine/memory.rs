//! Sandboxed data segment.
//!
//! Every VM address is masked with `size - 1` before use and the masked
//! access must then fit inside the segment. Bytecode can name any 32-bit
//! address, but it can only ever touch bytes of its own segment. Values are
//! stored little-endian.

/// Data access outside the segment after masking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("memory fault: {len} bytes at {addr:#x} (masked {masked:#x}) outside data segment of {size} bytes")]
pub struct MemoryFault {
    pub addr: u32,
    pub masked: u32,
    pub len: u32,
    pub size: usize,
}

/// Power-of-two sized, zero-initialized VM memory.
#[derive(Debug)]
pub struct DataSegment {
    bytes: Box<[u8]>,
    mask: u32,
}

impl DataSegment {
    /// Allocate `size` zero bytes. `size` must be a power of two that fits
    /// in the 32-bit address space.
    pub(crate) fn new(size: usize) -> Self {
        debug_assert!(size.is_power_of_two() && size <= 1 << 31);
        Self {
            bytes: vec![0; size].into_boxed_slice(),
            mask: (size - 1) as u32,
        }
    }

    /// Segment size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Mask `addr` and check that `len` bytes fit from there.
    #[inline]
    fn check(&self, addr: u32, len: u32) -> Result<usize, MemoryFault> {
        let masked = addr & self.mask;
        let start = masked as usize;
        if start + len as usize > self.bytes.len() {
            return Err(MemoryFault {
                addr,
                masked,
                len,
                size: self.bytes.len(),
            });
        }
        Ok(start)
    }

    #[inline]
    fn array<const N: usize>(&self, addr: u32) -> Result<[u8; N], MemoryFault> {
        let at = self.check(addr, N as u32)?;
        let mut out = [0; N];
        out.copy_from_slice(&self.bytes[at..at + N]);
        Ok(out)
    }

    #[inline]
    pub fn read_u8(&self, addr: u32) -> Result<u8, MemoryFault> {
        let at = self.check(addr, 1)?;
        Ok(self.bytes[at])
    }

    #[inline]
    pub fn read_u16(&self, addr: u32) -> Result<u16, MemoryFault> {
        self.array(addr).map(u16::from_le_bytes)
    }

    #[inline]
    pub fn read_i32(&self, addr: u32) -> Result<i32, MemoryFault> {
        self.array(addr).map(i32::from_le_bytes)
    }

    #[inline]
    pub fn write_u8(&mut self, addr: u32, value: u8) -> Result<(), MemoryFault> {
        let at = self.check(addr, 1)?;
        self.bytes[at] = value;
        Ok(())
    }

    #[inline]
    pub fn write_u16(&mut self, addr: u32, value: u16) -> Result<(), MemoryFault> {
        self.write_bytes(addr, &value.to_le_bytes())
    }

    #[inline]
    pub fn write_i32(&mut self, addr: u32, value: i32) -> Result<(), MemoryFault> {
        self.write_bytes(addr, &value.to_le_bytes())
    }

    #[inline]
    fn write_bytes(&mut self, addr: u32, src: &[u8]) -> Result<(), MemoryFault> {
        let at = self.check(addr, src.len() as u32)?;
        self.bytes[at..at + src.len()].copy_from_slice(src);
        Ok(())
    }

    /// Copy `len` bytes from `src` to `dst` with `memmove` semantics.
    ///
    /// Neither masked range may run past the end of the segment.
    pub fn block_copy(&mut self, dst: u32, src: u32, len: u32) -> Result<(), MemoryFault> {
        let from = self.check(src, len)?;
        let to = self.check(dst, len)?;
        self.bytes.copy_within(from..from + len as usize, to);
        Ok(())
    }

    /// Borrow `len` bytes at `addr`.
    pub fn slice(&self, addr: u32, len: u32) -> Result<&[u8], MemoryFault> {
        let at = self.check(addr, len)?;
        Ok(&self.bytes[at..at + len as usize])
    }

    pub fn slice_mut(&mut self, addr: u32, len: u32) -> Result<&mut [u8], MemoryFault> {
        let at = self.check(addr, len)?;
        Ok(&mut self.bytes[at..at + len as usize])
    }

    /// Bytes of the NUL-terminated string at `addr`, terminator excluded.
    ///
    /// A string that runs to the end of the segment without a NUL faults.
    pub fn read_cstr(&self, addr: u32) -> Result<&[u8], MemoryFault> {
        let at = self.check(addr, 0)?;
        let tail = &self.bytes[at..];
        match tail.iter().position(|&b| b == 0) {
            Some(end) => Ok(&tail[..end]),
            None => Err(MemoryFault {
                addr,
                masked: at as u32,
                len: tail.len() as u32 + 1,
                size: self.bytes.len(),
            }),
        }
    }
}
