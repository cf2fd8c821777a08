//! Byte order of an image and the helpers that normalize it.
//!
//! Memory inside the VM is always little-endian. Big-endian images are
//! converted word by word while loading.

/// Byte order of the integers stored in an image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    /// Read an `i32` at `offset`. Caller guarantees 4 bytes are available.
    #[inline]
    pub fn read_i32(self, bytes: &[u8], offset: usize) -> i32 {
        let raw = [
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ];
        match self {
            Self::Little => i32::from_le_bytes(raw),
            Self::Big => i32::from_be_bytes(raw),
        }
    }

    /// Encode an `i32` in this byte order.
    #[inline]
    pub fn encode_i32(self, value: i32) -> [u8; 4] {
        match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        }
    }

    /// Whether words in this order must be swapped to reach VM memory order.
    #[inline]
    pub fn needs_swap(self) -> bool {
        self == Self::Big
    }

    /// Swap every complete 4-byte word of `bytes` in place.
    ///
    /// A trailing partial word is left untouched.
    pub fn swap_words(bytes: &mut [u8]) {
        for word in bytes.chunks_exact_mut(4) {
            word.reverse();
        }
    }
}
