//! Image header (32 bytes).
//!
//! Eight signed 32-bit fields, stored in the image's byte order:
//! - 0-7: magic, instruction count
//! - 8-15: code segment offset and length
//! - 16-31: data segment offset and length, literal prefix length, BSS length

use super::{ByteOrder, HEADER_SIZE, MAGIC};

/// File header - first 32 bytes of an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    /// Must equal [`MAGIC`].
    pub magic: i32,
    /// Number of instructions in the code segment.
    pub instruction_count: i32,
    pub code_offset: i32,
    /// Code segment length in bytes.
    pub code_length: i32,
    pub data_offset: i32,
    /// Data segment length in bytes, literal prefix included.
    pub data_length: i32,
    /// Leading part of the data segment copied verbatim, never byte-swapped.
    pub lit_length: i32,
    /// Zero-filled bytes appended after the data segment; not stored in the file.
    pub bss_length: i32,
}

const _: () = assert!(HEADER_SIZE == 8 * 4);

impl Default for Header {
    fn default() -> Self {
        Self {
            magic: MAGIC,
            instruction_count: 0,
            code_offset: HEADER_SIZE as i32,
            code_length: 0,
            data_offset: HEADER_SIZE as i32,
            data_length: 0,
            lit_length: 0,
            bss_length: 0,
        }
    }
}

impl Header {
    /// Decode the header from the first 32 bytes.
    pub fn from_bytes(bytes: &[u8], order: ByteOrder) -> Self {
        assert!(bytes.len() >= HEADER_SIZE, "header too short");

        Self {
            magic: order.read_i32(bytes, 0),
            instruction_count: order.read_i32(bytes, 4),
            code_offset: order.read_i32(bytes, 8),
            code_length: order.read_i32(bytes, 12),
            data_offset: order.read_i32(bytes, 16),
            data_length: order.read_i32(bytes, 20),
            lit_length: order.read_i32(bytes, 24),
            bss_length: order.read_i32(bytes, 28),
        }
    }

    /// Encode the header to 32 bytes.
    pub fn to_bytes(&self, order: ByteOrder) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        let fields = [
            self.magic,
            self.instruction_count,
            self.code_offset,
            self.code_length,
            self.data_offset,
            self.data_length,
            self.lit_length,
            self.bss_length,
        ];
        for (i, field) in fields.into_iter().enumerate() {
            bytes[i * 4..i * 4 + 4].copy_from_slice(&order.encode_i32(field));
        }
        bytes
    }

    pub fn validate_magic(&self) -> bool {
        self.magic == MAGIC
    }

    /// Name of the first field that is negative, if any.
    pub fn negative_field(&self) -> Option<&'static str> {
        [
            ("instruction_count", self.instruction_count),
            ("code_offset", self.code_offset),
            ("code_length", self.code_length),
            ("data_offset", self.data_offset),
            ("data_length", self.data_length),
            ("lit_length", self.lit_length),
            ("bss_length", self.bss_length),
        ]
        .into_iter()
        .find(|&(_, value)| value < 0)
        .map(|(name, _)| name)
    }
}
