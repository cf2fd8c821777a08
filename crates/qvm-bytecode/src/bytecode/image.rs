//! Image parsing and structural validation.
//!
//! [`Image`] borrows the raw file bytes and exposes the code and data
//! sections after checking every header invariant. It does not allocate;
//! runtime segments are built by the VM from these views.

use super::header::Header;
use super::verify::VerifyError;
use super::{ByteOrder, HEADER_SIZE, MAGIC};
use crate::ErrorKind;

/// Image load error.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    #[error("invalid magic: expected {MAGIC:#010x}, found {0:#010x}")]
    InvalidMagic(i32),
    #[error("invalid header: {0} is negative")]
    NegativeField(&'static str),
    #[error("invalid header: literal length {lit} exceeds data length {data}")]
    LiteralExceedsData { lit: i32, data: i32 },
    #[error("invalid header: segments need {0} bytes, more than the address space")]
    SegmentTooLarge(u64),
    #[error("file too small: {0} bytes (minimum {HEADER_SIZE})")]
    FileTooSmall(usize),
    #[error("{section} segment at {offset}+{length} exceeds file size {file_len}")]
    SectionOutOfBounds {
        section: &'static str,
        offset: i32,
        length: i32,
        file_len: usize,
    },
    #[error(transparent)]
    Verify(#[from] VerifyError),
}

impl ModuleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidMagic(_)
            | Self::NegativeField(_)
            | Self::LiteralExceedsData { .. }
            | Self::SegmentTooLarge(_) => ErrorKind::InvalidImage,
            Self::FileTooSmall(_) | Self::SectionOutOfBounds { .. } => ErrorKind::TruncatedImage,
            Self::Verify(_) => ErrorKind::MalformedBytecode,
        }
    }
}

/// A structurally valid image, borrowed from the file bytes.
#[derive(Clone, Copy, Debug)]
pub struct Image<'a> {
    bytes: &'a [u8],
    header: Header,
    order: ByteOrder,
}

impl<'a> Image<'a> {
    /// Parse and validate the header of `bytes`.
    pub fn parse(bytes: &'a [u8], order: ByteOrder) -> Result<Self, ModuleError> {
        if bytes.len() < HEADER_SIZE {
            return Err(ModuleError::FileTooSmall(bytes.len()));
        }

        let header = Header::from_bytes(&bytes[..HEADER_SIZE], order);
        if !header.validate_magic() {
            return Err(ModuleError::InvalidMagic(header.magic));
        }
        if let Some(field) = header.negative_field() {
            return Err(ModuleError::NegativeField(field));
        }
        if header.lit_length > header.data_length {
            return Err(ModuleError::LiteralExceedsData {
                lit: header.lit_length,
                data: header.data_length,
            });
        }

        check_section("code", header.code_offset, header.code_length, bytes.len())?;
        check_section("data", header.data_offset, header.data_length, bytes.len())?;

        Ok(Self {
            bytes,
            header,
            order,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Raw code segment bytes.
    pub fn code(&self) -> &'a [u8] {
        section(self.bytes, self.header.code_offset, self.header.code_length)
    }

    /// Raw data segment bytes, literal prefix included.
    pub fn data(&self) -> &'a [u8] {
        section(self.bytes, self.header.data_offset, self.header.data_length)
    }

    pub fn instruction_count(&self) -> usize {
        self.header.instruction_count as usize
    }

    pub fn lit_length(&self) -> usize {
        self.header.lit_length as usize
    }

    pub fn bss_length(&self) -> usize {
        self.header.bss_length as usize
    }
}

fn check_section(
    section: &'static str,
    offset: i32,
    length: i32,
    file_len: usize,
) -> Result<(), ModuleError> {
    let end = offset as u64 + length as u64;
    if end > file_len as u64 {
        return Err(ModuleError::SectionOutOfBounds {
            section,
            offset,
            length,
            file_len,
        });
    }
    Ok(())
}

/// Offsets are validated in [`Image::parse`].
fn section(bytes: &[u8], offset: i32, length: i32) -> &[u8] {
    let start = offset as usize;
    &bytes[start..start + length as usize]
}
