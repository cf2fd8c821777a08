//! Programmatic image construction.
//!
//! [`CodeBuilder`] assembles instructions with forward labels;
//! [`ImageBuilder`] lays out header, code and data in either byte order.

use super::header::Header;
use super::instructions::{Instruction, Opcode};
use super::{ByteOrder, HEADER_SIZE};

/// Build error.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("label {0} used but never bound")]
    UnboundLabel(usize),
    #[error("label {0} bound twice")]
    LabelRebound(usize),
    #[error("image exceeds i32 offsets ({0} bytes)")]
    TooLarge(usize),
}

/// Forward-referencable instruction address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Label(usize);

/// Instruction sequence with label resolution.
#[derive(Debug, Default)]
pub struct CodeBuilder {
    instructions: Vec<Instruction>,
    labels: Vec<Option<i32>>,
    fixups: Vec<(usize, Label)>,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the next instruction.
    pub fn pc(&self) -> i32 {
        self.instructions.len() as i32
    }

    /// Append an instruction with an operand.
    pub fn op(&mut self, opcode: Opcode, operand: i32) -> &mut Self {
        self.instructions.push(Instruction::new(opcode, operand));
        self
    }

    /// Append an instruction without an operand.
    pub fn bare(&mut self, opcode: Opcode) -> &mut Self {
        self.instructions.push(Instruction::bare(opcode));
        self
    }

    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind `label` to the next instruction.
    pub fn bind(&mut self, label: Label) -> Result<&mut Self, BuildError> {
        let slot = &mut self.labels[label.0];
        if slot.is_some() {
            return Err(BuildError::LabelRebound(label.0));
        }
        *slot = Some(self.instructions.len() as i32);
        Ok(self)
    }

    /// Append an instruction whose operand is `label`'s address.
    ///
    /// Used for conditional branches and for `CONST` before `JUMP`/`CALL`.
    pub fn to_label(&mut self, opcode: Opcode, label: Label) -> &mut Self {
        self.fixups.push((self.instructions.len(), label));
        self.op(opcode, 0)
    }

    /// Resolve labels and return the instruction list.
    pub fn finish(mut self) -> Result<Vec<Instruction>, BuildError> {
        for (at, label) in std::mem::take(&mut self.fixups) {
            let target = self.labels[label.0].ok_or(BuildError::UnboundLabel(label.0))?;
            self.instructions[at].operand = target;
        }
        Ok(self.instructions)
    }
}

/// Encode instructions into code segment bytes.
pub fn encode(instructions: &[Instruction], order: ByteOrder) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(instructions.len() * 5);
    for instr in instructions {
        bytes.push(instr.opcode as u8);
        match instr.opcode.operand_width().len() {
            0 => {}
            1 => bytes.push(instr.operand as u8),
            _ => bytes.extend_from_slice(&order.encode_i32(instr.operand)),
        }
    }
    bytes
}

/// Code segment contents of an [`ImageBuilder`].
#[derive(Debug)]
enum CodeSource {
    Instructions(Vec<Instruction>),
    /// Pre-encoded bytes plus the instruction count claimed by the header.
    Raw(Vec<u8>, usize),
}

/// Image layout builder.
///
/// Layout: header, code (padded to 4 bytes), literal bytes (padded to 4
/// bytes), data words. The literal block forms the unswapped prefix of the
/// data segment.
#[derive(Debug)]
pub struct ImageBuilder {
    code: CodeSource,
    literals: Vec<u8>,
    words: Vec<i32>,
    bss_length: usize,
    order: ByteOrder,
}

impl ImageBuilder {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self::with_code(CodeSource::Instructions(instructions))
    }

    /// Use pre-encoded code bytes verbatim (for malformed images).
    pub fn from_code_bytes(code: Vec<u8>, instruction_count: usize) -> Self {
        Self::with_code(CodeSource::Raw(code, instruction_count))
    }

    fn with_code(code: CodeSource) -> Self {
        Self {
            code,
            literals: Vec::new(),
            words: Vec::new(),
            bss_length: 0,
            order: ByteOrder::Little,
        }
    }

    /// Byte order of the header, operands and data words.
    pub fn byte_order(mut self, order: ByteOrder) -> Self {
        self.order = order;
        self
    }

    pub fn literals(mut self, bytes: &[u8]) -> Self {
        self.literals = bytes.to_vec();
        self
    }

    pub fn words(mut self, words: &[i32]) -> Self {
        self.words = words.to_vec();
        self
    }

    pub fn bss(mut self, length: usize) -> Self {
        self.bss_length = length;
        self
    }

    /// Serialize the image.
    pub fn build(&self) -> Result<Vec<u8>, BuildError> {
        let (code, instruction_count) = match &self.code {
            CodeSource::Instructions(instructions) => {
                (encode(instructions, self.order), instructions.len())
            }
            CodeSource::Raw(bytes, count) => (bytes.clone(), *count),
        };

        let code_padded = code.len().next_multiple_of(4);
        let lit_length = self.literals.len().next_multiple_of(4);
        let data_length = lit_length + self.words.len() * 4;
        let total = HEADER_SIZE + code_padded + data_length;
        if total > i32::MAX as usize {
            return Err(BuildError::TooLarge(total));
        }
        if self.bss_length > i32::MAX as usize || instruction_count > i32::MAX as usize {
            return Err(BuildError::TooLarge(self.bss_length.max(instruction_count)));
        }

        let header = Header {
            instruction_count: instruction_count as i32,
            code_offset: HEADER_SIZE as i32,
            code_length: code.len() as i32,
            data_offset: (HEADER_SIZE + code_padded) as i32,
            data_length: data_length as i32,
            lit_length: lit_length as i32,
            bss_length: self.bss_length as i32,
            ..Header::default()
        };

        let mut bytes = Vec::with_capacity(total);
        bytes.extend_from_slice(&header.to_bytes(self.order));
        bytes.extend_from_slice(&code);
        bytes.resize(HEADER_SIZE + code_padded, 0);
        bytes.extend_from_slice(&self.literals);
        bytes.resize(HEADER_SIZE + code_padded + lit_length, 0);
        for word in &self.words {
            bytes.extend_from_slice(&self.order.encode_i32(*word));
        }
        Ok(bytes)
    }
}
