//! Bytecode verifier and preprocessor.
//!
//! One linear pass over the code segment decodes every instruction and
//! rejects anything the interpreter would otherwise have to re-check on the
//! hot path: unknown opcodes, truncated operands, branch targets outside the
//! code, frame sizes larger than the program stack and block copies larger
//! than the data segment.

use super::ByteOrder;
use super::instructions::{Instruction, Opcode, OperandWidth};

/// Bytecode verification error. `pc` is the instruction index.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("malformed bytecode: unknown opcode {byte:#04x} at instruction {pc} (byte {offset})")]
    UnknownOpcode { pc: usize, offset: usize, byte: u8 },
    #[error("malformed bytecode: instruction {pc} ({opcode:?}) truncated at byte {offset}")]
    Truncated {
        pc: usize,
        offset: usize,
        opcode: Opcode,
    },
    #[error("malformed bytecode: code segment ends after {decoded} of {count} instructions")]
    MissingInstructions { decoded: usize, count: usize },
    #[error("malformed bytecode: instruction {pc} branches to {target}, outside 0..{count}")]
    BranchOutOfRange { pc: usize, target: i32, count: usize },
    #[error("malformed bytecode: instruction {pc} loads call/jump target {target}, outside 0..{count}")]
    ConstTargetOutOfRange { pc: usize, target: i32, count: usize },
    #[error("malformed bytecode: instruction {pc} frame size {size} outside 0..={max}")]
    FrameSizeOutOfRange { pc: usize, size: i32, max: usize },
    #[error("malformed bytecode: instruction {pc} block copy of {len} bytes outside 0..={max}")]
    BlockCopyOutOfRange { pc: usize, len: i32, max: usize },
}

/// Segment sizes operands are checked against.
#[derive(Clone, Copy, Debug)]
pub struct VerifyLimits {
    /// Program stack size in bytes (bounds `ENTER`/`LEAVE` frames).
    pub stack_size: usize,
    /// Data segment allocation in bytes (bounds `BLOCK_COPY`).
    pub data_size: usize,
}

/// Verified, pre-decoded code segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Code {
    instructions: Vec<Instruction>,
}

impl Code {
    /// Instruction at `pc`, if in range.
    #[inline]
    pub fn get(&self, pc: usize) -> Option<Instruction> {
        self.instructions.get(pc).copied()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Whether `target` names an instruction.
    #[inline]
    pub fn contains(&self, target: i32) -> bool {
        target >= 0 && (target as usize) < self.instructions.len()
    }

    pub fn as_slice(&self) -> &[Instruction] {
        &self.instructions
    }
}

/// Decode and validate `instruction_count` instructions from `bytes`.
pub fn verify(
    bytes: &[u8],
    instruction_count: usize,
    order: ByteOrder,
    limits: VerifyLimits,
) -> Result<Code, VerifyError> {
    let instructions = decode(bytes, instruction_count, order)?;

    for (pc, instr) in instructions.iter().enumerate() {
        check_operand(pc, *instr, &instructions, limits)?;
    }

    Ok(Code { instructions })
}

fn decode(
    bytes: &[u8],
    instruction_count: usize,
    order: ByteOrder,
) -> Result<Vec<Instruction>, VerifyError> {
    // Every instruction takes at least one byte.
    let mut instructions = Vec::with_capacity(instruction_count.min(bytes.len()));
    let mut offset = 0;

    for pc in 0..instruction_count {
        let Some(&byte) = bytes.get(offset) else {
            return Err(VerifyError::MissingInstructions {
                decoded: pc,
                count: instruction_count,
            });
        };
        let opcode =
            Opcode::from_u8(byte).ok_or(VerifyError::UnknownOpcode { pc, offset, byte })?;

        let operand_at = offset + 1;
        let width = opcode.operand_width();
        if operand_at + width.len() > bytes.len() {
            return Err(VerifyError::Truncated { pc, offset, opcode });
        }

        let operand = match width {
            OperandWidth::None => 0,
            OperandWidth::Byte => bytes[operand_at] as i32,
            OperandWidth::Word => order.read_i32(bytes, operand_at),
        };

        instructions.push(Instruction::new(opcode, operand));
        offset = operand_at + width.len();
    }

    if offset < bytes.len() {
        tracing::debug!(
            trailing = bytes.len() - offset,
            "ignoring padding after last instruction"
        );
    }

    Ok(instructions)
}

fn check_operand(
    pc: usize,
    instr: Instruction,
    instructions: &[Instruction],
    limits: VerifyLimits,
) -> Result<(), VerifyError> {
    let count = instructions.len();
    let in_code = |target: i32| target >= 0 && (target as usize) < count;

    match instr.opcode {
        op if op.is_branch() && !in_code(instr.operand) => Err(VerifyError::BranchOutOfRange {
            pc,
            target: instr.operand,
            count,
        }),
        Opcode::Enter | Opcode::Leave
            if instr.operand < 0 || instr.operand as usize > limits.stack_size =>
        {
            Err(VerifyError::FrameSizeOutOfRange {
                pc,
                size: instr.operand,
                max: limits.stack_size,
            })
        }
        Opcode::BlockCopy if instr.operand < 0 || instr.operand as usize > limits.data_size => {
            Err(VerifyError::BlockCopyOutOfRange {
                pc,
                len: instr.operand,
                max: limits.data_size,
            })
        }
        Opcode::Const => {
            // Negative call targets are syscalls.
            let target = instr.operand;
            let bad = match instructions.get(pc + 1).map(|next| next.opcode) {
                Some(Opcode::Jump) => !in_code(target),
                Some(Opcode::Call) => target >= 0 && !in_code(target),
                _ => false,
            };
            if bad {
                return Err(VerifyError::ConstTargetOutOfRange { pc, target, count });
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
