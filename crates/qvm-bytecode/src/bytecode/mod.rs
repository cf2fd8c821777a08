//! Bytecode image format for qvm modules.

mod builder;
mod byte_order;
mod constants;
mod header;
mod image;
mod instructions;
mod verify;

#[cfg(test)]
mod builder_tests;

pub use builder::{BuildError, CodeBuilder, ImageBuilder, Label, encode};
pub use byte_order::ByteOrder;
pub use constants::{
    DEFAULT_MIN_DATA_SIZE, DEFAULT_STACK_SIZE, ENTRY_FRAME_SIZE, HEADER_SIZE, MAGIC,
    MAX_CALL_ARGS, MAX_SYSCALL_ARGS, RETURN_SENTINEL,
};
pub use header::Header;
pub use image::{Image, ModuleError};
pub use instructions::{Instruction, Opcode, OperandWidth};
pub use verify::{Code, VerifyError, VerifyLimits, verify};
