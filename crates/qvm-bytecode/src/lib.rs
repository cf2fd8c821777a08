//! Bytecode format for the qvm sandbox.
//!
//! This crate contains:
//! - Image format definitions (Header, Image, instruction set)
//! - The load-time verifier producing pre-decoded [`Code`]
//! - An image builder for emitting modules
//! - The debug symbol table

pub mod bytecode;
mod error_kind;
pub mod symbols;


// Re-export commonly used items at crate root
pub use bytecode::{
    BuildError, ByteOrder, Code, CodeBuilder, DEFAULT_MIN_DATA_SIZE, DEFAULT_STACK_SIZE,
    ENTRY_FRAME_SIZE, HEADER_SIZE, Header, Image, ImageBuilder, Instruction, Label, MAGIC,
    MAX_CALL_ARGS, MAX_SYSCALL_ARGS, ModuleError, Opcode, OperandWidth, RETURN_SENTINEL,
    VerifyError, VerifyLimits, encode, verify,
};
pub use error_kind::ErrorKind;
pub use symbols::{Symbol, SymbolError, SymbolTable};
