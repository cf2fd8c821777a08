//! Bytecode format constants.

/// Magic number at the start of every image.
pub const MAGIC: i32 = 0x1272_1444;

/// Header size in bytes (8 × i32).
pub const HEADER_SIZE: usize = 32;

/// Maximum number of arguments the host can pass to [`Call`](crate::Opcode::Call)
/// from outside the VM.
pub const MAX_CALL_ARGS: usize = 13;

/// Bytes reserved below the caller's stack pointer on host entry:
/// return sentinel, saved pc slot and the argument block.
pub const ENTRY_FRAME_SIZE: usize = 8 + 4 * MAX_CALL_ARGS;

/// Number of argument slots handed to a syscall handler.
pub const MAX_SYSCALL_ARGS: usize = 16;

/// Return address that terminates the outermost frame of an invocation.
pub const RETURN_SENTINEL: i32 = -1;

/// Default size of the program stack carved out of the data segment.
pub const DEFAULT_STACK_SIZE: usize = 0x10000;

/// Default lower bound for the data segment allocation.
pub const DEFAULT_MIN_DATA_SIZE: usize = 0x10000;
