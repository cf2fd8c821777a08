//! Errors that can occur while loading or running a module.

use qvm_bytecode::{ErrorKind, ModuleError};

use super::memory::MemoryFault;
use super::syscall::SyscallError;

/// Program or operand stack violation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StackFault {
    #[error("operand stack overflow ({capacity} slots)")]
    OperandOverflow { capacity: usize },
    #[error("operand stack underflow")]
    OperandUnderflow,
    /// `ENTER`, the entry frame or a syscall pushed below the stack floor.
    #[error("program stack overflow: {requested} bytes below {program_stack:#x}, floor {floor:#x}")]
    ProgramOverflow {
        program_stack: u32,
        requested: u32,
        floor: u32,
    },
    /// `LEAVE` released past the top of the program stack.
    #[error("program stack underflow: {released} bytes above {program_stack:#x}, ceiling {ceiling:#x}")]
    ProgramUnderflow {
        program_stack: u32,
        released: u32,
        ceiling: u32,
    },
    /// An invocation returned with other than one value on its operand stack.
    #[error("invocation returned with {found} operand stack values, expected 1")]
    ReturnValueCount { found: usize },
}

/// Error that aborts a call. The VM is left faulted.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Memory(#[from] MemoryFault),

    #[error("stack fault: {0}")]
    Stack(#[from] StackFault),

    /// Too many nested `ENTER` frames.
    #[error("recursion limit exceeded ({limit} frames)")]
    RecursionLimitExceeded { limit: u32 },

    /// Too many nested host-to-VM invocations.
    #[error("call level limit exceeded ({limit} nested calls)")]
    CallLevelExceeded { limit: u32 },

    #[error("execution fuel exhausted")]
    ExecFuelExhausted,

    #[error("bad call target {target}")]
    BadCallTarget { target: i32 },

    #[error("bad jump target {target}")]
    BadJumpTarget { target: i32 },

    #[error("integer division by zero")]
    DivideByZero,

    #[error("too many arguments: {count} (maximum {max})")]
    TooManyArguments { count: usize, max: usize },

    #[error("no function named {0:?}")]
    UnknownSymbol(String),

    #[error("syscall {id} failed: {source}")]
    Syscall {
        id: u32,
        #[source]
        source: SyscallError,
    },

    /// A call re-entered from inside syscall `id` faulted.
    #[error("nested call inside syscall {id} faulted")]
    NestedFault { id: u32 },

    #[error("vm is faulted")]
    Faulted,
}

impl RuntimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Memory(_) => ErrorKind::MemoryFault,
            Self::Stack(_) => ErrorKind::StackFault,
            Self::RecursionLimitExceeded { .. } | Self::CallLevelExceeded { .. } => {
                ErrorKind::RecursionLimitExceeded
            }
            Self::ExecFuelExhausted => ErrorKind::ExecFuelExhausted,
            Self::BadCallTarget { .. }
            | Self::BadJumpTarget { .. }
            | Self::DivideByZero
            | Self::TooManyArguments { .. }
            | Self::UnknownSymbol(_) => ErrorKind::IllegalOperation,
            Self::Syscall { .. } => ErrorKind::SyscallError,
            Self::NestedFault { .. } | Self::Faulted => ErrorKind::Faulted,
        }
    }
}

/// Any error reported through the host API.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] ModuleError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Load(e) => e.kind(),
            Self::Runtime(e) => e.kind(),
        }
    }

    /// The runtime error, if this is not a load error.
    pub fn as_runtime(&self) -> Option<&RuntimeError> {
        match self {
            Self::Runtime(e) => Some(e),
            Self::Load(_) => None,
        }
    }
}
