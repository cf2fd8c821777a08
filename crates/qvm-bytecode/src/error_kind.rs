//! Error taxonomy shared by the loader and the runtime.

use std::fmt;

/// Coarse classification of every error the VM can report.
///
/// Load-time kinds abort image creation; the rest abort one call and leave
/// the VM faulted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad magic or an inconsistent header.
    InvalidImage,
    /// A header offset or length points past the end of the file.
    TruncatedImage,
    /// Unknown opcode, truncated instruction or out-of-range operand.
    MalformedBytecode,
    /// Data access outside the data segment.
    MemoryFault,
    /// Program or operand stack overflow/underflow.
    StackFault,
    RecursionLimitExceeded,
    ExecFuelExhausted,
    /// Bad call/jump target, division by zero, too many arguments.
    IllegalOperation,
    /// Failure reported by the host's syscall handler.
    SyscallError,
    /// The VM faulted earlier and refuses further calls.
    Faulted,
}

impl ErrorKind {
    /// Whether this kind is produced while loading an image.
    pub fn is_load_error(self) -> bool {
        matches!(
            self,
            Self::InvalidImage | Self::TruncatedImage | Self::MalformedBytecode
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidImage => "invalid image",
            Self::TruncatedImage => "truncated image",
            Self::MalformedBytecode => "malformed bytecode",
            Self::MemoryFault => "memory fault",
            Self::StackFault => "stack fault",
            Self::RecursionLimitExceeded => "recursion limit exceeded",
            Self::ExecFuelExhausted => "execution fuel exhausted",
            Self::IllegalOperation => "illegal operation",
            Self::SyscallError => "syscall error",
            Self::Faulted => "vm faulted",
        };
        f.write_str(name)
    }
}
