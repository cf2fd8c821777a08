//! Runtime VM for executing qvm bytecode modules.
//!
//! This crate provides the sandboxed interpreter: image loading into an
//! isolated data segment, the dispatch loop, and the syscall bridge through
//! which bytecode reaches the host.

pub mod engine;

// Re-export commonly used items at crate root
pub use engine::{
    DataSegment, Error, FuelLimits, LogTracer, MemoryFault, NoopTracer, RuntimeError,
    StackFault, SyscallContext, SyscallError, SystemCalls, Tracer, Vm, VmBuilder, VmState,
};
pub use qvm_bytecode::ErrorKind;
