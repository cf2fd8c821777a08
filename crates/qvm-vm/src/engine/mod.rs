//! Runtime engine for executing qvm modules.
//!
//! [`Vm`] owns the verified code, the sandboxed data segment and the operand
//! stack. Bytecode talks to the embedding program only through
//! [`SystemCalls`].

mod error;
mod interpreter;
mod memory;
mod stack;
mod syscall;
mod trace;
mod vm;

#[cfg(test)]
mod engine_tests;

pub use error::{Error, RuntimeError, StackFault};
pub use memory::{DataSegment, MemoryFault};
pub use syscall::{SyscallContext, SyscallError, SystemCalls};
pub use trace::{LogTracer, NoopTracer, Tracer};
pub use vm::{FuelLimits, Vm, VmBuilder, VmState};
