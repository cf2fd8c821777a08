//! The boundary between bytecode and the host.
//!
//! `CALL` with a negative target traps into [`SystemCalls::syscall`] with
//! `id = -1 - target`. The host sees the arguments as plain integers and
//! reaches VM memory only through the bounds-checked [`SyscallContext`].

use super::error::RuntimeError;
use super::memory::{DataSegment, MemoryFault};
use super::trace::NoopTracer;
use super::vm::Machine;

/// Failure reported by a syscall handler.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SyscallError {
    #[error("unknown syscall")]
    Unknown,
    #[error(transparent)]
    Memory(#[from] MemoryFault),
    /// A nested call made by the handler failed.
    #[error("nested call failed: {0}")]
    Call(Box<RuntimeError>),
    #[error("{0}")]
    Host(String),
}

impl SyscallError {
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host(message.into())
    }
}

impl From<RuntimeError> for SyscallError {
    fn from(err: RuntimeError) -> Self {
        Self::Call(Box::new(err))
    }
}

/// Host-side syscall dispatcher.
pub trait SystemCalls {
    /// Handle syscall `id`. `args` holds up to 16 argument slots; slots the
    /// caller did not pass contain whatever its frame held.
    ///
    /// The returned value is pushed onto the caller's operand stack.
    fn syscall(
        &mut self,
        ctx: &mut SyscallContext<'_>,
        id: u32,
        args: &[i32],
    ) -> Result<i32, SyscallError>;
}

impl<S: SystemCalls + ?Sized> SystemCalls for &mut S {
    fn syscall(
        &mut self,
        ctx: &mut SyscallContext<'_>,
        id: u32,
        args: &[i32],
    ) -> Result<i32, SyscallError> {
        (**self).syscall(ctx, id, args)
    }
}

impl<S: SystemCalls + ?Sized> SystemCalls for Box<S> {
    fn syscall(
        &mut self,
        ctx: &mut SyscallContext<'_>,
        id: u32,
        args: &[i32],
    ) -> Result<i32, SyscallError> {
        (**self).syscall(ctx, id, args)
    }
}

/// View of the VM handed to a syscall handler.
///
/// Pointers are the raw 32-bit values bytecode passed as arguments; they are
/// masked and bounds-checked like any bytecode access.
pub struct SyscallContext<'vm> {
    machine: &'vm mut Machine,
}

impl<'vm> SyscallContext<'vm> {
    pub(crate) fn new(machine: &'vm mut Machine) -> Self {
        Self { machine }
    }

    pub fn memory(&self) -> &DataSegment {
        &self.machine.memory
    }

    pub fn memory_mut(&mut self) -> &mut DataSegment {
        &mut self.machine.memory
    }

    pub fn slice(&self, ptr: i32, len: u32) -> Result<&[u8], MemoryFault> {
        self.machine.memory.slice(ptr as u32, len)
    }

    pub fn slice_mut(&mut self, ptr: i32, len: u32) -> Result<&mut [u8], MemoryFault> {
        self.machine.memory.slice_mut(ptr as u32, len)
    }

    /// NUL-terminated string at `ptr`, terminator excluded.
    pub fn read_cstr(&self, ptr: i32) -> Result<&[u8], MemoryFault> {
        self.machine.memory.read_cstr(ptr as u32)
    }

    pub fn read_i32(&self, ptr: i32) -> Result<i32, MemoryFault> {
        self.machine.memory.read_i32(ptr as u32)
    }

    pub fn write_i32(&mut self, ptr: i32, value: i32) -> Result<(), MemoryFault> {
        self.machine.memory.write_i32(ptr as u32, value)
    }

    /// Number of VM invocations currently active, this one included.
    pub fn call_level(&self) -> u32 {
        self.machine.call_level
    }

    /// Re-enter the VM and run the function at `target`.
    ///
    /// The nested invocation starts below the syscalling frame and counts
    /// toward the call level limit. If it faults, the VM stays faulted and
    /// the syscalling invocation fails once the handler returns.
    pub fn call<H: SystemCalls + ?Sized>(
        &mut self,
        host: &mut H,
        target: i32,
        args: &[i32],
    ) -> Result<i32, RuntimeError> {
        self.machine.invoke(host, target, args, &mut NoopTracer)
    }
}
