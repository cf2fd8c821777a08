//! Execution tracing.
//!
//! The interpreter is generic over [`Tracer`]. With [`NoopTracer`] every hook
//! is an inlined empty function and the dispatch loop compiles as if tracing
//! did not exist. [`LogTracer`] forwards each hook to `tracing` at trace level.

use qvm_bytecode::{Instruction, SymbolTable};

/// Tracer trait for VM execution instrumentation.
///
/// Each method is called at a specific point during execution:
/// - `trace_instruction` - before executing an instruction
/// - `trace_call` - when `CALL` transfers to a bytecode function
/// - `trace_return` - when `LEAVE` returns to a caller or to the host
/// - `trace_syscall` - before the host handles a syscall
/// - `trace_syscall_return` - after the host returned a value
/// - `trace_break` - on `BREAK` and on entry to the break function
pub trait Tracer {
    fn trace_instruction(&mut self, pc: usize, instr: Instruction, program_stack: u32);

    fn trace_call(&mut self, pc: usize, target: usize);

    /// `to` is `None` when the invocation returns to the host.
    fn trace_return(&mut self, pc: usize, to: Option<usize>);

    fn trace_syscall(&mut self, pc: usize, id: u32, args: &[i32]);

    fn trace_syscall_return(&mut self, id: u32, value: i32);

    fn trace_break(&mut self, pc: usize, count: u64);
}

/// No-op tracer that gets optimized away completely.
pub struct NoopTracer;

impl Tracer for NoopTracer {
    #[inline(always)]
    fn trace_instruction(&mut self, _pc: usize, _instr: Instruction, _program_stack: u32) {}

    #[inline(always)]
    fn trace_call(&mut self, _pc: usize, _target: usize) {}

    #[inline(always)]
    fn trace_return(&mut self, _pc: usize, _to: Option<usize>) {}

    #[inline(always)]
    fn trace_syscall(&mut self, _pc: usize, _id: u32, _args: &[i32]) {}

    #[inline(always)]
    fn trace_syscall_return(&mut self, _id: u32, _value: i32) {}

    #[inline(always)]
    fn trace_break(&mut self, _pc: usize, _count: u64) {}
}

/// Tracer that emits `tracing` events at trace level.
///
/// With a symbol table, call targets are reported by function name.
#[derive(Debug, Default)]
pub struct LogTracer {
    symbols: SymbolTable,
}

impl LogTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_symbols(symbols: SymbolTable) -> Self {
        Self { symbols }
    }
}

impl Tracer for LogTracer {
    fn trace_instruction(&mut self, pc: usize, instr: Instruction, program_stack: u32) {
        tracing::trace!(pc, sp = program_stack, "{instr}");
    }

    fn trace_call(&mut self, pc: usize, target: usize) {
        let callee = self.symbols.describe(target as u32);
        tracing::trace!(pc, target, "call {callee}");
    }

    fn trace_return(&mut self, pc: usize, to: Option<usize>) {
        match to {
            Some(to) => tracing::trace!(pc, to, "return"),
            None => tracing::trace!(pc, "return to host"),
        }
    }

    fn trace_syscall(&mut self, pc: usize, id: u32, args: &[i32]) {
        tracing::trace!(pc, id, ?args, "syscall");
    }

    fn trace_syscall_return(&mut self, id: u32, value: i32) {
        tracing::trace!(id, value, "syscall returned");
    }

    fn trace_break(&mut self, pc: usize, count: u64) {
        tracing::trace!(pc, count, "break");
    }
}
