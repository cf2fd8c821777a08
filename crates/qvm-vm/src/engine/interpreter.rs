//! The dispatch loop.
//!
//! Calling convention, with the program stack growing down from the top of
//! the data segment:
//!
//! - `ENTER n` reserves an `n`-byte frame. Outgoing arguments are written
//!   by `ARG` at `frame + 8` onward; the callee reads them at
//!   `own_frame + n + 8`.
//! - `CALL` stores the return address at `[frame]` and jumps. `LEAVE n`
//!   releases the frame and resumes at the stored address.
//! - The host entry frame holds `-1` at `[frame]`; returning to it ends
//!   the invocation.

use qvm_bytecode::{ENTRY_FRAME_SIZE, MAX_CALL_ARGS, MAX_SYSCALL_ARGS, Opcode, RETURN_SENTINEL};

use super::error::{RuntimeError, StackFault};
use super::syscall::{SyscallContext, SystemCalls};
use super::trace::Tracer;
use super::vm::{Machine, VmState};

/// What the loop does after an instruction.
enum Flow {
    Next(usize),
    /// `LEAVE` popped the entry sentinel.
    Return,
}

#[inline(always)]
fn float(v: i32) -> f32 {
    f32::from_bits(v as u32)
}

#[inline(always)]
fn bits(v: f32) -> i32 {
    v.to_bits() as i32
}

impl Machine {
    /// Run the function at `target` as a new invocation.
    ///
    /// Any error faults the VM.
    pub(crate) fn invoke<H: SystemCalls + ?Sized, T: Tracer>(
        &mut self,
        host: &mut H,
        target: i32,
        args: &[i32],
        tracer: &mut T,
    ) -> Result<i32, RuntimeError> {
        if self.state == VmState::Faulted {
            return Err(RuntimeError::Faulted);
        }

        let result = self.enter(host, target, args, tracer);
        if let Err(err) = &result {
            self.fault(err);
        }
        result
    }

    fn enter<H: SystemCalls + ?Sized, T: Tracer>(
        &mut self,
        host: &mut H,
        target: i32,
        args: &[i32],
        tracer: &mut T,
    ) -> Result<i32, RuntimeError> {
        if !self.code.contains(target) {
            return Err(RuntimeError::BadCallTarget { target });
        }
        if args.len() > MAX_CALL_ARGS {
            return Err(RuntimeError::TooManyArguments {
                count: args.len(),
                max: MAX_CALL_ARGS,
            });
        }
        if self.call_level >= self.limits.max_call_level {
            return Err(RuntimeError::CallLevelExceeded {
                limit: self.limits.max_call_level,
            });
        }

        let outer_state = self.state;
        if self.call_level == 0 {
            self.fuel = self.limits.exec_fuel;
            self.program_stack = self.stack_top;
            self.frame_depth = 0;
            self.stack.reset();
        }

        let saved_program_stack = self.program_stack;
        let saved_frame_depth = self.frame_depth;

        let frame = self.reserve(saved_program_stack, ENTRY_FRAME_SIZE as u32)?;
        self.memory.write_i32(frame, RETURN_SENTINEL)?;
        self.memory.write_i32(frame + 4, 0)?;
        for i in 0..MAX_CALL_ARGS {
            let arg = args.get(i).copied().unwrap_or(0);
            self.memory.write_i32(frame + 8 + 4 * i as u32, arg)?;
        }
        self.program_stack = frame;

        let floor = self.stack.enter();
        self.call_level += 1;
        self.state = VmState::Running;

        let result = self.run(host, target as usize, tracer);
        self.call_level -= 1;
        let value = result?;

        self.stack.leave(floor);
        self.program_stack = saved_program_stack;
        self.frame_depth = saved_frame_depth;
        self.state = outer_state;
        Ok(value)
    }

    fn fault(&mut self, err: &RuntimeError) {
        if self.state != VmState::Faulted {
            match self.fault_pc {
                Some(pc) => tracing::warn!(
                    vm = %self.name,
                    pc,
                    function = %self.symbols.describe(pc as u32),
                    "vm faulted: {err}"
                ),
                None => tracing::warn!(vm = %self.name, "vm faulted: {err}"),
            }
        }
        self.state = VmState::Faulted;
    }

    /// Move the program stack down by `bytes`, staying above the floor.
    #[inline]
    fn reserve(&self, program_stack: u32, bytes: u32) -> Result<u32, StackFault> {
        program_stack
            .checked_sub(bytes)
            .filter(|&ps| ps >= self.stack_bottom)
            .ok_or(StackFault::ProgramOverflow {
                program_stack,
                requested: bytes,
                floor: self.stack_bottom,
            })
    }

    /// Move the program stack up by `bytes`, staying at or below the top.
    #[inline]
    fn release(&self, bytes: u32) -> Result<u32, StackFault> {
        self.program_stack
            .checked_add(bytes)
            .filter(|&ps| ps <= self.stack_top)
            .ok_or(StackFault::ProgramUnderflow {
                program_stack: self.program_stack,
                released: bytes,
                ceiling: self.stack_top,
            })
    }

    fn run<H: SystemCalls + ?Sized, T: Tracer>(
        &mut self,
        host: &mut H,
        entry: usize,
        tracer: &mut T,
    ) -> Result<i32, RuntimeError> {
        let mut pc = entry;
        loop {
            match self.step(host, pc, tracer) {
                Ok(Flow::Next(next)) => pc = next,
                Ok(Flow::Return) => break,
                Err(err) => {
                    self.fault_pc = Some(pc);
                    return Err(err);
                }
            }
        }

        let found = self.stack.depth();
        if found != 1 {
            self.fault_pc = Some(pc);
            return Err(StackFault::ReturnValueCount { found }.into());
        }
        Ok(self.stack.pop()?)
    }

    #[inline]
    fn step<H: SystemCalls + ?Sized, T: Tracer>(
        &mut self,
        host: &mut H,
        pc: usize,
        tracer: &mut T,
    ) -> Result<Flow, RuntimeError> {
        // Only sequential execution can walk off the end of the code.
        let Some(instr) = self.code.get(pc) else {
            return Err(RuntimeError::BadJumpTarget { target: pc as i32 });
        };
        if self.fuel == 0 {
            return Err(RuntimeError::ExecFuelExhausted);
        }
        self.fuel -= 1;
        tracer.trace_instruction(pc, instr, self.program_stack);

        let next = pc + 1;
        let operand = instr.operand;
        let stack = &mut self.stack;

        match instr.opcode {
            Opcode::Undef | Opcode::Ignore => {}
            Opcode::Break => self.hit_break(pc, tracer),

            Opcode::Enter => {
                let frame = self.reserve(self.program_stack, operand as u32)?;
                if self.frame_depth >= self.limits.recursion_limit {
                    return Err(RuntimeError::RecursionLimitExceeded {
                        limit: self.limits.recursion_limit,
                    });
                }
                self.frame_depth += 1;
                self.program_stack = frame;
                if self.break_function == Some(pc) {
                    self.hit_break(pc, tracer);
                }
                if self.profile {
                    self.symbols.record_call(pc as u32);
                }
            }
            Opcode::Leave => {
                let frame = self.release(operand as u32)?;
                self.program_stack = frame;
                self.frame_depth = self.frame_depth.saturating_sub(1);

                let ret = self.memory.read_i32(frame)?;
                if ret == RETURN_SENTINEL {
                    tracer.trace_return(pc, None);
                    return Ok(Flow::Return);
                }
                if !self.code.contains(ret) {
                    return Err(RuntimeError::BadJumpTarget { target: ret });
                }
                tracer.trace_return(pc, Some(ret as usize));
                return Ok(Flow::Next(ret as usize));
            }
            Opcode::Call => {
                let target = stack.pop()?;
                self.memory.write_i32(self.program_stack, next as i32)?;
                if target < 0 {
                    self.syscall(host, pc, target, tracer)?;
                } else if self.code.contains(target) {
                    tracer.trace_call(pc, target as usize);
                    return Ok(Flow::Next(target as usize));
                } else {
                    return Err(RuntimeError::BadCallTarget { target });
                }
            }
            Opcode::Push => stack.push(0)?,
            Opcode::Pop => {
                stack.pop()?;
            }
            Opcode::Const => stack.push(operand)?,
            Opcode::Local => stack.push((self.program_stack as i32).wrapping_add(operand))?,
            Opcode::Jump => {
                let target = stack.pop()?;
                if !self.code.contains(target) {
                    return Err(RuntimeError::BadJumpTarget { target });
                }
                return Ok(Flow::Next(target as usize));
            }

            Opcode::Eq => return self.branch(operand, next, |a, b| a == b),
            Opcode::Ne => return self.branch(operand, next, |a, b| a != b),
            Opcode::Lti => return self.branch(operand, next, |a, b| a < b),
            Opcode::Lei => return self.branch(operand, next, |a, b| a <= b),
            Opcode::Gti => return self.branch(operand, next, |a, b| a > b),
            Opcode::Gei => return self.branch(operand, next, |a, b| a >= b),
            Opcode::Ltu => return self.branch(operand, next, |a, b| (a as u32) < (b as u32)),
            Opcode::Leu => return self.branch(operand, next, |a, b| (a as u32) <= (b as u32)),
            Opcode::Gtu => return self.branch(operand, next, |a, b| (a as u32) > (b as u32)),
            Opcode::Geu => return self.branch(operand, next, |a, b| (a as u32) >= (b as u32)),
            Opcode::Eqf => return self.branch(operand, next, |a, b| float(a) == float(b)),
            Opcode::Nef => return self.branch(operand, next, |a, b| float(a) != float(b)),
            Opcode::Ltf => return self.branch(operand, next, |a, b| float(a) < float(b)),
            Opcode::Lef => return self.branch(operand, next, |a, b| float(a) <= float(b)),
            Opcode::Gtf => return self.branch(operand, next, |a, b| float(a) > float(b)),
            Opcode::Gef => return self.branch(operand, next, |a, b| float(a) >= float(b)),

            Opcode::Load1 => {
                let addr = stack.pop()?;
                stack.push(self.memory.read_u8(addr as u32)? as i32)?;
            }
            Opcode::Load2 => {
                let addr = stack.pop()?;
                stack.push(self.memory.read_u16(addr as u32)? as i32)?;
            }
            Opcode::Load4 => {
                let addr = stack.pop()?;
                stack.push(self.memory.read_i32(addr as u32)?)?;
            }
            Opcode::Store1 => {
                let (addr, value) = stack.pop2()?;
                self.memory.write_u8(addr as u32, value as u8)?;
            }
            Opcode::Store2 => {
                let (addr, value) = stack.pop2()?;
                self.memory.write_u16(addr as u32, value as u16)?;
            }
            Opcode::Store4 => {
                let (addr, value) = stack.pop2()?;
                self.memory.write_i32(addr as u32, value)?;
            }
            Opcode::Arg => {
                let value = stack.pop()?;
                let slot = self.program_stack.wrapping_add(operand as u32);
                self.memory.write_i32(slot, value)?;
            }
            Opcode::BlockCopy => {
                let (dst, src) = stack.pop2()?;
                self.memory.block_copy(dst as u32, src as u32, operand as u32)?;
            }

            Opcode::Sex8 => stack.unary(|a| a as i8 as i32)?,
            Opcode::Sex16 => stack.unary(|a| a as i16 as i32)?,
            Opcode::Negi => stack.unary(i32::wrapping_neg)?,
            Opcode::Add => stack.binary(i32::wrapping_add)?,
            Opcode::Sub => stack.binary(i32::wrapping_sub)?,
            Opcode::Divi => self.divide(i32::wrapping_div)?,
            Opcode::Divu => self.divide(|a, b| (a as u32 / b as u32) as i32)?,
            Opcode::Modi => self.divide(i32::wrapping_rem)?,
            Opcode::Modu => self.divide(|a, b| (a as u32 % b as u32) as i32)?,
            Opcode::Muli | Opcode::Mulu => stack.binary(i32::wrapping_mul)?,
            Opcode::Band => stack.binary(|a, b| a & b)?,
            Opcode::Bor => stack.binary(|a, b| a | b)?,
            Opcode::Bxor => stack.binary(|a, b| a ^ b)?,
            Opcode::Bcom => stack.unary(|a| !a)?,
            Opcode::Lsh => stack.binary(|a, b| a.wrapping_shl(b as u32))?,
            Opcode::Rshi => stack.binary(|a, b| a.wrapping_shr(b as u32))?,
            Opcode::Rshu => stack.binary(|a, b| (a as u32).wrapping_shr(b as u32) as i32)?,

            Opcode::Negf => stack.unary(|a| bits(-float(a)))?,
            Opcode::Addf => stack.binary(|a, b| bits(float(a) + float(b)))?,
            Opcode::Subf => stack.binary(|a, b| bits(float(a) - float(b)))?,
            Opcode::Divf => stack.binary(|a, b| bits(float(a) / float(b)))?,
            Opcode::Mulf => stack.binary(|a, b| bits(float(a) * float(b)))?,
            Opcode::Cvif => stack.unary(|a| bits(a as f32))?,
            Opcode::Cvfi => stack.unary(|a| float(a) as i32)?,
        }

        Ok(Flow::Next(next))
    }

    #[inline]
    fn branch(
        &mut self,
        target: i32,
        next: usize,
        taken: impl FnOnce(i32, i32) -> bool,
    ) -> Result<Flow, RuntimeError> {
        let (a, b) = self.stack.pop2()?;
        // Branch targets are checked at load time.
        Ok(Flow::Next(if taken(a, b) { target as usize } else { next }))
    }

    #[inline]
    fn divide(&mut self, op: impl FnOnce(i32, i32) -> i32) -> Result<(), RuntimeError> {
        let (a, b) = self.stack.pop2()?;
        if b == 0 {
            return Err(RuntimeError::DivideByZero);
        }
        Ok(self.stack.push(op(a, b))?)
    }

    fn hit_break<T: Tracer>(&mut self, pc: usize, tracer: &mut T) {
        self.break_count += 1;
        tracer.trace_break(pc, self.break_count);
    }

    /// Hand a negative `CALL` target to the host.
    fn syscall<H: SystemCalls + ?Sized, T: Tracer>(
        &mut self,
        host: &mut H,
        pc: usize,
        target: i32,
        tracer: &mut T,
    ) -> Result<(), RuntimeError> {
        let id = (-1 - target) as u32;
        let frame = self.program_stack;

        // A nested call starts just below the current frame.
        self.program_stack = self.reserve(frame, 4)?;
        self.memory.write_i32(frame.wrapping_add(4), id as i32)?;

        let mut args = [0i32; MAX_SYSCALL_ARGS];
        let first = frame as usize + 8;
        let count = (self.memory.len().saturating_sub(first) / 4).min(MAX_SYSCALL_ARGS);
        for (i, slot) in args[..count].iter_mut().enumerate() {
            *slot = self.memory.read_i32((first + 4 * i) as u32)?;
        }

        self.state = VmState::InSyscall;
        tracer.trace_syscall(pc, id, &args[..count]);
        let result = host.syscall(&mut SyscallContext::new(self), id, &args[..count]);
        self.program_stack = frame;

        if self.state == VmState::Faulted {
            // Prefer the handler's own report of the nested failure.
            return Err(match result {
                Err(source) => RuntimeError::Syscall { id, source },
                Ok(_) => RuntimeError::NestedFault { id },
            });
        }
        self.state = VmState::Running;

        let value = result.map_err(|source| RuntimeError::Syscall { id, source })?;
        tracer.trace_syscall_return(id, value);
        self.stack.push(value)?;
        Ok(())
    }
}
