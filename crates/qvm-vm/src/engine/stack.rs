//! Operand stack.
//!
//! One preallocated array of 32-bit slots serves every invocation. Each
//! invocation raises the floor to the depth at its entry, so bytecode can
//! never pop values belonging to an outer invocation.

use super::error::StackFault;

#[derive(Debug)]
pub(crate) struct OperandStack {
    slots: Box<[i32]>,
    len: usize,
    floor: usize,
}

impl OperandStack {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: vec![0; capacity].into_boxed_slice(),
            len: 0,
            floor: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Values pushed by the current invocation.
    pub(crate) fn depth(&self) -> usize {
        self.len - self.floor
    }

    pub(crate) fn floor(&self) -> usize {
        self.floor
    }

    /// Start a new invocation at the current depth. Returns the previous floor.
    pub(crate) fn enter(&mut self) -> usize {
        std::mem::replace(&mut self.floor, self.len)
    }

    /// Drop whatever the invocation left and restore the caller's floor.
    pub(crate) fn leave(&mut self, floor: usize) {
        self.len = self.floor;
        self.floor = floor;
    }

    pub(crate) fn reset(&mut self) {
        self.len = 0;
        self.floor = 0;
    }

    #[inline]
    pub(crate) fn push(&mut self, value: i32) -> Result<(), StackFault> {
        let Some(slot) = self.slots.get_mut(self.len) else {
            return Err(StackFault::OperandOverflow {
                capacity: self.slots.len(),
            });
        };
        *slot = value;
        self.len += 1;
        Ok(())
    }

    #[inline]
    pub(crate) fn pop(&mut self) -> Result<i32, StackFault> {
        if self.len == self.floor {
            return Err(StackFault::OperandUnderflow);
        }
        self.len -= 1;
        Ok(self.slots[self.len])
    }

    /// Pop `b` then `a`, returning `(a, b)` in push order.
    #[inline]
    pub(crate) fn pop2(&mut self) -> Result<(i32, i32), StackFault> {
        let b = self.pop()?;
        let a = self.pop()?;
        Ok((a, b))
    }

    /// Replace the top value with `f(top)`.
    #[inline]
    pub(crate) fn unary(&mut self, f: impl FnOnce(i32) -> i32) -> Result<(), StackFault> {
        let a = self.pop()?;
        self.push(f(a))
    }

    /// Replace the two top values with `f(a, b)`.
    #[inline]
    pub(crate) fn binary(&mut self, f: impl FnOnce(i32, i32) -> i32) -> Result<(), StackFault> {
        let (a, b) = self.pop2()?;
        self.push(f(a, b))
    }
}
