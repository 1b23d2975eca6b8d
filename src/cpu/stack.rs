//! Return-address stack.
//!
//! The stack lives in main memory. `first` is the base (always 0) and `last`
//! is the next free slot; the stack grows upward.

use serde::{Serialize, Deserialize};
use crate::cpu::memory::{Memory, MemoryError};
use crate::Word;

/// Result of popping the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Popped {
    /// The word read from the new top of the stack.
    pub value: Word,
    /// The stack was already empty. The cursor stayed at the base and the
    /// value is whatever `memory[first]` holds.
    pub underflow: bool,
}

/// Cursors of the memory-resident call stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CallStack {
    first: usize,
    last: usize,
}

impl CallStack {
    /// An empty stack based at address 0.
    pub const fn new() -> Self {
        Self { first: 0, last: 0 }
    }

    /// Reset both cursors to the base.
    pub fn reset(&mut self) {
        self.last = self.first;
    }

    /// Base address.
    pub fn first(&self) -> usize {
        self.first
    }

    /// Next free slot.
    pub fn last(&self) -> usize {
        self.last
    }

    /// Number of words currently pushed.
    pub fn depth(&self) -> usize {
        self.last - self.first
    }

    pub fn is_empty(&self) -> bool {
        self.last == self.first
    }

    /// Write `value` at the top and advance the cursor.
    pub fn push(&mut self, mem: &mut Memory, value: Word) -> Result<(), MemoryError> {
        mem.write(self.last, value)?;
        self.last += 1;
        Ok(())
    }

    /// Retreat the cursor (never below the base) and read the word there.
    pub fn pop(&mut self, mem: &Memory) -> Result<Popped, MemoryError> {
        let underflow = self.last <= self.first;
        if !underflow {
            self.last -= 1;
        }
        let value = mem.read(self.last)?;
        Ok(Popped { value, underflow })
    }

    /// The word a pop would return, without moving the cursor.
    pub fn peek(&self, mem: &Memory) -> Result<Word, MemoryError> {
        mem.read(self.last.saturating_sub(1).max(self.first))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::memory::MEMORY_SIZE;

    #[test]
    fn test_push_pop() {
        let mut mem = Memory::new();
        let mut stack = CallStack::new();

        stack.push(&mut mem, 10).unwrap();
        stack.push(&mut mem, 20).unwrap();
        assert_eq!(stack.depth(), 2);
        assert_eq!(mem.read(0).unwrap(), 10);
        assert_eq!(mem.read(1).unwrap(), 20);
        assert_eq!(stack.peek(&mem).unwrap(), 20);

        assert_eq!(stack.pop(&mem).unwrap(), Popped { value: 20, underflow: false });
        assert_eq!(stack.pop(&mem).unwrap(), Popped { value: 10, underflow: false });
        assert!(stack.is_empty());
    }

    #[test]
    fn test_underflow_clamps() {
        let mut mem = Memory::new();
        mem.write(0, 0x1234).unwrap();
        let mut stack = CallStack::new();

        let popped = stack.pop(&mem).unwrap();
        assert_eq!(popped, Popped { value: 0x1234, underflow: true });
        assert_eq!(stack.last(), stack.first());

        // Still clamped on repeated underflow.
        assert!(stack.pop(&mem).unwrap().underflow);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_push_past_end_of_memory() {
        let mut mem = Memory::new();
        let mut stack = CallStack { first: 0, last: MEMORY_SIZE - 1 };

        stack.push(&mut mem, 1).unwrap();
        assert_eq!(
            stack.push(&mut mem, 2),
            Err(MemoryError::OutOfBounds { address: MEMORY_SIZE })
        );
    }

    #[test]
    fn test_reset() {
        let mut mem = Memory::new();
        let mut stack = CallStack::new();
        stack.push(&mut mem, 1).unwrap();
        stack.reset();
        assert!(stack.is_empty());
    }
}
