//! CPU emulation for the MISC core.
//!
//! This module implements the complete machine:
//! - 65536 sixteen-bit memory words
//! - three banks (R, S, T) of 16 general-purpose registers
//! - a return-address stack kept in main memory
//! - a 13-instruction set with two-word instructions

pub mod memory;
pub mod registers;
pub mod stack;
pub mod decode;
pub mod execute;
pub mod trace;

pub use memory::{Memory, MemoryError, MEMORY_SIZE};
pub use registers::{Bank, Operand, Registers, BANK_SIZE};
pub use stack::CallStack;
pub use decode::{Condition, Instruction, Opcode};
pub use execute::{Cpu, CpuError, Effect, Pulse, PulseObserver, Snapshot, StackEffect, StopReason};
pub use trace::{format_pulse, TraceObserver};
