//! # MISC Emulator
//!
//! An emulator of a minimal 16-bit instruction-set computer.
//!
//! The machine has three banks of sixteen 16-bit registers, 65536 words of
//! word-addressed memory and thirteen two-word instructions built around a
//! single logic operation (NAND). Execution is driven one clock pulse at a
//! time, so every intermediate state can be inspected.

pub mod cpu;
pub mod asm;

#[cfg(feature = "tui")]
pub mod tui;

/// The machine word: memory cells, registers and instruction halves.
pub type Word = u16;

// Re-export commonly used types
pub use cpu::{Bank, Cpu, CpuError, Instruction, Memory, Operand, Pulse, Registers, Snapshot};
pub use asm::{assemble, disassemble, AssemblerError, ImageError, load_image, save_image};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
