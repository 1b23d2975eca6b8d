//! Assembler, disassembler and image files for MISC programs.
//!
//! This module provides:
//! - A two-pass assembler (text → words)
//! - A disassembler (words → readable text)
//! - The big-endian binary image format

pub mod assembler;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, AssemblerError};
pub use disasm::disassemble;
pub use image::{load_image, save_image, ImageError};
