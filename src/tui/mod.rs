//! TUI debugger for the MISC emulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - Register bank, PC and stack view
//! - Scrollable memory view highlighting the PC and stack
//! - Step/run/breakpoint controls
//! - Disassembly view

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
