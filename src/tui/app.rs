//! Debugger application state and logic.

use std::collections::HashSet;
use crate::{Cpu, Word};
use crate::asm::disasm::disassemble_instruction;
use crate::cpu::{format_pulse, MEMORY_SIZE};

/// Memory words shown per row of the memory view.
pub const WORDS_PER_ROW: usize = 8;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// Program image, reloaded on reset.
    pub program: Vec<Word>,
    /// Breakpoints (by address).
    pub breakpoints: HashSet<usize>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// The last pulse failed; the CPU must be reset.
    pub faulted: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view scroll offset, in rows.
    pub mem_scroll: usize,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(program: Vec<Word>) -> Self {
        let mut app = Self {
            cpu: Cpu::new(),
            program,
            breakpoints: HashSet::new(),
            running: false,
            faulted: false,
            should_quit: false,
            status: String::new(),
            mem_scroll: 0,
        };
        app.reset();
        app.status = "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into();
        app
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if self.faulted {
            self.status = "CPU faulted. Press 'x' to reset.".into();
            self.running = false;
            return;
        }

        let pc = self.cpu.pc();
        match self.cpu.pulse() {
            Ok(pulse) => {
                self.status = format!("Stepped to PC={:04x}", pulse.next_pc);
                if pulse.is_idle() {
                    self.running = false;
                    self.status = format!("Idle at PC={pc:04x} after {} cycles", self.cpu.cycles);
                }
            }
            Err(e) => {
                self.status = format!("Error at PC={pc:04x}: {e}");
                self.running = false;
                self.faulted = true;
            }
        }
    }

    /// Run until idle, breakpoint, or error.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        self.step();

        // Check for breakpoint
        let pc = self.cpu.pc();
        if self.running && self.breakpoints.contains(&pc) {
            self.running = false;
            self.status = format!("Breakpoint at PC={pc:04x}");
        }
    }

    /// Toggle breakpoint at current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cpu.pc();
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={pc:04x}");
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={pc:04x}");
        }
    }

    /// Reset CPU to initial state and reload the program.
    pub fn reset(&mut self) {
        self.cpu.reset();
        if let Err(e) = self.cpu.load(&self.program, 0) {
            self.status = format!("Failed to load program: {e}");
            self.faulted = true;
            return;
        }
        self.running = false;
        self.faulted = false;
        self.status = "Reset. Ready.".into();
    }

    /// Scroll the memory view by `rows`, clamped to memory.
    pub fn scroll_memory(&mut self, rows: isize) {
        let max = MEMORY_SIZE / WORDS_PER_ROW - 1;
        self.mem_scroll = self.mem_scroll.saturating_add_signed(rows).min(max);
    }

    /// Raw words and trace line of the most recent pulse.
    pub fn last_pulse_line(&self) -> String {
        match self.cpu.last_pulse() {
            Some(pulse) => {
                let [w0, w1] = pulse.words;
                format!("{w0:04x} {w1:04x}  {}", format_pulse(pulse))
            }
            None => "-".into(),
        }
    }

    /// Get disassembly around current PC: (address, text, is_current).
    pub fn get_disassembly(&self, lines: usize) -> Vec<(usize, String, bool)> {
        let pc = self.cpu.pc();
        // Keep the listing aligned to the PC's parity.
        let start = pc.saturating_sub(lines / 2 * 2);

        (0..lines)
            .map(|i| start + i * 2)
            .filter(|&addr| addr + 1 < MEMORY_SIZE)
            .map(|addr| {
                let words = self.cpu.mem.slice(addr, 2);
                let text = disassemble_instruction(words[0], words[1]);
                (addr, text, addr == pc)
            })
            .collect()
    }
}

/// Run the debugger with a program.
pub fn run_debugger(program: Vec<Word>) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = DebuggerApp::new(program);

    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Up => app.scroll_memory(-1),
                        KeyCode::Down => app.scroll_memory(1),
                        KeyCode::PageUp => app.scroll_memory(-16),
                        KeyCode::PageDown => app.scroll_memory(16),
                        _ => {}
                    }
                }
            }
        }

        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;

    fn app(source: &str) -> DebuggerApp {
        DebuggerApp::new(assemble(source).unwrap())
    }

    #[test]
    fn test_step_and_reset() {
        let mut app = app("not r0, 0\nnop");
        app.step();
        assert_eq!(app.cpu.pc(), 2);
        assert_eq!(app.cpu.regs.get(crate::Bank::R, 0), 0xFFFF);

        app.reset();
        assert_eq!(app.cpu.pc(), 0);
        assert_eq!(app.cpu.regs.get(crate::Bank::R, 0), 0);
        // Program is reloaded.
        assert_eq!(app.cpu.mem.slice(0, 2), &app.program[..2]);
    }

    #[test]
    fn test_last_pulse_line() {
        let mut app = app("not r0, 0");
        assert_eq!(app.last_pulse_line(), "-");

        app.step();
        assert_eq!(app.last_pulse_line(), "5000 0000  0000: not r0, 0x0  r0: 0x0000 -> 0xffff");

        app.reset();
        assert_eq!(app.last_pulse_line(), "-");
    }

    #[test]
    fn test_run_stops_at_breakpoint() {
        let mut app = app("nop\nnop\nnop\nloop: jmp loop");
        app.breakpoints.insert(4);
        app.run();
        for _ in 0..10 {
            app.tick();
        }

        assert!(!app.running);
        assert_eq!(app.cpu.pc(), 4);
    }

    #[test]
    fn test_run_stops_when_idle() {
        let mut app = app("nop\nloop: jmp loop");
        app.run();
        for _ in 0..10 {
            app.tick();
        }

        assert!(!app.running);
        assert_eq!(app.cpu.pc(), 2);
        assert!(app.status.starts_with("Idle"));
    }

    #[test]
    fn test_fault_blocks_stepping() {
        let mut app = DebuggerApp::new(vec![0xF000, 0]);
        app.step();
        assert!(app.faulted);

        app.step();
        assert_eq!(app.cpu.cycles, 0);
        assert!(app.status.contains("reset"));
    }

    #[test]
    fn test_disassembly_window() {
        let app = app("nop\nret");
        let lines = app.get_disassembly(4);

        assert_eq!(lines[0], (0, "nop".to_string(), true));
        assert_eq!(lines[1].1, "ret");
    }
}
