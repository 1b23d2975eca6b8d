//! CPU execution engine for the MISC core.
//!
//! Implements the fetch-decode-execute cycle. One call to [`Cpu::pulse`] is
//! one clock pulse and executes exactly one instruction.

use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, trace, warn};
use crate::cpu::{Bank, CallStack, Memory, Registers};
use crate::cpu::decode::{self, Instruction};
use crate::cpu::memory::MemoryError;
use crate::cpu::registers::{Operand, BANK_SIZE};
use crate::Word;

/// The single state mutation an instruction made, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Register { operand: Operand, old: Word, new: Word },
    Memory { address: usize, old: Word, new: Word },
}

/// What an instruction did to the call stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StackEffect {
    #[default]
    None,
    /// `value` was written at `address`.
    Pushed { address: usize, value: Word },
    /// `value` was read back from `address`.
    Popped { address: usize, value: Word },
    /// RET on an empty stack: the cursor stayed at the base and `value` was
    /// read from the base slot.
    Underflow { value: Word },
}

/// Record of one executed pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pulse {
    /// Address the instruction was fetched from.
    pub pc: usize,
    /// Raw instruction words.
    pub words: [Word; 2],
    pub instruction: Instruction,
    /// Program counter after the pulse.
    pub next_pc: usize,
    pub effect: Option<Effect>,
    pub stack: StackEffect,
}

impl Pulse {
    /// True when the instruction left the program counter where it was,
    /// i.e. a jump or taken branch to itself.
    pub fn is_idle(&self) -> bool {
        self.next_pc == self.pc
    }
}

/// Receives every successfully executed pulse.
pub trait PulseObserver {
    fn on_pulse(&mut self, cpu: &Cpu, pulse: &Pulse);
}

impl PulseObserver for () {
    fn on_pulse(&mut self, _cpu: &Cpu, _pulse: &Pulse) {}
}

impl<F: FnMut(&Cpu, &Pulse)> PulseObserver for F {
    fn on_pulse(&mut self, cpu: &Cpu, pulse: &Pulse) {
        self(cpu, pulse)
    }
}

/// Why a run loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// A pulse left the PC unchanged.
    Idle,
    /// The cycle budget was used up.
    CycleLimit,
}

/// Read-only copy of the machine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Banks in R, S, T order.
    pub registers: [[Word; BANK_SIZE]; 3],
    pub memory: Vec<Word>,
    pub pc: usize,
    pub stack_top: usize,
}

/// The MISC CPU.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// Register banks R, S and T.
    pub regs: Registers,
    /// Main memory, shared with the call stack.
    pub mem: Memory,
    stack: CallStack,
    pc: usize,
    /// Pulses executed since construction or reset.
    pub cycles: u64,
    last_pulse: Option<Pulse>,
}

impl Cpu {
    /// Create a new CPU with zeroed state.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            stack: CallStack::new(),
            pc: 0,
            cycles: 0,
            last_pulse: None,
        }
    }

    /// Zero memory, registers, program counter and stack cursors.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.stack.reset();
        self.pc = 0;
        self.cycles = 0;
        self.last_pulse = None;
        debug!("CPU reset");
    }

    /// Copy an image into memory starting at `offset`.
    ///
    /// The words are not validated; bad instructions surface when executed.
    pub fn load(&mut self, image: &[Word], offset: usize) -> Result<(), CpuError> {
        self.mem.load(offset, image)?;
        debug!(len = image.len(), offset, "Loaded image");
        Ok(())
    }

    /// Bulk-set one register bank.
    pub fn load_registers(&mut self, bank: Bank, values: [Word; BANK_SIZE]) {
        self.regs.load_bank(bank, values);
    }

    /// Address of the next instruction to fetch.
    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn stack(&self) -> &CallStack {
        &self.stack
    }

    /// The most recent successful pulse.
    pub fn last_pulse(&self) -> Option<&Pulse> {
        self.last_pulse.as_ref()
    }

    /// Copy out registers, memory, program counter and stack top.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            registers: *self.regs.banks(),
            memory: self.mem.as_slice().to_vec(),
            pc: self.pc,
            stack_top: self.stack.last(),
        }
    }

    /// Execute one instruction.
    ///
    /// On error the machine state is unspecified; reset before continuing.
    #[tracing::instrument(skip(self), level = "trace", fields(pc = self.pc))]
    pub fn pulse(&mut self) -> Result<Pulse, CpuError> {
        // Fetch
        let pc = self.pc;
        let words = [self.mem.read(pc)?, self.mem.read(pc + 1)?];

        // Decode
        let instruction = decode::decode(words[0], words[1])?;

        // Execute
        let mut pulse = Pulse {
            pc,
            words,
            instruction,
            next_pc: pc + 2,
            effect: None,
            stack: StackEffect::None,
        };
        self.execute(&mut pulse)?;

        self.pc = pulse.next_pc;
        self.cycles += 1;
        self.last_pulse = Some(pulse);
        trace!(instruction = %pulse.instruction, next_pc = pulse.next_pc, "Executed");

        Ok(pulse)
    }

    /// Execute one instruction and hand the record to `observer`.
    pub fn pulse_observed(&mut self, observer: &mut dyn PulseObserver) -> Result<Pulse, CpuError> {
        let pulse = self.pulse()?;
        observer.on_pulse(self, &pulse);
        Ok(pulse)
    }

    /// Run for at most `max_cycles` pulses.
    ///
    /// Returns the number of pulses executed.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        for _ in 0..max_cycles {
            self.pulse()?;
        }
        Ok(max_cycles)
    }

    /// Run until a pulse leaves the PC unchanged or `max_cycles` pulses have
    /// executed.
    pub fn run_until_idle(
        &mut self,
        max_cycles: u64,
        observer: &mut dyn PulseObserver,
    ) -> Result<StopReason, CpuError> {
        for _ in 0..max_cycles {
            if self.pulse_observed(observer)?.is_idle() {
                debug!(pc = self.pc, cycles = self.cycles, "Idle loop reached");
                return Ok(StopReason::Idle);
            }
        }
        Ok(StopReason::CycleLimit)
    }

    /// Execute a decoded instruction.
    fn execute(&mut self, pulse: &mut Pulse) -> Result<(), CpuError> {
        match pulse.instruction {
            Instruction::Nop => {}

            Instruction::StoreWord { value, address } => {
                let value = self.regs.read(value);
                let address = usize::from(self.regs.read(address));
                let old = self.mem.read(address)?;
                self.mem.write(address, value)?;
                pulse.effect = Some(Effect::Memory { address, old, new: value });
            }

            Instruction::NandReg { dest, lhs, rhs } => {
                let result = !(self.regs.read(lhs) & self.regs.read(rhs));
                pulse.effect = Some(self.set_register(dest, result));
            }

            Instruction::NandConst { dest, lhs, constant } => {
                let result = !(self.regs.read(lhs) & constant);
                pulse.effect = Some(self.set_register(dest, result));
            }

            Instruction::NotReg { dest, src } => {
                let result = !self.regs.read(src);
                pulse.effect = Some(self.set_register(dest, result));
            }

            Instruction::NotConst { dest, constant } => {
                pulse.effect = Some(self.set_register(dest, !constant));
            }

            Instruction::Branch { condition, lhs, rhs, target } => {
                let (a, b) = (self.regs.read(lhs), self.regs.read(rhs));
                if condition.holds(a, b) {
                    // The fetch at pc + 1 succeeded, so pc fits in a word.
                    let return_address = pulse.pc as Word;
                    let address = self.stack.last();
                    self.stack.push(&mut self.mem, return_address)?;
                    pulse.stack = StackEffect::Pushed { address, value: return_address };
                    pulse.next_pc = usize::from(target);
                    debug!(?condition, a, b, "Branching to address {:#06x}", target);
                }
            }

            Instruction::Jump { target } => {
                pulse.next_pc = usize::from(target);
                debug!("Jumping to address {:#06x}", target);
            }

            Instruction::LoadWord { dest, address } => {
                let address = usize::from(self.regs.read(address));
                let value = self.mem.read(address)?;
                pulse.effect = Some(self.set_register(dest, value));
            }

            Instruction::Ret => {
                let popped = self.stack.pop(&self.mem)?;
                pulse.stack = if popped.underflow {
                    warn!(value = popped.value, "RET on empty stack, reusing base slot");
                    StackEffect::Underflow { value: popped.value }
                } else {
                    StackEffect::Popped { address: self.stack.last(), value: popped.value }
                };
                pulse.next_pc = usize::from(popped.value);
                debug!("Returning to address {:#06x}", popped.value);
            }
        }

        Ok(())
    }

    fn set_register(&mut self, operand: Operand, new: Word) -> Effect {
        let old = self.regs.read(operand);
        self.regs.write(operand, new);
        Effect::Register { operand, old, new }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("pc", &self.pc)
            .field("cycles", &self.cycles)
            .field("stack", &self.stack)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("invalid operand code {code:#08b}: bank selector 0b11 is reserved")]
    InvalidOperand { code: u8 },

    #[error("undefined opcode {opcode}")]
    UndefinedOpcode { opcode: u8 },

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),
}
