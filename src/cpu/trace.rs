//! Human-readable execution tracing.
//!
//! The engine itself never prints. Front ends attach a [`TraceObserver`] to
//! turn each [`Pulse`] into a `tracing` event, or call [`format_pulse`] for a
//! one-line summary.

use tracing::info;
use crate::cpu::execute::{Cpu, Effect, Pulse, PulseObserver, StackEffect};

/// Emits one `tracing` event per executed pulse.
#[derive(Debug, Default)]
pub struct TraceObserver {
    /// Number of pulses seen.
    pub count: u64,
}

impl TraceObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PulseObserver for TraceObserver {
    fn on_pulse(&mut self, cpu: &Cpu, pulse: &Pulse) {
        self.count += 1;
        info!(
            cycle = cpu.cycles,
            pc = pulse.pc,
            next_pc = pulse.next_pc,
            stack_depth = cpu.stack().depth(),
            "{}",
            format_pulse(pulse)
        );
    }
}

/// Format a pulse as `PC: instruction  effect`.
pub fn format_pulse(pulse: &Pulse) -> String {
    let mut line = format!("{:04x}: {}", pulse.pc, pulse.instruction);

    match pulse.effect {
        Some(Effect::Register { operand, old, new }) => {
            line.push_str(&format!("  {operand}: {old:#06x} -> {new:#06x}"));
        }
        Some(Effect::Memory { address, old, new }) => {
            line.push_str(&format!("  [{address:#06x}]: {old:#06x} -> {new:#06x}"));
        }
        None => {}
    }

    match pulse.stack {
        StackEffect::None => {}
        StackEffect::Pushed { address, value } => {
            line.push_str(&format!("  push {value:#06x} @ {address:#06x}"));
        }
        StackEffect::Popped { address, value } => {
            line.push_str(&format!("  pop {value:#06x} @ {address:#06x}"));
        }
        StackEffect::Underflow { value } => {
            line.push_str(&format!("  pop {value:#06x} (stack empty)"));
        }
    }

    if pulse.instruction.is_control_flow() && pulse.next_pc != pulse.pc + 2 {
        line.push_str(&format!("  -> {:04x}", pulse.next_pc));
    }

    line
}
