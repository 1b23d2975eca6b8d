//! Whole programs assembled from source and run on the CPU.

use misc::cpu::{StackEffect, StopReason};
use misc::{assemble, disassemble, load_image, save_image, Bank, Cpu, CpuError};

fn boot(source: &str) -> Cpu {
    let image = assemble(source).unwrap();
    let mut cpu = Cpu::new();
    cpu.load(&image, 0).unwrap();
    cpu
}

#[test]
fn nand_scenario_from_source() {
    let mut cpu = boot(
        "
        not  r0, 32
        not  r0, r0
        not  s0, 8
        not  s0, s0
        nand s1, r0, s0
        ",
    );

    assert_eq!(cpu.run_limited(5).unwrap(), 5);

    assert_eq!(cpu.regs.get(Bank::R, 0), 32);
    assert_eq!(cpu.regs.get(Bank::S, 0), 8);
    assert_eq!(cpu.regs.get(Bank::S, 1), 0xFFFF);
    assert_eq!(cpu.pc(), 10);
}

#[test]
fn store_then_load() {
    let mut cpu = boot(
        "
        not  r1, 0xFF00     ; r1 = 0x00ff
        not  r2, 0x1234     ; r2 = 0xedcb
        sw   r2, r1
        lw   t3, r1
    halt:
        jmp  halt
        ",
    );

    let stop = cpu.run_until_idle(100, &mut ()).unwrap();

    assert_eq!(stop, StopReason::Idle);
    assert_eq!(cpu.mem.read(0x00FF).unwrap(), 0xEDCB);
    assert_eq!(cpu.regs.get(Bank::T, 3), 0xEDCB);
    assert_eq!(cpu.cycles, 5);
}

#[test]
fn branch_call_and_return() {
    // The callee clears the branch condition before returning, since RET
    // resumes at the branch itself.
    let mut cpu = boot(
        "
        not  r1, 0
        not  r1, r1         ; r1 = 0 = r0
    call:
        beq  r1, r0, sub
        not  t0, t0
    done:
        jmp  done
    sub:
        not  s0, 0x55
        not  r1, 0xFFFE     ; r1 = 1
        ret
        ",
    );

    let mut stack_events = Vec::new();
    let mut observer = |_: &Cpu, pulse: &misc::Pulse| {
        if pulse.stack != StackEffect::None {
            stack_events.push(pulse.stack);
        }
    };
    let stop = cpu.run_until_idle(100, &mut observer).unwrap();

    assert_eq!(stop, StopReason::Idle);
    assert_eq!(
        stack_events,
        vec![
            StackEffect::Pushed { address: 0, value: 4 },
            StackEffect::Popped { address: 0, value: 4 },
        ]
    );
    assert_eq!(cpu.regs.get(Bank::S, 0), 0xFFAA);
    assert_eq!(cpu.regs.get(Bank::T, 0), 0xFFFF);
    assert_eq!(cpu.pc(), 8);
    assert!(cpu.stack().is_empty());
    // The stack shares memory with the program and overwrote its first word.
    assert_eq!(cpu.mem.read(0).unwrap(), 4);
    assert_eq!(cpu.cycles, 9);
}

#[test]
fn nested_calls_unwind_in_order() {
    let mut cpu = boot(
        "
        nop                 ; stack slots
        beq  r0, r1, outer  ; taken while r1 == 0
    end:
        jmp  end
    outer:
        beq  r0, r2, inner  ; taken while r2 == 0
        not  r1, 0xFFFE
        ret
    inner:
        not  r2, 0xFFFE
        ret
        ",
    );

    let mut max_depth = 0;
    let mut observer = |cpu: &Cpu, _: &misc::Pulse| {
        max_depth = max_depth.max(cpu.stack().depth());
    };
    let stop = cpu.run_until_idle(100, &mut observer).unwrap();

    assert_eq!(stop, StopReason::Idle);
    assert_eq!(max_depth, 2);
    assert!(cpu.stack().is_empty());
    assert_eq!(cpu.regs.get(Bank::R, 1), 1);
    assert_eq!(cpu.regs.get(Bank::R, 2), 1);
    assert_eq!(cpu.pc(), 4);
}

#[test]
fn cycle_limit_stops_a_busy_loop() {
    let mut cpu = boot(
        "
    top:
        not  r0, r0
        jmp  top
        ",
    );

    let stop = cpu.run_until_idle(5, &mut ()).unwrap();

    assert_eq!(stop, StopReason::CycleLimit);
    assert_eq!(cpu.cycles, 5);
    assert_eq!(cpu.regs.get(Bank::R, 0), 0xFFFF);
}

#[test]
fn data_words_and_origin() {
    let mut cpu = boot(
        "
        not  r0, 0xFFEF     ; r0 = 0x10
        lw   r1, r0
    halt:
        jmp  halt

        .org 0x10
        .word 0xBEEF
        ",
    );

    cpu.run_until_idle(10, &mut ()).unwrap();

    assert_eq!(cpu.regs.get(Bank::R, 1), 0xBEEF);
}

#[test]
fn reserved_opcode_faults() {
    let mut cpu = boot(
        "
        nop
        .word 0xD000
        .word 0x0000
        ",
    );

    let err = cpu.run_until_idle(10, &mut ()).unwrap_err();

    assert_eq!(err, CpuError::UndefinedOpcode { opcode: 13 });
    assert_eq!(cpu.pc(), 2);
    assert_eq!(cpu.cycles, 1);
}

#[test]
fn image_file_roundtrip() {
    let source = "
        not  r0, 32
        nand s1, r0, 0xF0
    halt:
        jmp  halt
    ";
    let words = assemble(source).unwrap();

    let path = std::env::temp_dir().join(format!("misc-programs-{}.bin", std::process::id()));
    save_image(&path, &words).unwrap();
    let loaded = load_image(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded, words);

    let listing = disassemble(&loaded);
    assert!(listing.contains("0000: not r0, 0x20"));
    assert!(listing.contains("0002: nand s1, r0, 0xf0"));
    assert!(listing.contains("0004: jmp 0x0004"));
}
