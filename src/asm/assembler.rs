//! Two-pass assembler for MISC programs.
//!
//! Syntax:
//! ```text
//! ; Comment (or # comment)
//! start:                  ; Define a label
//!     not  r0, 0x20       ; NOT_CONST: r0 := !0x20
//!     not  r0, r0         ; NOT_REG:   r0 := !r0   (r0 now holds 0x20)
//!     nand s1, r0, s0     ; NAND_REG
//!     nand s1, r0, 0xFF   ; NAND_CONST
//!     lw   t0, r0         ; t0 := memory[r0]
//!     sw   t0, r1         ; memory[r1] := t0
//!     beq  r0, r1, start  ; branch (pushes the return address)
//!     jmp  start          ; jump (pushes nothing)
//!     ret
//!     nop
//!
//!     .org 0x100          ; Advance the location counter
//!     .word 42            ; Emit a data word
//! ```
//!
//! Registers are `r0`-`r15`, `s0`-`s15` and `t0`-`t15`, optionally written
//! with a `$` prefix. Mnemonics, registers and labels are case-insensitive.

use std::collections::HashMap;
use thiserror::Error;
use crate::cpu::decode::{encode, Condition, Instruction};
use crate::cpu::{Bank, Operand, MEMORY_SIZE};
use crate::Word;

/// Assemble source code to a memory image starting at address 0.
pub fn assemble(source: &str) -> Result<Vec<Word>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// A parsed operand.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Arg {
    Reg(Operand),
    Value(Word),
    Label(String),
}

/// The assembler state.
struct Assembler {
    /// Symbol table (label -> address).
    symbols: HashMap<String, Word>,
    /// Words waiting for a label address: (output_index, label, source_line).
    pending: Vec<(usize, String, usize)>,
    /// Output image; its length is the location counter.
    output: Vec<Word>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            pending: Vec::new(),
            output: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<Word>, AssemblerError> {
        // Pass 1: Collect labels and generate code
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: Resolve forward references
        self.resolve_references()?;

        Ok(std::mem::take(&mut self.output))
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        // Remove comments
        let line = match line.find([';', '#']) {
            Some(idx) => &line[..idx],
            None => line,
        };
        let line = line.trim();

        if line.is_empty() {
            return Ok(());
        }

        // Check for label definition
        if let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim().to_lowercase();
            self.define_label(label, line_num)?;

            let rest = line[colon_idx + 1..].trim();
            if !rest.is_empty() {
                return self.process_statement(rest, line_num);
            }
            return Ok(());
        }

        self.process_statement(line, line_num)
    }

    fn define_label(&mut self, label: String, line_num: usize) -> Result<(), AssemblerError> {
        if !is_identifier(&label) || parse_register(&label).is_some() {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("invalid label name '{label}'"),
            });
        }
        let addr = self.location(line_num)?;
        if self.symbols.insert(label.clone(), addr).is_some() {
            return Err(AssemblerError::DuplicateLabel { line: line_num, label });
        }
        Ok(())
    }

    fn process_statement(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let (mnemonic, rest) = match line.split_once(char::is_whitespace) {
            Some((m, rest)) => (m, rest.trim()),
            None => (line, ""),
        };
        let mnemonic = mnemonic.to_lowercase();

        let args: Vec<Arg> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split(',')
                .map(|a| parse_arg(a.trim(), line_num))
                .collect::<Result<_, _>>()?
        };

        match mnemonic.as_str() {
            // Directives
            ".org" => {
                let [arg] = expect_args::<1>(&mnemonic, args, line_num)?;
                let Arg::Value(addr) = arg else {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: ".org requires a numeric address".into(),
                    });
                };
                let addr = usize::from(addr);
                if addr < self.output.len() {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: format!(
                            ".org {addr:#06x} is behind the current address {:#06x}",
                            self.output.len()
                        ),
                    });
                }
                self.output.resize(addr, 0);
            }

            ".word" => {
                let [arg] = expect_args::<1>(&mnemonic, args, line_num)?;
                self.emit_value(arg, line_num)?;
            }

            // Instructions
            _ => self.process_instruction(&mnemonic, args, line_num)?,
        }

        Ok(())
    }

    fn process_instruction(
        &mut self,
        mnemonic: &str,
        args: Vec<Arg>,
        line_num: usize,
    ) -> Result<(), AssemblerError> {
        let reg = |arg: Arg| expect_register(arg, line_num);

        // Instructions whose operand3 is a literal or target come back with
        // it still unresolved.
        let (instr, word1): (Instruction, Option<Arg>) = match mnemonic {
            "nop" => {
                expect_args::<0>(mnemonic, args, line_num)?;
                (Instruction::Nop, None)
            }
            "ret" => {
                expect_args::<0>(mnemonic, args, line_num)?;
                (Instruction::Ret, None)
            }
            "lw" => {
                let [dest, address] = expect_args::<2>(mnemonic, args, line_num)?;
                (Instruction::LoadWord { dest: reg(dest)?, address: reg(address)? }, None)
            }
            "sw" => {
                let [value, address] = expect_args::<2>(mnemonic, args, line_num)?;
                (Instruction::StoreWord { value: reg(value)?, address: reg(address)? }, None)
            }
            "jmp" => {
                let [target] = expect_args::<1>(mnemonic, args, line_num)?;
                (Instruction::Jump { target: 0 }, Some(value_arg(target, line_num)?))
            }
            "not" => {
                let [dest, src] = expect_args::<2>(mnemonic, args, line_num)?;
                let dest = reg(dest)?;
                match src {
                    Arg::Reg(src) => (Instruction::NotReg { dest, src }, None),
                    constant => (Instruction::NotConst { dest, constant: 0 }, Some(constant)),
                }
            }
            "nand" => {
                let [dest, lhs, rhs] = expect_args::<3>(mnemonic, args, line_num)?;
                let (dest, lhs) = (reg(dest)?, reg(lhs)?);
                match rhs {
                    Arg::Reg(rhs) => (Instruction::NandReg { dest, lhs, rhs }, None),
                    constant => (Instruction::NandConst { dest, lhs, constant: 0 }, Some(constant)),
                }
            }
            "beq" | "bne" | "blt" | "bgt" => {
                let condition = match mnemonic {
                    "beq" => Condition::Equal,
                    "bne" => Condition::NotEqual,
                    "blt" => Condition::Less,
                    _ => Condition::Greater,
                };
                let [lhs, rhs, target] = expect_args::<3>(mnemonic, args, line_num)?;
                (
                    Instruction::Branch { condition, lhs: reg(lhs)?, rhs: reg(rhs)?, target: 0 },
                    Some(value_arg(target, line_num)?),
                )
            }
            _ => {
                return Err(AssemblerError::UnknownMnemonic {
                    line: line_num,
                    mnemonic: mnemonic.to_string(),
                })
            }
        };

        let [word0, fixed_word1] = encode(&instr);
        self.emit(word0, line_num)?;
        match word1 {
            Some(arg) => self.emit_value(arg, line_num)?,
            None => self.emit(fixed_word1, line_num)?,
        }
        Ok(())
    }

    fn emit_value(&mut self, arg: Arg, line_num: usize) -> Result<(), AssemblerError> {
        match value_arg(arg, line_num)? {
            Arg::Label(label) => {
                self.pending.push((self.output.len(), label, line_num));
                self.emit(0, line_num) // Placeholder, will be resolved in pass 2
            }
            Arg::Value(value) => self.emit(value, line_num),
            Arg::Reg(_) => unreachable!("value_arg rejects registers"),
        }
    }

    fn emit(&mut self, word: Word, line_num: usize) -> Result<(), AssemblerError> {
        if self.output.len() >= MEMORY_SIZE {
            return Err(AssemblerError::ImageTooLarge { line: line_num });
        }
        self.output.push(word);
        Ok(())
    }

    fn location(&self, line_num: usize) -> Result<Word, AssemblerError> {
        Word::try_from(self.output.len()).map_err(|_| AssemblerError::ImageTooLarge { line: line_num })
    }

    fn resolve_references(&mut self) -> Result<(), AssemblerError> {
        for (out_idx, label, line_num) in &self.pending {
            let addr = self.symbols.get(label).ok_or_else(|| AssemblerError::UndefinedLabel {
                line: *line_num,
                label: label.clone(),
            })?;
            self.output[*out_idx] = *addr;
        }
        Ok(())
    }
}

/// Take exactly `N` operands.
fn expect_args<const N: usize>(
    mnemonic: &str,
    args: Vec<Arg>,
    line_num: usize,
) -> Result<[Arg; N], AssemblerError> {
    let found = args.len();
    args.try_into().map_err(|_| AssemblerError::OperandCount {
        line: line_num,
        mnemonic: mnemonic.to_string(),
        expected: N,
        found,
    })
}

fn expect_register(arg: Arg, line_num: usize) -> Result<Operand, AssemblerError> {
    match arg {
        Arg::Reg(operand) => Ok(operand),
        other => Err(AssemblerError::ExpectedRegister {
            line: line_num,
            found: format!("{other:?}"),
        }),
    }
}

fn value_arg(arg: Arg, line_num: usize) -> Result<Arg, AssemblerError> {
    match arg {
        Arg::Reg(operand) => Err(AssemblerError::SyntaxError {
            line: line_num,
            message: format!("expected a constant or label, found register {operand}"),
        }),
        other => Ok(other),
    }
}

fn parse_arg(text: &str, line_num: usize) -> Result<Arg, AssemblerError> {
    if text.is_empty() {
        return Err(AssemblerError::SyntaxError {
            line: line_num,
            message: "empty operand".into(),
        });
    }

    if let Some(operand) = parse_register(text) {
        return Ok(Arg::Reg(operand));
    }
    if text.starts_with('$') {
        return Err(AssemblerError::SyntaxError {
            line: line_num,
            message: format!("invalid register '{text}'"),
        });
    }

    if text.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
        return parse_number(text, line_num).map(Arg::Value);
    }

    if is_identifier(text) {
        return Ok(Arg::Label(text.to_lowercase()));
    }

    Err(AssemblerError::SyntaxError {
        line: line_num,
        message: format!("invalid operand '{text}'"),
    })
}

/// Parse `r0`..`t15`, with or without a leading `$`.
fn parse_register(text: &str) -> Option<Operand> {
    let text = text.strip_prefix('$').unwrap_or(text);
    let mut chars = text.chars();
    let bank = match chars.next()?.to_ascii_lowercase() {
        'r' => Bank::R,
        's' => Bank::S,
        't' => Bank::T,
        _ => return None,
    };
    let digits = chars.as_str();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let index: u8 = digits.parse().ok()?;
    (index < 16).then(|| Operand::new(bank, index))
}

/// Parse a decimal, `0x` hex or `0b` binary literal, optionally negated.
/// Negative values are stored in two's complement.
fn parse_number(text: &str, line_num: usize) -> Result<Word, AssemblerError> {
    let lower = text.to_lowercase();
    let (negative, magnitude) = match lower.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, lower.as_str()),
    };

    let (radix, digits) = if let Some(hex) = magnitude.strip_prefix("0x") {
        (16, hex)
    } else if let Some(bin) = magnitude.strip_prefix("0b") {
        (2, bin)
    } else {
        (10, magnitude)
    };

    let invalid = || AssemblerError::SyntaxError {
        line: line_num,
        message: format!("invalid number '{text}'"),
    };
    // from_str_radix would accept a second sign.
    if digits.starts_with(['+', '-']) {
        return Err(invalid());
    }
    let value = i64::from_str_radix(digits, radix).map_err(|_| invalid())?;
    let value = if negative { -value } else { value };

    match value {
        0..=0xFFFF => Ok(value as Word),
        -0x8000..=-1 => Ok(value as i16 as Word),
        _ => Err(AssemblerError::ValueOutOfRange { line: line_num, value }),
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("line {line}: {mnemonic} takes {expected} operand(s), found {found}")]
    OperandCount { line: usize, mnemonic: String, expected: usize, found: usize },

    #[error("line {line}: expected a register, found {found}")]
    ExpectedRegister { line: usize, found: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },

    #[error("line {line}: program does not fit in memory")]
    ImageTooLarge { line: usize },
}
