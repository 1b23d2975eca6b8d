//! Instruction decoder for the MISC core.
//!
//! Every instruction is two words:
//!
//! ```text
//! word 0:  OOOO AAAAAA BBBBBB    opcode, operand1, operand2
//! word 1:  XXXXXXXXXXXXXXXX      operand3
//! ```
//!
//! How operand3 is read depends only on the opcode: a register code in its
//! top six bits, a 16-bit literal, or an absolute target address.

use std::fmt;
use serde::{Serialize, Deserialize};
use crate::cpu::registers::Operand;
use crate::cpu::CpuError;
use crate::Word;

/// The 4-bit opcode field. All 16 encodings are represented; the last three
/// have no semantics and fail to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0,
    StoreWord = 1,
    NandReg = 2,
    NandConst = 3,
    NotReg = 4,
    NotConst = 5,
    BranchEqual = 6,
    BranchNotEqual = 7,
    BranchLess = 8,
    BranchGreater = 9,
    Jump = 10,
    LoadWord = 11,
    Ret = 12,
    Reserved13 = 13,
    Reserved14 = 14,
    Reserved15 = 15,
}

impl Opcode {
    /// Decode the low four bits of `bits`.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x0F {
            0 => Opcode::Nop,
            1 => Opcode::StoreWord,
            2 => Opcode::NandReg,
            3 => Opcode::NandConst,
            4 => Opcode::NotReg,
            5 => Opcode::NotConst,
            6 => Opcode::BranchEqual,
            7 => Opcode::BranchNotEqual,
            8 => Opcode::BranchLess,
            9 => Opcode::BranchGreater,
            10 => Opcode::Jump,
            11 => Opcode::LoadWord,
            12 => Opcode::Ret,
            13 => Opcode::Reserved13,
            14 => Opcode::Reserved14,
            _ => Opcode::Reserved15,
        }
    }

    /// The 4-bit encoding.
    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Assembly mnemonic, or `None` for reserved encodings.
    pub fn mnemonic(self) -> Option<&'static str> {
        Some(match self {
            Opcode::Nop => "nop",
            Opcode::StoreWord => "sw",
            Opcode::NandReg | Opcode::NandConst => "nand",
            Opcode::NotReg | Opcode::NotConst => "not",
            Opcode::BranchEqual => "beq",
            Opcode::BranchNotEqual => "bne",
            Opcode::BranchLess => "blt",
            Opcode::BranchGreater => "bgt",
            Opcode::Jump => "jmp",
            Opcode::LoadWord => "lw",
            Opcode::Ret => "ret",
            Opcode::Reserved13 | Opcode::Reserved14 | Opcode::Reserved15 => return None,
        })
    }
}

/// Comparison performed by a conditional branch. Operands are unsigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    Equal,
    NotEqual,
    Less,
    Greater,
}

impl Condition {
    /// Evaluate the condition on two register values.
    pub fn holds(self, lhs: Word, rhs: Word) -> bool {
        match self {
            Condition::Equal => lhs == rhs,
            Condition::NotEqual => lhs != rhs,
            Condition::Less => lhs < rhs,
            Condition::Greater => lhs > rhs,
        }
    }

    pub fn opcode(self) -> Opcode {
        match self {
            Condition::Equal => Opcode::BranchEqual,
            Condition::NotEqual => Opcode::BranchNotEqual,
            Condition::Less => Opcode::BranchLess,
            Condition::Greater => Opcode::BranchGreater,
        }
    }
}

/// Decoded MISC instruction.
///
/// Register fields hold operand codes, not values; the engine resolves them
/// against the register file when the instruction executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// No operation.
    Nop,

    /// `memory[address] := value`
    StoreWord { value: Operand, address: Operand },

    /// `dest := !(lhs & rhs)`
    NandReg { dest: Operand, lhs: Operand, rhs: Operand },

    /// `dest := !(lhs & constant)`
    NandConst { dest: Operand, lhs: Operand, constant: Word },

    /// `dest := !src`
    NotReg { dest: Operand, src: Operand },

    /// `dest := !constant`
    NotConst { dest: Operand, constant: Word },

    /// If the condition holds: push PC, `PC := target`.
    Branch { condition: Condition, lhs: Operand, rhs: Operand, target: Word },

    /// `PC := target`, nothing pushed.
    Jump { target: Word },

    /// `dest := memory[address]`
    LoadWord { dest: Operand, address: Operand },

    /// `PC := pop()`
    Ret,
}

impl Instruction {
    /// The opcode this instruction encodes to.
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Nop => Opcode::Nop,
            Instruction::StoreWord { .. } => Opcode::StoreWord,
            Instruction::NandReg { .. } => Opcode::NandReg,
            Instruction::NandConst { .. } => Opcode::NandConst,
            Instruction::NotReg { .. } => Opcode::NotReg,
            Instruction::NotConst { .. } => Opcode::NotConst,
            Instruction::Branch { condition, .. } => condition.opcode(),
            Instruction::Jump { .. } => Opcode::Jump,
            Instruction::LoadWord { .. } => Opcode::LoadWord,
            Instruction::Ret => Opcode::Ret,
        }
    }

    /// True for instructions that may set the program counter.
    pub fn is_control_flow(&self) -> bool {
        matches!(
            self,
            Instruction::Branch { .. } | Instruction::Jump { .. } | Instruction::Ret
        )
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mnemonic = self.opcode().mnemonic().unwrap_or("???");
        match self {
            Instruction::Nop | Instruction::Ret => write!(f, "{mnemonic}"),
            Instruction::StoreWord { value: a, address: b }
            | Instruction::NotReg { dest: a, src: b }
            | Instruction::LoadWord { dest: a, address: b } => {
                write!(f, "{mnemonic} {a}, {b}")
            }
            Instruction::NandReg { dest, lhs, rhs } => {
                write!(f, "{mnemonic} {dest}, {lhs}, {rhs}")
            }
            Instruction::NandConst { dest, lhs, constant } => {
                write!(f, "{mnemonic} {dest}, {lhs}, {constant:#x}")
            }
            Instruction::NotConst { dest, constant } => {
                write!(f, "{mnemonic} {dest}, {constant:#x}")
            }
            Instruction::Branch { lhs, rhs, target, .. } => {
                write!(f, "{mnemonic} {lhs}, {rhs}, {target:#06x}")
            }
            Instruction::Jump { target } => write!(f, "{mnemonic} {target:#06x}"),
        }
    }
}

/// Split the first instruction word into its opcode and operand fields.
#[inline]
pub fn fields(word0: Word) -> (u8, u8, u8) {
    let opcode = (word0 >> 12) as u8 & 0x0F;
    let operand1 = (word0 >> 6) as u8 & 0x3F;
    let operand2 = word0 as u8 & 0x3F;
    (opcode, operand1, operand2)
}

/// Decode an instruction from its two words.
///
/// Both operand fields of word 0 are validated for every opcode, including
/// those that ignore them.
pub fn decode(word0: Word, word1: Word) -> Result<Instruction, CpuError> {
    let (opcode, operand1, operand2) = fields(word0);
    let opcode = Opcode::from_bits(opcode);

    let a = Operand::decode(operand1)?;
    let b = Operand::decode(operand2)?;

    let instruction = match opcode {
        Opcode::Nop => Instruction::Nop,
        Opcode::StoreWord => Instruction::StoreWord { value: a, address: b },
        Opcode::NandReg => Instruction::NandReg {
            dest: a,
            lhs: b,
            rhs: Operand::decode((word1 >> 10) as u8)?,
        },
        Opcode::NandConst => Instruction::NandConst { dest: a, lhs: b, constant: word1 },
        Opcode::NotReg => Instruction::NotReg { dest: a, src: b },
        Opcode::NotConst => Instruction::NotConst { dest: a, constant: word1 },
        Opcode::BranchEqual => branch(Condition::Equal, a, b, word1),
        Opcode::BranchNotEqual => branch(Condition::NotEqual, a, b, word1),
        Opcode::BranchLess => branch(Condition::Less, a, b, word1),
        Opcode::BranchGreater => branch(Condition::Greater, a, b, word1),
        Opcode::Jump => Instruction::Jump { target: word1 },
        Opcode::LoadWord => Instruction::LoadWord { dest: a, address: b },
        Opcode::Ret => Instruction::Ret,
        Opcode::Reserved13 | Opcode::Reserved14 | Opcode::Reserved15 => {
            return Err(CpuError::UndefinedOpcode { opcode: opcode.bits() });
        }
    };

    Ok(instruction)
}

fn branch(condition: Condition, lhs: Operand, rhs: Operand, target: Word) -> Instruction {
    Instruction::Branch { condition, lhs, rhs, target }
}

/// Encode an instruction to its two words.
///
/// Operand fields an instruction does not use are encoded as zero (register
/// `r0`).
pub fn encode(instr: &Instruction) -> [Word; 2] {
    let zero = Operand::new(crate::cpu::Bank::R, 0);
    let (a, b, word1) = match *instr {
        Instruction::Nop | Instruction::Ret => (zero, zero, 0),
        Instruction::StoreWord { value, address } => (value, address, 0),
        Instruction::NandReg { dest, lhs, rhs } => (dest, lhs, Word::from(rhs.code()) << 10),
        Instruction::NandConst { dest, lhs, constant } => (dest, lhs, constant),
        Instruction::NotReg { dest, src } => (dest, src, 0),
        Instruction::NotConst { dest, constant } => (dest, zero, constant),
        Instruction::Branch { lhs, rhs, target, .. } => (lhs, rhs, target),
        Instruction::Jump { target } => (zero, zero, target),
        Instruction::LoadWord { dest, address } => (dest, address, 0),
    };

    let word0 = (Word::from(instr.opcode().bits()) << 12)
        | (Word::from(a.code()) << 6)
        | Word::from(b.code());
    [word0, word1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::Bank;

    fn r(i: u8) -> Operand {
        Operand::new(Bank::R, i)
    }

    fn s(i: u8) -> Operand {
        Operand::new(Bank::S, i)
    }

    #[test]
    fn test_decode_nop() {
        assert_eq!(decode(0x0000, 0xFFFF).unwrap(), Instruction::Nop);
    }

    #[test]
    fn test_field_layout() {
        // opcode 3, operand1 = s1 (0b01_0001), operand2 = t2 (0b10_0010)
        let word0 = (3 << 12) | (0b01_0001 << 6) | 0b10_0010;
        assert_eq!(fields(word0), (3, 0b01_0001, 0b10_0010));
        assert_eq!(
            decode(word0, 0x00FF).unwrap(),
            Instruction::NandConst {
                dest: s(1),
                lhs: Operand::new(Bank::T, 2),
                constant: 0x00FF,
            }
        );
    }

    #[test]
    fn test_word1_register_uses_top_bits() {
        // rhs = s0 in bits 15-10, low bits must be ignored
        let word0 = (2 << 12) | (s(1).code() as Word) << 6 | r(0).code() as Word;
        let word1 = (0b01_0000 << 10) | 0x03FF;
        assert_eq!(
            decode(word0, word1).unwrap(),
            Instruction::NandReg { dest: s(1), lhs: r(0), rhs: s(0) }
        );
    }

    #[test]
    fn test_word1_interpretation_by_opcode() {
        // Same word1, three different meanings.
        let word1 = 0b11_0000 << 10;
        assert_eq!(
            decode(3 << 12, word1).unwrap(),
            Instruction::NandConst { dest: r(0), lhs: r(0), constant: word1 }
        );
        assert_eq!(decode(10 << 12, word1).unwrap(), Instruction::Jump { target: word1 });
        // As a register code the reserved bank is rejected.
        assert!(matches!(
            decode(2 << 12, word1),
            Err(CpuError::InvalidOperand { code: 0b11_0000 })
        ));
    }

    #[test]
    fn test_undefined_opcodes() {
        for opcode in 13..=15u16 {
            assert!(matches!(
                decode(opcode << 12, 0),
                Err(CpuError::UndefinedOpcode { opcode: o }) if u16::from(o) == opcode
            ));
        }
    }

    #[test]
    fn test_invalid_operand_rejected_for_every_opcode() {
        for opcode in 0..=12u16 {
            let word0 = (opcode << 12) | (0b11_0101 << 6);
            assert!(matches!(
                decode(word0, 0),
                Err(CpuError::InvalidOperand { code: 0b11_0101 })
            ));
            let word0 = (opcode << 12) | 0b11_0000;
            assert!(decode(word0, 0).is_err());
        }
    }

    #[test]
    fn test_branch_conditions() {
        assert!(Condition::Equal.holds(4, 4));
        assert!(!Condition::Equal.holds(4, 5));
        assert!(Condition::NotEqual.holds(4, 5));
        assert!(Condition::Less.holds(1, 0xFFFF));
        assert!(!Condition::Less.holds(0xFFFF, 1));
        assert!(Condition::Greater.holds(0x8000, 0x7FFF));
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let cases = [
            Instruction::Nop,
            Instruction::Ret,
            Instruction::StoreWord { value: r(1), address: s(2) },
            Instruction::NandReg { dest: s(1), lhs: r(0), rhs: s(0) },
            Instruction::NandConst { dest: r(15), lhs: s(3), constant: 0xABCD },
            Instruction::NotReg { dest: r(0), src: r(0) },
            Instruction::NotConst { dest: r(0), constant: 32 },
            Instruction::Branch { condition: Condition::Greater, lhs: r(1), rhs: r(2), target: 0x40 },
            Instruction::Jump { target: 0x1234 },
            Instruction::LoadWord { dest: s(4), address: r(9) },
        ];

        for instr in cases {
            let [w0, w1] = encode(&instr);
            assert_eq!(decode(w0, w1).unwrap(), instr);
        }
    }

    #[test]
    fn test_display() {
        let instr = Instruction::NandReg { dest: s(1), lhs: r(0), rhs: s(0) };
        assert_eq!(instr.to_string(), "nand s1, r0, s0");
        assert_eq!(Instruction::Jump { target: 8 }.to_string(), "jmp 0x0008");
    }
}
