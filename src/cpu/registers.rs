//! MISC register file.
//!
//! Three independent banks of 16 words each:
//! - R: bank selector `00`
//! - S: bank selector `01`
//! - T: bank selector `10`
//!
//! The selector `11` is reserved and always rejected.

use std::fmt;
use serde::{Serialize, Deserialize};
use crate::cpu::CpuError;
use crate::Word;

/// Number of registers in each bank.
pub const BANK_SIZE: usize = 16;

/// A register bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bank {
    R,
    S,
    T,
}

impl Bank {
    /// All three banks, in selector order.
    pub const ALL: [Bank; 3] = [Bank::R, Bank::S, Bank::T];

    /// Decode a 2-bit bank selector. `0b11` has no bank.
    pub fn from_selector(selector: u8) -> Option<Self> {
        match selector & 0b11 {
            0b00 => Some(Bank::R),
            0b01 => Some(Bank::S),
            0b10 => Some(Bank::T),
            _ => None,
        }
    }

    /// The 2-bit selector for this bank.
    pub fn selector(self) -> u8 {
        match self {
            Bank::R => 0b00,
            Bank::S => 0b01,
            Bank::T => 0b10,
        }
    }

    /// Lowercase prefix used by the assembler and disassembler.
    pub fn prefix(self) -> char {
        match self {
            Bank::R => 'r',
            Bank::S => 's',
            Bank::T => 't',
        }
    }

    fn slot(self) -> usize {
        self.selector() as usize
    }
}

impl fmt::Display for Bank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bank::R => write!(f, "R"),
            Bank::S => write!(f, "S"),
            Bank::T => write!(f, "T"),
        }
    }
}

/// A validated 6-bit operand code naming one of the 48 registers.
///
/// Format: `BB IIII`, bank selector in bits 5-4, index in bits 3-0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operand {
    pub bank: Bank,
    pub index: u8,
}

impl Operand {
    /// Create an operand; the index is masked to 4 bits.
    pub fn new(bank: Bank, index: u8) -> Self {
        Self { bank, index: index & 0x0F }
    }

    /// Decode a 6-bit operand code.
    pub fn decode(code: u8) -> Result<Self, CpuError> {
        let code = code & 0x3F;
        let bank = Bank::from_selector(code >> 4)
            .ok_or(CpuError::InvalidOperand { code })?;
        Ok(Self::new(bank, code))
    }

    /// Encode back to a 6-bit operand code.
    pub fn code(self) -> u8 {
        (self.bank.selector() << 4) | self.index
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.bank.prefix(), self.index)
    }
}

/// The MISC register file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    banks: [[Word; BANK_SIZE]; 3],
}

impl Registers {
    /// Create a register file with every register zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero all three banks.
    pub fn reset(&mut self) {
        self.banks = [[0; BANK_SIZE]; 3];
    }

    /// Read a register. The index is masked to 4 bits.
    #[inline]
    pub fn get(&self, bank: Bank, index: u8) -> Word {
        self.banks[bank.slot()][(index & 0x0F) as usize]
    }

    /// Overwrite a register. The index is masked to 4 bits.
    #[inline]
    pub fn set(&mut self, bank: Bank, index: u8, value: Word) {
        self.banks[bank.slot()][(index & 0x0F) as usize] = value;
    }

    /// Read the register named by a raw selector and index.
    ///
    /// Fails with [`CpuError::InvalidOperand`] for selector `0b11`.
    pub fn get_raw(&self, selector: u8, index: u8) -> Result<Word, CpuError> {
        let bank = Self::raw_bank(selector, index)?;
        Ok(self.get(bank, index))
    }

    /// Write the register named by a raw selector and index.
    ///
    /// Fails with [`CpuError::InvalidOperand`] for selector `0b11`.
    pub fn set_raw(&mut self, selector: u8, index: u8, value: Word) -> Result<(), CpuError> {
        let bank = Self::raw_bank(selector, index)?;
        self.set(bank, index, value);
        Ok(())
    }

    /// Read the register named by a decoded operand.
    #[inline]
    pub fn read(&self, operand: Operand) -> Word {
        self.get(operand.bank, operand.index)
    }

    /// Write the register named by a decoded operand.
    #[inline]
    pub fn write(&mut self, operand: Operand, value: Word) {
        self.set(operand.bank, operand.index, value);
    }

    /// Bulk-set one bank.
    pub fn load_bank(&mut self, bank: Bank, values: [Word; BANK_SIZE]) {
        self.banks[bank.slot()] = values;
    }

    /// All 16 registers of one bank.
    pub fn bank(&self, bank: Bank) -> &[Word; BANK_SIZE] {
        &self.banks[bank.slot()]
    }

    /// All three banks in R, S, T order.
    pub fn banks(&self) -> &[[Word; BANK_SIZE]; 3] {
        &self.banks
    }

    fn raw_bank(selector: u8, index: u8) -> Result<Bank, CpuError> {
        Bank::from_selector(selector).ok_or(CpuError::InvalidOperand {
            code: ((selector & 0b11) << 4) | (index & 0x0F),
        })
    }
}
