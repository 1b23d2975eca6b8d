//! Disassembler for MISC programs.
//!
//! Converts instruction word pairs back to assembler syntax.

use crate::cpu::decode::decode;
use crate::Word;

/// Disassemble a single instruction to text.
pub fn disassemble_instruction(word0: Word, word1: Word) -> String {
    match decode(word0, word1) {
        Ok(decoded) => decoded.to_string(),
        Err(_) => "???".to_string(),
    }
}

/// Disassemble an image, one instruction per two words.
pub fn disassemble(words: &[Word]) -> String {
    let mut output = String::new();
    output.push_str("; MISC Disassembly\n");
    output.push_str("; ----------------\n\n");

    for (i, pair) in words.chunks(2).enumerate() {
        let addr = i * 2;
        let line = match pair {
            &[w0, w1] => format!(
                "{:04x}: {:<24} ; {:04x} {:04x}",
                addr,
                disassemble_instruction(w0, w1),
                w0,
                w1
            ),
            &[w0] => format!("{:04x}: {:<24} ; {:04x}", addr, format!(".word {w0:#06x}"), w0),
            _ => unreachable!(),
        };
        output.push_str(&line);
        output.push('\n');
    }

    output
}
