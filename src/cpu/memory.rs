//! MISC memory subsystem.
//!
//! A flat array of 65536 words. Addresses are word addresses: every address
//! holds one full 16-bit word.

use serde::{Serialize, Deserialize};
use thiserror::Error;
use crate::Word;

/// The number of words of memory.
pub const MEMORY_SIZE: usize = 1 << 16;

/// MISC memory: 65536 sixteen-bit cells.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    cells: Vec<Word>,
}

impl Memory {
    /// Create a new memory with all cells zeroed.
    pub fn new() -> Self {
        Self {
            cells: vec![0; MEMORY_SIZE],
        }
    }

    /// Read a cell.
    #[inline]
    pub fn read(&self, addr: usize) -> Result<Word, MemoryError> {
        self.cells
            .get(addr)
            .copied()
            .ok_or(MemoryError::OutOfBounds { address: addr })
    }

    /// Write a cell.
    #[inline]
    pub fn write(&mut self, addr: usize, value: Word) -> Result<(), MemoryError> {
        let cell = self.cells
            .get_mut(addr)
            .ok_or(MemoryError::OutOfBounds { address: addr })?;
        *cell = value;
        Ok(())
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Copy an image into memory starting at `offset`.
    ///
    /// Nothing is written if the image would run past the end of memory; the
    /// error names the first address that does not exist.
    pub fn load(&mut self, offset: usize, image: &[Word]) -> Result<(), MemoryError> {
        let end = offset
            .checked_add(image.len())
            .filter(|&end| end <= MEMORY_SIZE)
            .ok_or(MemoryError::OutOfBounds {
                address: offset.max(MEMORY_SIZE),
            })?;

        self.cells[offset..end].copy_from_slice(image);
        Ok(())
    }

    /// Borrow a range of cells, clipped to the end of memory.
    pub fn slice(&self, start: usize, count: usize) -> &[Word] {
        let start = start.min(MEMORY_SIZE);
        let end = start.saturating_add(count).min(MEMORY_SIZE);
        &self.cells[start..end]
    }

    /// The whole memory array.
    pub fn as_slice(&self) -> &[Word] {
        &self.cells
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|&&w| w != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &MEMORY_SIZE)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Address is at or beyond the end of memory.
    #[error("address {address:#06x} out of bounds (memory holds {MEMORY_SIZE} words)")]
    OutOfBounds { address: usize },
}
