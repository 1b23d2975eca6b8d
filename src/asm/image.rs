//! Binary image format for MISC programs.
//!
//! An image is a flat stream of 16-bit words with no header. Each word is
//! stored big-endian (high byte first), so the instruction `0x5000 0x0020`
//! is the byte sequence `50 00 00 20`.

use std::path::Path;
use thiserror::Error;
use crate::cpu::MEMORY_SIZE;
use crate::Word;

/// Decode an image from raw bytes.
pub fn parse_image(bytes: &[u8]) -> Result<Vec<Word>, ImageError> {
    if bytes.len() % 2 != 0 {
        return Err(ImageError::OddLength(bytes.len()));
    }

    let words: Vec<Word> = bytes
        .chunks_exact(2)
        .map(|pair| Word::from_be_bytes([pair[0], pair[1]]))
        .collect();

    if words.len() > MEMORY_SIZE {
        return Err(ImageError::TooLarge(words.len()));
    }

    Ok(words)
}

/// Encode words as image bytes.
pub fn encode_image(words: &[Word]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}

/// Load an image file from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Vec<Word>, ImageError> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_image(&bytes)
}

/// Save words to an image file.
pub fn save_image<P: AsRef<Path>>(path: P, words: &[Word]) -> Result<(), ImageError> {
    std::fs::write(path.as_ref(), encode_image(words))?;
    Ok(())
}

/// Errors that can occur reading or writing images.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image has an odd number of bytes ({0})")]
    OddLength(usize),

    #[error("image of {0} words does not fit in memory")]
    TooLarge(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big_endian_layout() {
        assert_eq!(encode_image(&[0x5000, 0x0020]), vec![0x50, 0x00, 0x00, 0x20]);
        assert_eq!(parse_image(&[0x12, 0x34, 0xAB, 0xCD]).unwrap(), vec![0x1234, 0xABCD]);
    }

    #[test]
    fn test_odd_length() {
        assert!(matches!(parse_image(&[1, 2, 3]), Err(ImageError::OddLength(3))));
    }

    #[test]
    fn test_too_large() {
        let bytes = vec![0u8; (MEMORY_SIZE + 1) * 2];
        assert!(matches!(parse_image(&bytes), Err(ImageError::TooLarge(_))));
        assert!(parse_image(&bytes[..MEMORY_SIZE * 2]).is_ok());
    }

    #[test]
    fn test_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("misc-image-{}.bin", std::process::id()));
        let words = [0x5000, 0x0020, 0x4000, 0xFFFF];

        save_image(&path, &words).unwrap();
        assert_eq!(std::fs::read(&path).unwrap().len(), 8);
        assert_eq!(load_image(&path).unwrap(), words);

        std::fs::remove_file(&path).unwrap();
    }
}
