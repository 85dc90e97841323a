//! Fixed-alphabet identifier generation.
//!
//! Random bytes are masked down to the smallest all-ones bit pattern that
//! covers the alphabet, and any masked value that falls outside the alphabet
//! is thrown away. Reducing out-of-range values with a modulo instead would
//! favour the first characters whenever the alphabet size is not a power of
//! two.

use std::sync::Arc;

use crate::error::{CryptoError, Result};
use crate::random::{OsRandom, RandomSource};

/// Default alphabet: 64 URL-safe characters.
pub const DEFAULT_ALPHABET: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// Default identifier length. 22 characters of a 64-symbol alphabet carry
/// 132 bits of entropy.
pub const DEFAULT_ID_LENGTH: usize = 22;

/// Smallest accepted alphabet.
pub const MIN_ALPHABET_LEN: usize = 8;

/// Largest accepted alphabet (indices must fit in one byte).
pub const MAX_ALPHABET_LEN: usize = 255;

/// Identifier generator bound to one alphabet.
#[derive(Debug, Clone)]
pub struct NanoId {
    alphabet: Vec<u8>,
    mask: u8,
    source: Arc<dyn RandomSource>,
}

impl Default for NanoId {
    fn default() -> Self {
        Self {
            alphabet: DEFAULT_ALPHABET.as_bytes().to_vec(),
            mask: mask_for(DEFAULT_ALPHABET.len()),
            source: Arc::new(OsRandom),
        }
    }
}

impl NanoId {
    /// Generator over [`DEFAULT_ALPHABET`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator over a custom alphabet.
    ///
    /// # Errors
    /// [`CryptoError::InvalidAlphabet`] when the alphabet is not pure ASCII or
    /// its length is outside `8..=255`.
    pub fn with_alphabet(alphabet: &str) -> Result<Self> {
        if !alphabet.is_ascii() {
            return Err(CryptoError::InvalidAlphabet(
                "alphabet must contain only ASCII characters".to_string(),
            ));
        }
        if alphabet.len() < MIN_ALPHABET_LEN {
            return Err(CryptoError::InvalidAlphabet(format!(
                "alphabet must contain at least {} characters",
                MIN_ALPHABET_LEN
            )));
        }
        if alphabet.len() > MAX_ALPHABET_LEN {
            return Err(CryptoError::InvalidAlphabet(format!(
                "alphabet must contain no more than {} characters",
                MAX_ALPHABET_LEN
            )));
        }

        Ok(Self {
            alphabet: alphabet.as_bytes().to_vec(),
            mask: mask_for(alphabet.len()),
            source: Arc::new(OsRandom),
        })
    }

    /// Replace the random source.
    pub fn with_random_source(mut self, source: Arc<dyn RandomSource>) -> Self {
        self.source = source;
        self
    }

    /// The alphabet identifiers are drawn from.
    pub fn alphabet(&self) -> &str {
        // Validated as ASCII at construction.
        std::str::from_utf8(&self.alphabet).unwrap_or_default()
    }

    /// The bit mask applied to each random byte.
    pub fn mask(&self) -> u8 {
        self.mask
    }

    /// Generate an identifier of `length` characters.
    ///
    /// `None` or zero selects [`DEFAULT_ID_LENGTH`].
    pub fn generate(&self, length: Option<usize>) -> Result<String> {
        let size = match length {
            Some(n) if n > 0 => n,
            _ => DEFAULT_ID_LENGTH,
        };

        let alphabet_len = self.alphabet.len();
        let step = batch_size(self.mask, size, alphabet_len);

        let mut id = Vec::with_capacity(size);
        let mut buffer = vec![0u8; step];

        while id.len() < size {
            self.source.fill_bytes(&mut buffer)?;

            for byte in &buffer {
                let index = (byte & self.mask) as usize;
                if index < alphabet_len {
                    id.push(self.alphabet[index]);
                    if id.len() == size {
                        break;
                    }
                }
            }
        }

        Ok(String::from_utf8(id).unwrap_or_default())
    }
}

/// Smallest `2^k - 1` that is at least `alphabet_len - 1`.
fn mask_for(alphabet_len: usize) -> u8 {
    let highest_index = alphabet_len.saturating_sub(1);
    let mut mask: usize = 1;
    while mask < highest_index {
        mask = (mask << 1) | 1;
    }
    mask.min(u8::MAX as usize) as u8
}

/// Random bytes to request per batch: `ceil(1.6 * mask * size / alphabet_len)`.
///
/// Sized so one batch usually yields the whole identifier despite rejections.
fn batch_size(mask: u8, size: usize, alphabet_len: usize) -> usize {
    let step = (1.6 * mask as f64 * size as f64 / alphabet_len as f64).ceil() as usize;
    step.max(1)
}
