//! Block format word shared by the streaming capabilities.
//!
//! Config word 0 packs the per-call block size and the sample width:
//!
//! | Bits   | Meaning                          |
//! |--------|----------------------------------|
//! | 0..=11 | samples per `process` call (1..) |
//! | 12..=15| bytes per sample (1, 2 or 4)     |
//!
//! `0x0000_2080` therefore means 128 samples of 16 bits.

use kestrel_core::{BufferError, CapabilityError, SampleSize};

/// Default format word: 128 samples of 16-bit audio.
pub const DEFAULT_FORMAT_WORD: u32 = 0x0000_2080;

/// Decoded format word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockFormat {
    /// Maximum samples moved per `process` call.
    pub block_samples: usize,
    /// Width of one sample.
    pub sample_size: SampleSize,
}

impl BlockFormat {
    /// Decodes `word`, requiring a non-zero block and a supported width.
    pub fn from_word(word: u32) -> Result<Self, CapabilityError> {
        let block_samples = (word & 0x0FFF) as usize;
        let width = ((word >> 12) & 0xF) as usize;
        if block_samples == 0 {
            return Err(CapabilityError::config("block size must be non-zero"));
        }
        let sample_size = SampleSize::from_bytes(width)
            .ok_or_else(|| CapabilityError::config("unsupported sample width"))?;
        Ok(Self {
            block_samples,
            sample_size,
        })
    }

    /// Decodes config word 0, falling back to the default word when the
    /// configuration is empty.
    pub fn from_config(config: &[u32]) -> Result<Self, CapabilityError> {
        Self::from_word(config.first().copied().unwrap_or(DEFAULT_FORMAT_WORD))
    }

    /// Requires 16-bit samples.
    pub fn require_16bit(self) -> Result<Self, CapabilityError> {
        if self.sample_size == SampleSize::Bits16 {
            Ok(self)
        } else {
            Err(CapabilityError::config("only 16-bit samples are supported"))
        }
    }

    /// Block size in bytes.
    pub fn block_bytes(self) -> usize {
        self.block_samples * self.sample_size.bytes()
    }

    /// Largest whole-sample byte count not above `limit` or one block.
    pub fn clamp_bytes(self, limit: usize) -> usize {
        let bytes = limit.min(self.block_bytes());
        bytes - bytes % self.sample_size.bytes()
    }

    /// Shortfall reported when less than one sample is waiting.
    pub fn no_data(self, available: usize) -> CapabilityError {
        BufferError::InsufficientData {
            requested: self.sample_size.bytes(),
            available,
        }
        .into()
    }

    /// Shortfall reported when less than one sample fits downstream.
    pub fn no_space(self, available: usize) -> CapabilityError {
        BufferError::InsufficientSpace {
            requested: self.sample_size.bytes(),
            available,
        }
        .into()
    }
}

/// Saturating float to 16-bit sample conversion.
#[inline]
pub fn saturate_i16(value: f32) -> i16 {
    libm::roundf(value).clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}
