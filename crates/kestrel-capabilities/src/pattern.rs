//! Test-pattern source.
//!
//! Generates a 16-bit sawtooth with no inputs at all, which makes it the usual
//! head of a demo or soak-test graph. The phase carries across calls so the
//! waveform is continuous regardless of how the output space is sliced.
//!
//! # Configuration
//!
//! | Word | Meaning                                  |
//! |------|------------------------------------------|
//! | 0    | block format (see [`crate::format`])     |
//! | 1    | period in samples, default 64            |
//! | 2    | peak amplitude, default `0x2000`         |

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, vec::Vec};

use kestrel_core::{
    Capability, CapabilityDescriptor, CapabilityError, CapabilityId, EndpointLayout, ProcessIo,
    ProcessOutcome, SampleSize,
};

use crate::format::{BlockFormat, DEFAULT_FORMAT_WORD};

/// Class id of the pattern source.
pub const PATTERN_ID: CapabilityId = CapabilityId(0x0100);

/// Payload: new amplitude, `i16 LE`, non-negative.
pub const SET_AMPLITUDE: u16 = 0x0001;

/// Registry entry for the pattern source.
pub const DESCRIPTOR: CapabilityDescriptor = CapabilityDescriptor {
    id: PATTERN_ID,
    name: "pattern",
    description: "Sawtooth test-pattern source",
    version: (1, 0),
    layout: EndpointLayout::fixed(0, 1),
    sample_size: SampleSize::Bits16,
    buffer_size_hint: 512,
    default_config: &[DEFAULT_FORMAT_WORD, 64, 0x2000],
    create: PatternSource::create,
};

/// Sawtooth generator state.
#[derive(Debug)]
pub struct PatternSource {
    format: BlockFormat,
    period: u32,
    amplitude: i16,
    phase: u32,
}

impl PatternSource {
    /// Builds a source from configuration words.
    pub fn new(config: &[u32]) -> Result<Self, CapabilityError> {
        let format = BlockFormat::from_config(config)?.require_16bit()?;
        let period = config.get(1).copied().unwrap_or(64);
        if period < 2 {
            return Err(CapabilityError::config("pattern period must be at least 2"));
        }
        let amplitude = config.get(2).copied().unwrap_or(0x2000);
        let amplitude = i16::try_from(amplitude)
            .map_err(|_| CapabilityError::config("pattern amplitude above 32767"))?;
        Ok(Self {
            format,
            period,
            amplitude,
            phase: 0,
        })
    }

    fn create(config: &[u32]) -> Result<Box<dyn Capability>, CapabilityError> {
        Ok(Box::new(Self::new(config)?))
    }

    /// Next sample; ramps from `-amplitude` toward `+amplitude` once per period.
    fn next_sample(&mut self) -> i16 {
        let amp = i64::from(self.amplitude);
        let value = 2 * amp * i64::from(self.phase) / i64::from(self.period) - amp;
        self.phase = (self.phase + 1) % self.period;
        value as i16
    }
}

impl Capability for PatternSource {
    fn process(&mut self, io: &mut ProcessIo<'_>) -> Result<ProcessOutcome, CapabilityError> {
        let format = self.format;
        let mut output = io
            .output(0)
            .ok_or_else(|| CapabilityError::fault("pattern output unbound"))?;
        let space = output.space();
        let bytes = format.clamp_bytes(space);
        if bytes == 0 {
            return Err(format.no_space(space));
        }
        let mut window = output.write_reserve(bytes)?;
        for i in 0..bytes / 2 {
            window.put_i16(i, self.next_sample());
        }
        window.commit(bytes)?;
        Ok(ProcessOutcome::new(0, bytes))
    }

    fn reset(&mut self) {
        self.phase = 0;
    }

    fn handle_message(&mut self, id: u16, payload: &[u8]) -> Result<Vec<u8>, CapabilityError> {
        match (id, payload) {
            (SET_AMPLITUDE, [lo, hi]) => {
                let amplitude = i16::from_le_bytes([*lo, *hi]);
                if amplitude < 0 {
                    return Err(CapabilityError::config("amplitude must be non-negative"));
                }
                self.amplitude = amplitude;
                Ok(Vec::new())
            }
            (SET_AMPLITUDE, _) => Err(CapabilityError::config("amplitude payload must be two bytes")),
            (other, _) => Err(CapabilityError::UnsupportedMessage(other)),
        }
    }
}
