//! Peak meter sink.
//!
//! Consumes a 16-bit stream and keeps the largest magnitude seen plus a
//! sample count. An optional clip threshold turns an over-range sample into a
//! processing fault, which the graph isolates like any other operator fault.
//!
//! # Configuration
//!
//! | Word | Meaning                                       |
//! |------|-----------------------------------------------|
//! | 0    | block format (see [`crate::format`])          |
//! | 1    | clip threshold in sample magnitude, `0` = off |
//!
//! # Messages
//!
//! - [`GET_LEVELS`]: replies `[peak: u16 LE, samples: u64 LE]`
//! - [`RESET_LEVELS`]: clears both

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, format, vec::Vec};

use kestrel_core::{
    Capability, CapabilityDescriptor, CapabilityError, CapabilityId, EndpointLayout, ProcessIo,
    ProcessOutcome, SampleSize,
};

use crate::format::{BlockFormat, DEFAULT_FORMAT_WORD};

/// Class id of the peak meter.
pub const PEAK_METER_ID: CapabilityId = CapabilityId(0x0101);

/// Reads the current levels.
pub const GET_LEVELS: u16 = 0x0001;

/// Clears the current levels.
pub const RESET_LEVELS: u16 = 0x0002;

/// Registry entry for the peak meter.
pub const DESCRIPTOR: CapabilityDescriptor = CapabilityDescriptor {
    id: PEAK_METER_ID,
    name: "peak_meter",
    description: "Tracks the peak magnitude of a 16-bit stream",
    version: (1, 0),
    layout: EndpointLayout::fixed(1, 0),
    sample_size: SampleSize::Bits16,
    buffer_size_hint: 512,
    default_config: &[DEFAULT_FORMAT_WORD, 0],
    create: PeakMeter::create,
};

/// Meter state.
#[derive(Debug)]
pub struct PeakMeter {
    format: BlockFormat,
    clip_threshold: u16,
    peak: u16,
    samples: u64,
}

impl PeakMeter {
    /// Builds a meter from configuration words.
    pub fn new(config: &[u32]) -> Result<Self, CapabilityError> {
        let format = BlockFormat::from_config(config)?.require_16bit()?;
        let threshold = config.get(1).copied().unwrap_or(0);
        let clip_threshold = u16::try_from(threshold)
            .map_err(|_| CapabilityError::config("clip threshold above 65535"))?;
        Ok(Self {
            format,
            clip_threshold,
            peak: 0,
            samples: 0,
        })
    }

    fn create(config: &[u32]) -> Result<Box<dyn Capability>, CapabilityError> {
        Ok(Box::new(Self::new(config)?))
    }

    /// Largest magnitude seen since the last reset.
    pub fn peak(&self) -> u16 {
        self.peak
    }

    /// Samples consumed since the last reset.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    fn clear(&mut self) {
        self.peak = 0;
        self.samples = 0;
    }
}

impl Capability for PeakMeter {
    fn process(&mut self, io: &mut ProcessIo<'_>) -> Result<ProcessOutcome, CapabilityError> {
        let format = self.format;
        let mut input = io
            .input(0)
            .ok_or_else(|| CapabilityError::fault("meter input unbound"))?;
        let available = input.available();
        let bytes = format.clamp_bytes(available);
        if bytes == 0 {
            return Err(format.no_data(available));
        }

        let mut window = input.read_reserve(bytes)?;
        let mut peak = self.peak;
        for i in 0..bytes / 2 {
            let magnitude = window.get_i16(i).unsigned_abs();
            if self.clip_threshold != 0 && magnitude >= self.clip_threshold {
                return Err(CapabilityError::fault(format!(
                    "sample magnitude {magnitude} reached clip threshold {}",
                    self.clip_threshold
                )));
            }
            peak = peak.max(magnitude);
        }
        window.commit(bytes)?;
        self.peak = peak;
        self.samples += (bytes / 2) as u64;
        Ok(ProcessOutcome::new(bytes, 0))
    }

    fn reset(&mut self) {
        self.clear();
    }

    fn handle_message(&mut self, id: u16, _payload: &[u8]) -> Result<Vec<u8>, CapabilityError> {
        match id {
            GET_LEVELS => {
                let mut reply = Vec::with_capacity(10);
                reply.extend_from_slice(&self.peak.to_le_bytes());
                reply.extend_from_slice(&self.samples.to_le_bytes());
                Ok(reply)
            }
            RESET_LEVELS => {
                self.clear();
                Ok(Vec::new())
            }
            other => Err(CapabilityError::UnsupportedMessage(other)),
        }
    }
}
