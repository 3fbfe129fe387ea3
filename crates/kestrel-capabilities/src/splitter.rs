//! One input fanned out to two outputs.
//!
//! Output 1 is optional. Each call copies the same samples to every bound
//! output, so the amount moved is limited by the fullest output.

#[cfg(not(feature = "std"))]
use alloc::boxed::Box;

use kestrel_core::{
    Capability, CapabilityDescriptor, CapabilityError, CapabilityId, EndpointLayout, ProcessIo,
    ProcessOutcome, SampleSize,
};

use crate::format::{BlockFormat, DEFAULT_FORMAT_WORD};

/// Class id of the splitter.
pub const SPLITTER_ID: CapabilityId = CapabilityId(0x0013);

/// Number of output endpoints.
pub const OUTPUTS: usize = 2;

/// Registry entry for the splitter.
pub const DESCRIPTOR: CapabilityDescriptor = CapabilityDescriptor {
    id: SPLITTER_ID,
    name: "splitter",
    description: "Duplicates one 16-bit stream onto two outputs",
    version: (1, 0),
    layout: EndpointLayout {
        inputs: 1,
        outputs: OUTPUTS,
        mandatory_inputs: 1,
        mandatory_outputs: 1,
    },
    sample_size: SampleSize::Bits16,
    buffer_size_hint: 512,
    default_config: &[DEFAULT_FORMAT_WORD],
    create: Splitter::create,
};

/// Splitter state.
#[derive(Debug)]
pub struct Splitter {
    format: BlockFormat,
}

impl Splitter {
    /// Builds a splitter from configuration words.
    pub fn new(config: &[u32]) -> Result<Self, CapabilityError> {
        Ok(Self {
            format: BlockFormat::from_config(config)?.require_16bit()?,
        })
    }

    fn create(config: &[u32]) -> Result<Box<dyn Capability>, CapabilityError> {
        Ok(Box::new(Self::new(config)?))
    }
}

impl Capability for Splitter {
    fn process(&mut self, io: &mut ProcessIo<'_>) -> Result<ProcessOutcome, CapabilityError> {
        let (mut inputs, mut outputs) = io.split();
        let available = inputs.available(0);
        let space = (0..outputs.len())
            .filter(|&i| outputs.is_bound(i))
            .map(|i| outputs.space(i))
            .min()
            .unwrap_or(0);
        let bytes = self.format.clamp_bytes(available.min(space));
        if bytes == 0 {
            return Err(if self.format.clamp_bytes(available) == 0 {
                self.format.no_data(available)
            } else {
                self.format.no_space(space)
            });
        }

        let mut input = inputs
            .port(0)
            .ok_or_else(|| CapabilityError::fault("splitter input unbound"))?;
        let mut reader = input.read_reserve(bytes)?;
        let mut produced = 0;
        for index in 0..outputs.len() {
            let Some(mut output) = outputs.port(index) else {
                continue;
            };
            let mut writer = output.write_reserve(bytes)?;
            writer.copy_from_window(&mut reader, bytes);
            writer.commit(bytes)?;
            produced += bytes;
        }
        reader.commit(bytes)?;
        Ok(ProcessOutcome::new(bytes, produced))
    }
}
