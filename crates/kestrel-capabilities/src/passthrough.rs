//! Single input to single output copy.
//!
//! The data moves window to window, so a passthrough never touches a scratch
//! buffer. While muted it still consumes its input but writes silence.

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, vec::Vec};

use kestrel_core::{
    Capability, CapabilityDescriptor, CapabilityError, CapabilityId, EndpointLayout, ProcessIo,
    ProcessOutcome, SampleSize,
};

use crate::format::{BlockFormat, DEFAULT_FORMAT_WORD};

/// Class id of the passthrough.
pub const PASSTHROUGH_ID: CapabilityId = CapabilityId(0x0001);

/// Payload `[0]` unmutes, `[1]` mutes.
pub const SET_MUTE: u16 = 0x0001;

/// Registry entry for the passthrough.
pub const DESCRIPTOR: CapabilityDescriptor = CapabilityDescriptor {
    id: PASSTHROUGH_ID,
    name: "passthrough",
    description: "Copies one 16-bit stream unchanged",
    version: (1, 0),
    layout: EndpointLayout::fixed(1, 1),
    sample_size: SampleSize::Bits16,
    buffer_size_hint: 512,
    default_config: &[DEFAULT_FORMAT_WORD],
    create: Passthrough::create,
};

/// Passthrough state.
#[derive(Debug)]
pub struct Passthrough {
    format: BlockFormat,
    muted: bool,
}

impl Passthrough {
    /// Builds a passthrough from configuration words.
    pub fn new(config: &[u32]) -> Result<Self, CapabilityError> {
        Ok(Self {
            format: BlockFormat::from_config(config)?.require_16bit()?,
            muted: false,
        })
    }

    fn create(config: &[u32]) -> Result<Box<dyn Capability>, CapabilityError> {
        Ok(Box::new(Self::new(config)?))
    }

    /// Whether output is silenced.
    pub fn is_muted(&self) -> bool {
        self.muted
    }
}

impl Capability for Passthrough {
    fn process(&mut self, io: &mut ProcessIo<'_>) -> Result<ProcessOutcome, CapabilityError> {
        let (mut inputs, mut outputs) = io.split();
        let available = inputs.available(0);
        let space = outputs.space(0);
        let bytes = self.format.clamp_bytes(available.min(space));
        if bytes == 0 {
            return Err(if self.format.clamp_bytes(available) == 0 {
                self.format.no_data(available)
            } else {
                self.format.no_space(space)
            });
        }

        let (Some(mut input), Some(mut output)) = (inputs.port(0), outputs.port(0)) else {
            return Err(CapabilityError::fault("passthrough endpoint unbound"));
        };
        let mut reader = input.read_reserve(bytes)?;
        let mut writer = output.write_reserve(bytes)?;
        if self.muted {
            writer.fill(0);
        } else {
            writer.copy_from_window(&mut reader, bytes);
        }
        writer.commit(bytes)?;
        reader.commit(bytes)?;
        Ok(ProcessOutcome::new(bytes, bytes))
    }

    fn reset(&mut self) {
        self.muted = false;
    }

    fn handle_message(&mut self, id: u16, payload: &[u8]) -> Result<Vec<u8>, CapabilityError> {
        match (id, payload) {
            (SET_MUTE, [flag]) if *flag <= 1 => {
                self.muted = *flag == 1;
                Ok(Vec::new())
            }
            (SET_MUTE, _) => Err(CapabilityError::config("mute payload must be one byte, 0 or 1")),
            (other, _) => Err(CapabilityError::UnsupportedMessage(other)),
        }
    }
}
