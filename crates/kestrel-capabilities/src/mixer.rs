//! Multi-stream mixer.
//!
//! Sums up to [`MAX_STREAMS`] 16-bit inputs into one output. Input 0 is
//! mandatory; inputs 1 and 2 join the mix while they are bound. Each stream has
//! its own gain, expressed in 1/60 dB steps on the wire (`0` is unity,
//! `-360` is -6 dB) and applied in floating point before the sum saturates
//! back to 16 bits.
//!
//! Per call the mixer moves as many whole samples as every bound input has
//! waiting and the output can take, capped at one block.
//!
//! # Configuration
//!
//! | Word | Meaning                                       |
//! |------|-----------------------------------------------|
//! | 0    | block format (see [`crate::format`])          |
//! | 1..=3| initial gain for stream 0..=2, 1/60 dB, `i16` |
//!
//! # Messages
//!
//! - [`SET_STREAM_GAINS`]: payload of one to three `i16 LE` gains, applied
//!   from stream 0 upward
//! - [`GET_STREAM_GAINS`]: replies with three `i16 LE` gains

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, vec, vec::Vec};

use kestrel_core::{
    Capability, CapabilityDescriptor, CapabilityError, CapabilityId, EndpointLayout, ProcessIo,
    ProcessOutcome, SampleSize,
};

use crate::format::{BlockFormat, DEFAULT_FORMAT_WORD, saturate_i16};

/// Class id of the mixer.
pub const MIXER_ID: CapabilityId = CapabilityId(0x000A);

/// Number of input streams.
pub const MAX_STREAMS: usize = 3;

/// Sets per-stream gains.
pub const SET_STREAM_GAINS: u16 = 0x0001;

/// Reads back per-stream gains.
pub const GET_STREAM_GAINS: u16 = 0x0002;

/// Gains at or below this value (-96 dB) mute the stream.
pub const MUTE_DB60: i16 = -5760;

/// Gains above this value (+24 dB) are rejected.
pub const MAX_DB60: i16 = 1440;

/// Registry entry for the mixer.
pub const DESCRIPTOR: CapabilityDescriptor = CapabilityDescriptor {
    id: MIXER_ID,
    name: "mixer",
    description: "Sums up to three 16-bit streams with per-stream gain",
    version: (1, 2),
    layout: EndpointLayout {
        inputs: MAX_STREAMS,
        outputs: 1,
        mandatory_inputs: 1,
        mandatory_outputs: 1,
    },
    sample_size: SampleSize::Bits16,
    buffer_size_hint: 512,
    default_config: &[DEFAULT_FORMAT_WORD],
    create: Mixer::create,
};

/// Converts a gain in 1/60 dB steps to a linear factor.
pub fn db60_to_linear(db60: i16) -> f32 {
    if db60 <= MUTE_DB60 {
        0.0
    } else {
        libm::powf(10.0, f32::from(db60) / (60.0 * 20.0))
    }
}

/// Mixer state.
#[derive(Debug)]
pub struct Mixer {
    format: BlockFormat,
    gains_db60: [i16; MAX_STREAMS],
    gains: [f32; MAX_STREAMS],
    scratch: Vec<f32>,
}

impl Mixer {
    /// Builds a mixer from configuration words.
    pub fn new(config: &[u32]) -> Result<Self, CapabilityError> {
        let format = BlockFormat::from_config(config)?.require_16bit()?;
        let mut mixer = Self {
            format,
            gains_db60: [0; MAX_STREAMS],
            gains: [1.0; MAX_STREAMS],
            scratch: vec![0.0; format.block_samples],
        };
        for (stream, word) in config.iter().skip(1).enumerate() {
            if stream >= MAX_STREAMS {
                return Err(CapabilityError::config("mixer takes at most three gain words"));
            }
            mixer.set_gain(stream, *word as u16 as i16)?;
        }
        Ok(mixer)
    }

    fn create(config: &[u32]) -> Result<Box<dyn Capability>, CapabilityError> {
        Ok(Box::new(Self::new(config)?))
    }

    /// Current gain of `stream` in 1/60 dB.
    pub fn gain_db60(&self, stream: usize) -> Option<i16> {
        self.gains_db60.get(stream).copied()
    }

    /// Sets the gain of `stream`.
    pub fn set_gain(&mut self, stream: usize, db60: i16) -> Result<(), CapabilityError> {
        if stream >= MAX_STREAMS {
            return Err(CapabilityError::config("stream index out of range"));
        }
        if db60 > MAX_DB60 {
            return Err(CapabilityError::config("gain above +24 dB"));
        }
        self.gains_db60[stream] = db60;
        self.gains[stream] = db60_to_linear(db60);
        Ok(())
    }

    /// Block format in use.
    pub fn format(&self) -> BlockFormat {
        self.format
    }
}

impl Capability for Mixer {
    fn process(&mut self, io: &mut ProcessIo<'_>) -> Result<ProcessOutcome, CapabilityError> {
        let (mut inputs, mut outputs) = io.split();

        let mut available = usize::MAX;
        let mut bound = 0;
        for stream in 0..inputs.len() {
            if inputs.is_bound(stream) {
                available = available.min(inputs.available(stream));
                bound += 1;
            }
        }
        if bound == 0 {
            available = 0;
        }
        let space = outputs.space(0);

        let bytes = self.format.clamp_bytes(available.min(space));
        if bytes == 0 {
            return Err(if self.format.clamp_bytes(available) == 0 {
                self.format.no_data(available)
            } else {
                self.format.no_space(space)
            });
        }
        let samples = bytes / 2;
        let mix = &mut self.scratch[..samples];
        mix.fill(0.0);

        let mut consumed = 0;
        for stream in 0..inputs.len() {
            let Some(mut port) = inputs.port(stream) else {
                continue;
            };
            let gain = self.gains[stream];
            let mut window = port.read_reserve(bytes)?;
            for (i, acc) in mix.iter_mut().enumerate() {
                *acc += f32::from(window.get_i16(i)) * gain;
            }
            window.commit(bytes)?;
            consumed += bytes;
        }

        let mut port = outputs
            .port(0)
            .ok_or_else(|| CapabilityError::fault("mixer output unbound"))?;
        let mut window = port.write_reserve(bytes)?;
        for (i, acc) in mix.iter().enumerate() {
            window.put_i16(i, saturate_i16(*acc));
        }
        window.commit(bytes)?;

        Ok(ProcessOutcome::new(consumed, bytes))
    }

    fn handle_message(&mut self, id: u16, payload: &[u8]) -> Result<Vec<u8>, CapabilityError> {
        match id {
            SET_STREAM_GAINS => {
                if payload.is_empty() || payload.len() % 2 != 0 || payload.len() > 2 * MAX_STREAMS {
                    return Err(CapabilityError::config(
                        "gain payload must hold one to three i16 values",
                    ));
                }
                let gains: Vec<i16> = payload
                    .chunks_exact(2)
                    .map(|raw| i16::from_le_bytes([raw[0], raw[1]]))
                    .collect();
                if gains.iter().any(|&g| g > MAX_DB60) {
                    return Err(CapabilityError::config("gain above +24 dB"));
                }
                for (stream, db60) in gains.into_iter().enumerate() {
                    self.set_gain(stream, db60)?;
                }
                Ok(Vec::new())
            }
            GET_STREAM_GAINS => Ok(self
                .gains_db60
                .iter()
                .flat_map(|g| g.to_le_bytes())
                .collect()),
            other => Err(CapabilityError::UnsupportedMessage(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::{Buffer, HeapRegion};

    fn buffer(bytes: usize) -> Option<Buffer> {
        Some(Buffer::new(Box::new(HeapRegion::new(bytes)), SampleSize::Bits16))
    }

    fn fill(buffer: &mut Option<Buffer>, samples: &[i16]) {
        let raw: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        buffer.as_mut().unwrap().write(&raw).unwrap();
    }

    fn drain(buffer: &mut Option<Buffer>) -> Vec<i16> {
        let buffer = buffer.as_mut().unwrap();
        let mut raw = vec![0u8; buffer.occupied()];
        buffer.read(&mut raw).unwrap();
        raw.chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect()
    }

    #[test]
    fn test_default_config_is_128_by_16bit() {
        let mixer = Mixer::new(DESCRIPTOR.default_config).unwrap();
        assert_eq!(mixer.format().block_samples, 128);
        assert_eq!(mixer.format().sample_size, SampleSize::Bits16);
    }

    #[test]
    fn test_rejects_8bit_width() {
        assert!(matches!(
            Mixer::new(&[0x1080]),
            Err(CapabilityError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_single_stream_passes_through_at_unity() {
        let mut mixer = Mixer::new(&[DEFAULT_FORMAT_WORD]).unwrap();
        let mut inputs = vec![buffer(256), None, None];
        let mut outputs = vec![buffer(256)];
        let samples: Vec<i16> = (0..32).map(|i| i * 100 - 1600).collect();
        fill(&mut inputs[0], &samples);

        let outcome = mixer
            .process(&mut ProcessIo::new(&mut inputs, &mut outputs))
            .unwrap();
        assert_eq!(outcome, ProcessOutcome::new(64, 64));
        assert_eq!(drain(&mut outputs[0]), samples);
        assert!(inputs[0].as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_sums_and_saturates() {
        let mut mixer = Mixer::new(&[DEFAULT_FORMAT_WORD]).unwrap();
        let mut inputs = vec![buffer(64), buffer(64), buffer(64)];
        let mut outputs = vec![buffer(64)];
        fill(&mut inputs[0], &[100, 30000, -30000]);
        fill(&mut inputs[1], &[20, 10000, -10000]);
        fill(&mut inputs[2], &[3, 1, -1]);

        let outcome = mixer
            .process(&mut ProcessIo::new(&mut inputs, &mut outputs))
            .unwrap();
        assert_eq!(outcome, ProcessOutcome::new(18, 6));
        assert_eq!(drain(&mut outputs[0]), vec![123, i16::MAX, i16::MIN]);
    }

    #[test]
    fn test_moves_only_what_every_input_has() {
        let mut mixer = Mixer::new(&[DEFAULT_FORMAT_WORD]).unwrap();
        let mut inputs = vec![buffer(64), buffer(64), None];
        let mut outputs = vec![buffer(64)];
        fill(&mut inputs[0], &[1, 2, 3, 4]);
        fill(&mut inputs[1], &[10]);

        mixer
            .process(&mut ProcessIo::new(&mut inputs, &mut outputs))
            .unwrap();
        assert_eq!(drain(&mut outputs[0]), vec![11]);
        assert_eq!(inputs[0].as_ref().unwrap().occupied(), 6);
    }

    #[test]
    fn test_block_caps_each_call() {
        let mut mixer = Mixer::new(&[0x2004]).unwrap();
        let mut inputs = vec![buffer(64), None, None];
        let mut outputs = vec![buffer(64)];
        fill(&mut inputs[0], &[0; 10]);

        let outcome = mixer
            .process(&mut ProcessIo::new(&mut inputs, &mut outputs))
            .unwrap();
        assert_eq!(outcome.produced, 8);
        assert_eq!(inputs[0].as_ref().unwrap().occupied(), 12);
    }

    #[test]
    fn test_empty_input_is_a_shortfall() {
        let mut mixer = Mixer::new(&[DEFAULT_FORMAT_WORD]).unwrap();
        let mut inputs = vec![buffer(64), None, None];
        let mut outputs = vec![buffer(64)];
        match mixer.process(&mut ProcessIo::new(&mut inputs, &mut outputs)) {
            Err(CapabilityError::Buffer(e)) => assert!(e.is_shortfall()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_full_output_is_a_shortfall() {
        let mut mixer = Mixer::new(&[DEFAULT_FORMAT_WORD]).unwrap();
        let mut inputs = vec![buffer(64), None, None];
        let mut outputs = vec![buffer(4)];
        fill(&mut inputs[0], &[1, 2]);
        fill(&mut outputs[0], &[9, 9]);
        match mixer.process(&mut ProcessIo::new(&mut inputs, &mut outputs)) {
            Err(CapabilityError::Buffer(kestrel_core::BufferError::InsufficientSpace {
                ..
            })) => {}
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(inputs[0].as_ref().unwrap().occupied(), 4);
    }

    #[test]
    fn test_gain_message_round_trip() {
        let mut mixer = Mixer::new(&[DEFAULT_FORMAT_WORD]).unwrap();
        let payload: Vec<u8> = [-360i16, 0, MUTE_DB60]
            .iter()
            .flat_map(|g| g.to_le_bytes())
            .collect();
        assert!(mixer.handle_message(SET_STREAM_GAINS, &payload).unwrap().is_empty());
        assert_eq!(
            mixer.handle_message(GET_STREAM_GAINS, &[]).unwrap(),
            payload
        );
        assert_eq!(mixer.gain_db60(0), Some(-360));
    }

    #[test]
    fn test_gain_is_applied() {
        let mut mixer = Mixer::new(&[DEFAULT_FORMAT_WORD, (-360i16) as u16 as u32]).unwrap();
        let mut inputs = vec![buffer(64), buffer(64), None];
        let mut outputs = vec![buffer(64)];
        mixer.set_gain(1, MUTE_DB60).unwrap();
        fill(&mut inputs[0], &[10000]);
        fill(&mut inputs[1], &[10000]);

        mixer
            .process(&mut ProcessIo::new(&mut inputs, &mut outputs))
            .unwrap();
        let out = drain(&mut outputs[0])[0];
        // -6 dB is a factor of about 0.501
        assert!((5000..=5020).contains(&out), "got {out}");
    }

    #[test]
    fn test_bad_messages() {
        let mut mixer = Mixer::new(&[DEFAULT_FORMAT_WORD]).unwrap();
        assert!(mixer.handle_message(SET_STREAM_GAINS, &[1]).is_err());
        assert!(mixer.handle_message(SET_STREAM_GAINS, &[0; 8]).is_err());
        assert!(
            mixer
                .handle_message(SET_STREAM_GAINS, &2000i16.to_le_bytes())
                .is_err()
        );
        assert_eq!(
            mixer.handle_message(0x0042, &[]),
            Err(CapabilityError::UnsupportedMessage(0x0042))
        );
    }

    #[test]
    fn test_rejected_gain_batch_changes_nothing() {
        let mut mixer = Mixer::new(&[DEFAULT_FORMAT_WORD]).unwrap();
        let before = mixer.handle_message(GET_STREAM_GAINS, &[]).unwrap();
        let payload: Vec<u8> = [-600i16, 2000, -120]
            .iter()
            .flat_map(|g| g.to_le_bytes())
            .collect();
        assert!(mixer.handle_message(SET_STREAM_GAINS, &payload).is_err());
        assert_eq!(mixer.handle_message(GET_STREAM_GAINS, &[]).unwrap(), before);
    }

    #[test]
    fn test_db60_conversion() {
        assert_eq!(db60_to_linear(0), 1.0);
        assert_eq!(db60_to_linear(MUTE_DB60), 0.0);
        assert!((db60_to_linear(1200) - 10.0).abs() < 1e-4);
    }
}
