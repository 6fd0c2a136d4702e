#![allow(dead_code)]

use std::io::Cursor;

use ndarray::Array2;
use voice_isolation::{AudioBuffer, Result, SeparationResult, Separator, Stem};

/// Splits the input into fixed fractions so the stems always add back up
/// to the mixture.
pub struct StubSeparator {
    names: Vec<String>,
}

pub const FRACTIONS: [(&str, f32); 4] = [
    ("drums", 0.25),
    ("bass", 0.125),
    ("other", 0.125),
    ("vocals", 0.5),
];

impl Default for StubSeparator {
    fn default() -> Self {
        Self {
            names: FRACTIONS.iter().map(|(n, _)| n.to_string()).collect(),
        }
    }
}

impl Separator for StubSeparator {
    fn stem_names(&self) -> &[String] {
        &self.names
    }

    fn sample_rate(&self) -> u32 {
        44_100
    }

    fn separate(&self, input: &AudioBuffer) -> Result<SeparationResult> {
        let stems = FRACTIONS
            .iter()
            .map(|(name, f)| Stem {
                name: name.to_string(),
                audio: AudioBuffer::new(&input.samples * *f, input.sample_rate),
            })
            .collect();
        Ok(SeparationResult { stems })
    }
}

pub fn sine(channels: usize, frames: usize, sample_rate: u32, freq: f32) -> AudioBuffer {
    let samples = Array2::from_shape_fn((channels, frames), |(c, i)| {
        let t = i as f32 / sample_rate as f32;
        (2.0 * std::f32::consts::PI * freq * t + c as f32 * 0.3).sin() * 0.5
    });
    AudioBuffer::new(samples, sample_rate)
}

pub fn wav_frames(bytes: &[u8]) -> (u16, u32, u32) {
    let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
    let spec = reader.spec();
    (spec.channels, spec.sample_rate, reader.duration())
}
