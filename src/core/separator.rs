use crate::{
    error::{IsolationError, Result},
    types::{AudioBuffer, IsolationOutcome, SeparationResult},
};

/// Stem every separator must be able to produce.
pub const VOCALS: &str = "vocals";

/// Position of the vocals stem in the htdemucs source order
/// (drums, bass, other, vocals), used when a model reports no names.
pub const HTDEMUCS_VOCALS_INDEX: usize = 3;

/// A source-separation backend. Receives two-channel audio at
/// [`Separator::sample_rate`] and returns one buffer per stem.
pub trait Separator: Send + Sync {
    fn stem_names(&self) -> &[String];

    fn sample_rate(&self) -> u32;

    fn separate(&self, input: &AudioBuffer) -> Result<SeparationResult>;
}

/// Split a separation result into vocals and the sum of every other stem.
pub fn mix_down(
    result: SeparationResult,
    input: &AudioBuffer,
    vocals_stem: &str,
) -> Result<IsolationOutcome> {
    if result.stems.len() < 2 {
        return Err(IsolationError::Inference(format!(
            "model returned {} stem(s), need at least 2",
            result.stems.len()
        )));
    }

    let shape = input.samples.dim();
    if let Some(bad) = result.stems.iter().find(|s| s.audio.samples.dim() != shape) {
        return Err(IsolationError::Inference(format!(
            "stem `{}` has shape {:?}, expected {:?}",
            bad.name,
            bad.audio.samples.dim(),
            shape
        )));
    }

    let vocals_idx = match result.position(vocals_stem) {
        Some(i) => i,
        None if result.stems.iter().all(|s| s.name.is_empty()) => {
            HTDEMUCS_VOCALS_INDEX.min(result.stems.len() - 1)
        }
        None => {
            return Err(IsolationError::Inference(format!(
                "model has no `{vocals_stem}` stem"
            )))
        }
    };

    let sample_rate = input.sample_rate;
    let mut accompaniment = ndarray::Array2::<f32>::zeros(shape);
    let mut vocals = None;
    for (i, stem) in result.stems.into_iter().enumerate() {
        if i == vocals_idx {
            vocals = Some(stem.audio.samples);
        } else {
            accompaniment += &stem.audio.samples;
        }
    }
    let vocals = vocals.ok_or_else(|| IsolationError::Inference("vocals stem vanished".into()))?;

    Ok(IsolationOutcome {
        vocals: AudioBuffer::new(vocals, sample_rate),
        accompaniment: AudioBuffer::new(accompaniment, sample_rate),
        sample_rate,
    })
}
