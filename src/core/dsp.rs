use ndarray::{s, Array2};
use num_complex::Complex32;
use once_cell::sync::Lazy;
use rubato::{FftFixedIn, Resampler};
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use std::sync::Arc;
use tracing::debug;

use crate::{
    error::{IsolationError, Result},
    types::AudioBuffer,
};

/// Channel count every model input is coerced to.
pub const MODEL_CHANNELS: usize = 2;

/// Default resampler input chunk, in frames.
pub const DEFAULT_RESAMPLE_CHUNK: usize = 1024;

struct FftCache {
    fft_forward: Arc<dyn Fft<f32>>,
    hann_window: Vec<f32>,
}

static FFT_CACHE_4096: Lazy<FftCache> = Lazy::new(|| FftCache::plan(4096));

impl FftCache {
    fn plan(n_fft: usize) -> Self {
        let mut planner = FftPlanner::new();
        FftCache {
            fft_forward: planner.plan_fft_forward(n_fft),
            hann_window: compute_hann(n_fft),
        }
    }
}

fn compute_hann(n_fft: usize) -> Vec<f32> {
    if n_fft <= 1 {
        return vec![1.0];
    }
    let denom = (n_fft - 1) as f32;
    (0..n_fft)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * (i as f32) / denom).cos())
        .collect()
}

/// Bring arbitrary input to the shape the model wants: exactly two channels
/// at `target_rate`.
///
/// Channels beyond the first two are dropped, not downmixed. Mono is
/// duplicated into both channels.
pub fn normalize(audio: AudioBuffer, target_rate: u32, resample_chunk: usize) -> Result<AudioBuffer> {
    if audio.num_channels() == 0 || audio.num_frames() == 0 {
        return Err(IsolationError::Decode("audio contains no samples".into()));
    }
    if audio.sample_rate == 0 {
        return Err(IsolationError::Decode("audio has a zero sample rate".into()));
    }
    if target_rate == 0 {
        return Err(IsolationError::Normalize("target sample rate must be positive".into()));
    }

    let audio = truncate_channels(audio, MODEL_CHANNELS);

    let audio = if audio.sample_rate != target_rate {
        debug!(from = audio.sample_rate, to = target_rate, "resampling");
        resample(&audio, target_rate, resample_chunk)?
    } else {
        audio
    };

    Ok(to_stereo(audio))
}

/// Keep the first `max` channels.
pub fn truncate_channels(audio: AudioBuffer, max: usize) -> AudioBuffer {
    if audio.num_channels() <= max {
        return audio;
    }
    debug!(
        channels = audio.num_channels(),
        kept = max,
        "dropping extra channels"
    );
    let samples = audio.samples.slice(s![..max, ..]).to_owned();
    AudioBuffer::new(samples, audio.sample_rate)
}

/// Duplicate a mono buffer into two identical channels; anything else passes
/// through untouched.
pub fn to_stereo(audio: AudioBuffer) -> AudioBuffer {
    if audio.num_channels() != 1 {
        return audio;
    }
    let mono = &audio.samples;
    let samples = Array2::from_shape_fn((MODEL_CHANNELS, audio.num_frames()), |(_, i)| mono[[0, i]]);
    AudioBuffer::new(samples, audio.sample_rate)
}

/// Band-limited FFT resampling. The output has `ceil(frames * to / from)`
/// frames and the resampler delay is trimmed so it lines up with the input.
pub fn resample(audio: &AudioBuffer, target_rate: u32, chunk_size: usize) -> Result<AudioBuffer> {
    let channels = audio.num_channels();
    let frames = audio.num_frames();
    let from = audio.sample_rate as u64;
    let to = target_rate as u64;
    let expected = ((frames as u64 * to + from - 1) / from) as usize;

    let mut resampler = FftFixedIn::<f32>::new(
        audio.sample_rate as usize,
        target_rate as usize,
        chunk_size.max(64),
        2,
        channels,
    )
    .map_err(|e| IsolationError::Normalize(e.to_string()))?;

    let input: Vec<Vec<f32>> = (0..channels).map(|c| audio.channel(c)).collect();
    let delay = resampler.output_delay();
    let mut out: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); channels];

    let append = |out: &mut Vec<Vec<f32>>, chunk: Vec<Vec<f32>>| {
        for (dst, src) in out.iter_mut().zip(chunk) {
            dst.extend_from_slice(&src);
        }
    };

    let mut pos = 0usize;
    loop {
        let need = resampler.input_frames_next();
        if pos + need > frames {
            break;
        }
        let block: Vec<&[f32]> = input.iter().map(|ch| &ch[pos..pos + need]).collect();
        let chunk = resampler
            .process(block.as_slice(), None)
            .map_err(|e| IsolationError::Normalize(e.to_string()))?;
        append(&mut out, chunk);
        pos += need;
    }

    if pos < frames {
        let tail: Vec<&[f32]> = input.iter().map(|ch| &ch[pos..]).collect();
        let chunk = resampler
            .process_partial(Some(tail.as_slice()), None)
            .map_err(|e| IsolationError::Normalize(e.to_string()))?;
        append(&mut out, chunk);
    }

    // Flush the filter until the delayed signal is fully out.
    while out[0].len() < delay + expected {
        let chunk = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| IsolationError::Normalize(e.to_string()))?;
        if chunk.first().map_or(true, |c| c.is_empty()) {
            break;
        }
        append(&mut out, chunk);
    }

    let samples = Array2::from_shape_fn((channels, expected), |(c, i)| {
        out[c].get(delay + i).copied().unwrap_or(0.0)
    });
    Ok(AudioBuffer::new(samples, target_rate))
}

/// Rising-then-falling weights used to overlap-add model windows.
pub fn triangular_window(len: usize) -> Vec<f32> {
    let half = len as f32 / 2.0;
    (0..len)
        .map(|i| {
            let x = i as f32 + 0.5;
            let w = if x <= half { x / half } else { (len as f32 - x) / half };
            w.max(1e-3)
        })
        .collect()
}

/// Compute complex-as-channels spectrogram for stereo with center padding.
/// Returns (buffer, F=2048, Frames=336) for T=343_980, n_fft=4096, hop=1024.
/// Layout is [1, 4, F, Frames] flattened => channels order: L.re, L.im, R.re, R.im.
pub fn stft_cac_stereo_centered(
    left: &[f32],
    right: &[f32],
    n_fft: usize,
    hop: usize,
) -> (Vec<f32>, usize, usize) {
    assert_eq!(left.len(), right.len());

    let t = left.len();
    let pad = n_fft / 2;

    let padded_len = pad + t + pad;
    let mut l_sig = vec![0.0f32; padded_len];
    let mut r_sig = vec![0.0f32; padded_len];

    l_sig[pad..pad + t].copy_from_slice(left);
    r_sig[pad..pad + t].copy_from_slice(right);

    let frames = 1 + (t / hop);
    let f_bins = n_fft / 2;

    let planned;
    let cache: &FftCache = if n_fft == 4096 {
        &*FFT_CACHE_4096
    } else {
        planned = FftCache::plan(n_fft);
        &planned
    };
    let fft = &cache.fft_forward;
    let window = &cache.hann_window;

    let mut out = vec![0.0f32; 4 * f_bins * frames];

    let mut buf_l = vec![Complex32::zero(); n_fft];
    let mut buf_r = vec![Complex32::zero(); n_fft];

    for fr in 0..frames {
        let start = fr * hop;
        let li = &l_sig[start..start + n_fft];
        let ri = &r_sig[start..start + n_fft];

        for i in 0..n_fft {
            let w = window[i];
            buf_l[i] = Complex32::new(li[i] * w, 0.0);
            buf_r[i] = Complex32::new(ri[i] * w, 0.0);
        }

        fft.process(&mut buf_l);
        fft.process(&mut buf_r);

        let plane = f_bins * frames;
        for fi in 0..f_bins {
            let base_fr = fi * frames + fr;
            out[base_fr] = buf_l[fi].re;
            out[plane + base_fr] = buf_l[fi].im;
            out[2 * plane + base_fr] = buf_r[fi].re;
            out[3 * plane + base_fr] = buf_r[fi].im;
        }
    }

    (out, f_bins, frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn triangular_window_peaks_in_the_middle() {
        let w = triangular_window(8);
        assert!(w[0] < w[3]);
        assert!(w[7] < w[4]);
        assert!(w.iter().all(|x| *x > 0.0 && *x <= 1.0));
    }

    #[test]
    fn to_stereo_leaves_stereo_alone() {
        let buf = AudioBuffer::new(array![[1.0f32, 2.0], [3.0, 4.0]], 44_100);
        assert_eq!(to_stereo(buf.clone()), buf);
    }

    #[test]
    fn zero_input_rate_is_a_decode_error() {
        let buf = AudioBuffer::new(array![[0.5f32, 0.5]], 0);
        let err = normalize(buf, 44_100, DEFAULT_RESAMPLE_CHUNK).unwrap_err();
        assert_eq!(err.kind(), "decode");
    }

    #[test]
    fn zero_target_rate_is_a_normalize_error() {
        let buf = AudioBuffer::new(array![[0.5f32, 0.5]], 44_100);
        let err = normalize(buf, 0, DEFAULT_RESAMPLE_CHUNK).unwrap_err();
        assert_eq!(err.kind(), "normalize");
    }
}
