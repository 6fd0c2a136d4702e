use crate::{
    core::{
        dsp::{stft_cac_stereo_centered, triangular_window, MODEL_CHANNELS},
        separator::Separator,
    },
    error::{IsolationError, Result},
    model::model_manager::ModelHandle,
    types::{AudioBuffer, ModelManifest, SeparationResult, Stem},
};

use anyhow::anyhow;
use ndarray::{s, Array3, Axis};
use ort::{
    execution_providers::{CPUExecutionProvider, CUDAExecutionProvider},
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Mutex};
use tracing::{debug, info};

const DEMUCS_T: usize = 343_980;
const DEMUCS_F: usize = 2048;
const DEMUCS_FRAMES: usize = 336;
const DEMUCS_NFFT: usize = 4096;
const DEMUCS_HOP: usize = 1024;

const INPUT_TIME: &str = "input";
const INPUT_SPEC: &str = "x";
const OUTPUT_TIME: &str = "add_67";

/// Which execution providers the session is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// CUDA when the runtime can use it, CPU otherwise.
    #[default]
    Auto,
    Cuda,
    Cpu,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Auto => write!(f, "auto"),
            Device::Cuda => write!(f, "cuda"),
            Device::Cpu => write!(f, "cpu"),
        }
    }
}

fn load_err(e: impl fmt::Display) -> IsolationError {
    IsolationError::ModelLoad(e.to_string())
}

/// Demucs (htdemucs) exported to ONNX, run window by window.
pub struct OnnxSeparator {
    session: Mutex<Session>,
    manifest: ModelManifest,
    stem_names: Vec<String>,
}

impl OnnxSeparator {
    pub fn load(h: &ModelHandle, device: Device) -> Result<Self> {
        info!(
            model = %h.manifest.name,
            version = %h.manifest.version,
            %device,
            "loading separation model"
        );

        let builder = Session::builder()
            .map_err(load_err)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(load_err)?;

        let builder = match device {
            Device::Auto => builder.with_execution_providers([
                CUDAExecutionProvider::default().build(),
                CPUExecutionProvider::default().build(),
            ]),
            Device::Cuda => builder.with_execution_providers([CUDAExecutionProvider::default()
                .build()
                .error_on_failure()]),
            Device::Cpu => {
                builder.with_execution_providers([CPUExecutionProvider::default().build()])
            }
        }
        .map_err(load_err)?;

        let session = builder.commit_from_file(&h.local_path).map_err(load_err)?;

        for name in [INPUT_TIME, INPUT_SPEC] {
            if !session.inputs.iter().any(|i| i.name == name) {
                return Err(IsolationError::ModelLoad(format!(
                    "Model missing input '{name}'"
                )));
            }
        }

        if h.manifest.sample_rate == 0 {
            return Err(IsolationError::Manifest("sample_rate must be positive".into()));
        }

        info!(stems = ?h.manifest.stems, "model loaded");
        Ok(Self {
            session: Mutex::new(session),
            stem_names: h.manifest.stems.clone(),
            manifest: h.manifest.clone(),
        })
    }

    /// Effective hop between windows; falls back to non-overlapping windows
    /// when the manifest value is unusable.
    fn hop(&self) -> usize {
        match self.manifest.hop {
            h if h > 0 && h <= DEMUCS_T => h,
            _ => DEMUCS_T,
        }
    }

    /// One fixed-length window through the network. Returns `[stems, 2, T]`.
    pub fn run_window(&self, left: &[f32], right: &[f32]) -> Result<Array3<f32>> {
        run_window_demucs(&self.session, left, right)
    }
}

/// Checks a window pair before it is handed to the network; returns its length.
pub fn validate_window(left: &[f32], right: &[f32]) -> Result<usize> {
    if left.len() != right.len() {
        return Err(anyhow!("L/R length mismatch").into());
    }
    let t = left.len();
    if t != DEMUCS_T {
        return Err(anyhow!("Bad window length {} (expected {})", t, DEMUCS_T).into());
    }
    Ok(t)
}

pub fn run_window_demucs(
    session: &Mutex<Session>,
    left: &[f32],
    right: &[f32],
) -> Result<Array3<f32>> {
    let t = validate_window(left, right)?;

    // Time branch [1,2,T], planar
    let mut planar = Vec::with_capacity(2 * t);
    planar.extend_from_slice(left);
    planar.extend_from_slice(right);
    let time_value = Tensor::from_array((vec![1, 2, t], planar))?;

    // Spec branch [1,4,F,Frames] with center padding, Hann, 4096/1024
    let (spec_cac, f_bins, frames) = stft_cac_stereo_centered(left, right, DEMUCS_NFFT, DEMUCS_HOP);
    if f_bins != DEMUCS_F || frames != DEMUCS_FRAMES {
        return Err(IsolationError::Inference(format!(
            "Spec dims mismatch: got F={f_bins},Frames={frames}, expected F={DEMUCS_F},Frames={DEMUCS_FRAMES}"
        )));
    }
    let spec_value = Tensor::from_array((vec![1, 4, f_bins, frames], spec_cac))?;

    let mut session = session
        .lock()
        .map_err(|_| IsolationError::Inference("session mutex poisoned".into()))?;

    let outputs = session.run(ort::inputs![
        INPUT_TIME => time_value,
        INPUT_SPEC => spec_value
    ])?;

    // Time-domain stems, shape [1,S,2,T]
    let out_td = outputs.get(OUTPUT_TIME).ok_or_else(|| {
        IsolationError::Inference(format!("Model did not return '{OUTPUT_TIME}' output"))
    })?;
    let (shape, data) = out_td.try_extract_tensor::<f32>()?;
    if shape.len() != 4 || shape[0] != 1 || shape[2] != 2 || shape[3] as usize != t {
        return Err(IsolationError::Inference(format!(
            "Unexpected {OUTPUT_TIME} shape {:?}",
            &shape[..]
        )));
    }
    let stems = shape[1] as usize;
    let out = Array3::from_shape_vec((stems, 2, t), data.to_vec())
        .map_err(|e| IsolationError::Inference(e.to_string()))?;
    Ok(out)
}

impl Separator for OnnxSeparator {
    fn stem_names(&self) -> &[String] {
        &self.stem_names
    }

    fn sample_rate(&self) -> u32 {
        self.manifest.sample_rate
    }

    fn separate(&self, input: &AudioBuffer) -> Result<SeparationResult> {
        if input.num_channels() != MODEL_CHANNELS {
            return Err(IsolationError::Inference(format!(
                "expected {MODEL_CHANNELS} channels, got {}",
                input.num_channels()
            )));
        }
        if input.sample_rate != self.sample_rate() {
            return Err(IsolationError::Inference(format!(
                "expected {} Hz input, got {} Hz",
                self.sample_rate(),
                input.sample_rate
            )));
        }

        let n = input.num_frames();
        if n == 0 {
            return Err(IsolationError::Inference("empty audio".into()));
        }

        let win = DEMUCS_T;
        let hop = self.hop();
        let weights = triangular_window(win);
        let left = input.channel(0);
        let right = input.channel(1);

        let mut left_raw = vec![0f32; win];
        let mut right_raw = vec![0f32; win];
        let mut acc: Option<Array3<f32>> = None;
        let mut weight_sum = vec![0f32; n];

        let total_windows = if n <= win { 1 } else { 1 + (n - win).div_ceil(hop) };
        let mut pos = 0usize;
        let mut done = 0usize;

        loop {
            let len = win.min(n - pos);
            left_raw[..len].copy_from_slice(&left[pos..pos + len]);
            right_raw[..len].copy_from_slice(&right[pos..pos + len]);
            left_raw[len..].fill(0.0);
            right_raw[len..].fill(0.0);

            let out = self.run_window(&left_raw, &right_raw)?;
            let acc = acc.get_or_insert_with(|| Array3::zeros((out.shape()[0], 2, n)));
            if out.shape()[0] != acc.shape()[0] {
                return Err(IsolationError::Inference("stem count changed between windows".into()));
            }

            for i in 0..len {
                let w = weights[i];
                weight_sum[pos + i] += w;
                for st in 0..acc.shape()[0] {
                    for ch in 0..2 {
                        acc[(st, ch, pos + i)] += out[(st, ch, i)] * w;
                    }
                }
            }

            done += 1;
            debug!(window = done, total = total_windows, "separated window");

            if pos + win >= n {
                break;
            }
            pos += hop;
        }

        let mut acc = acc.ok_or_else(|| IsolationError::Inference("no windows processed".into()))?;
        for (i, w) in weight_sum.iter().enumerate() {
            if *w > 0.0 {
                acc.slice_mut(s![.., .., i]).mapv_inplace(|x| x / w);
            }
        }

        let names_fit = self.stem_names.len() == acc.shape()[0];
        let stems = acc
            .axis_iter(Axis(0))
            .enumerate()
            .map(|(i, stem)| Stem {
                name: if names_fit {
                    self.stem_names[i].clone()
                } else {
                    String::new()
                },
                audio: AudioBuffer::new(stem.to_owned(), input.sample_rate),
            })
            .collect();

        Ok(SeparationResult { stems })
    }
}
