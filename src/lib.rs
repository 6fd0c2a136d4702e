//! # voice-isolation
//!
//! Splits audio into a vocal stem and an accompaniment stem with a
//! pretrained source-separation model, and serves that over HTTP as
//! base64 WAV in, base64 WAV out.

pub mod core;
pub mod error;
pub mod io;
pub mod model;
pub mod service;
pub mod types;

pub use crate::{
    core::{
        audio::{decode_audio, decode_base64, encode_base64, encode_wav, encode_wav_base64},
        dsp::normalize,
        engine::{Device, OnnxSeparator},
        isolator::{EncodedIsolation, IsolationService, IsolationSettings},
        separator::{mix_down, Separator},
    },
    error::{IsolationError, Result},
    io::progress::set_download_progress_callback,
    model::{
        model_manager::{ensure_model, ensure_model_with, ModelHandle},
        registry::resolve_manifest_url,
    },
    types::{AudioBuffer, IsolationOutcome, ModelManifest, ModelOptions, SeparationResult, Stem},
};

/// Download and verify the model weights, then build a session from them,
/// so the first request does not pay for it.
pub fn prepare_model(opts: &ModelOptions, device: Device) -> Result<ModelHandle> {
    let handle = ensure_model_with(opts)?;
    OnnxSeparator::load(&handle, device)?;
    Ok(handle)
}
