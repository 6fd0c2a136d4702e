use crate::{
    core::{
        audio::{decode_audio, decode_base64, encode_wav_base64},
        dsp::{normalize, DEFAULT_RESAMPLE_CHUNK},
        engine::{Device, OnnxSeparator},
        separator::{mix_down, Separator, VOCALS},
    },
    error::{IsolationError, Result},
    model::model_manager::ensure_model_with,
    types::{AudioBuffer, IsolationOutcome, ModelOptions},
};

use once_cell::sync::OnceCell;
use std::{sync::Arc, time::Instant};
use tracing::{debug, info};

type SeparatorLoader = Box<dyn Fn() -> Result<Arc<dyn Separator>> + Send + Sync>;

#[derive(Clone, Debug)]
pub struct IsolationSettings {
    /// Name of the stem returned as vocals.
    pub vocals_stem: String,
    /// Resampler input chunk, in frames.
    pub resample_chunk: usize,
}

impl Default for IsolationSettings {
    fn default() -> Self {
        Self {
            vocals_stem: VOCALS.into(),
            resample_chunk: DEFAULT_RESAMPLE_CHUNK,
        }
    }
}

/// Vocals (and optionally accompaniment) as base64 WAV.
#[derive(Clone, Debug)]
pub struct EncodedIsolation {
    pub vocals_base64: String,
    pub accompaniment_base64: Option<String>,
    pub sample_rate: u32,
    pub duration_seconds: f64,
}

/// Decode → normalize → separate → mix down → encode, sharing one model
/// across every call.
///
/// The model is created at most once per service. Concurrent callers that
/// race on the first load block until it finishes and then reuse it.
pub struct IsolationService {
    loader: SeparatorLoader,
    model: OnceCell<Arc<dyn Separator>>,
    settings: IsolationSettings,
}

impl IsolationService {
    pub fn new<F>(settings: IsolationSettings, loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Separator>> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            model: OnceCell::new(),
            settings,
        }
    }

    /// A service around an already-constructed separator.
    pub fn with_separator(settings: IsolationSettings, separator: Arc<dyn Separator>) -> Self {
        let svc = Self::new(settings, || {
            Err(IsolationError::ModelLoad("separator already provided".into()))
        });
        let _ = svc.model.set(separator);
        svc
    }

    /// A service whose model is fetched through the registry/cache and run
    /// with ONNX Runtime.
    pub fn onnx(settings: IsolationSettings, opts: ModelOptions, device: Device) -> Self {
        Self::new(settings, move || {
            let handle = ensure_model_with(&opts)?;
            let sep = OnnxSeparator::load(&handle, device)?;
            Ok(Arc::new(sep) as Arc<dyn Separator>)
        })
    }

    pub fn settings(&self) -> &IsolationSettings {
        &self.settings
    }

    pub fn is_ready(&self) -> bool {
        self.model.get().is_some()
    }

    /// Loaded separator, if the model is up.
    pub fn loaded(&self) -> Option<&Arc<dyn Separator>> {
        self.model.get()
    }

    /// Load the model now instead of on the first request.
    pub fn warm_up(&self) -> Result<()> {
        let started = Instant::now();
        let already = self.is_ready();
        self.separator()?;
        if !already {
            info!(elapsed_ms = started.elapsed().as_millis() as u64, "model ready");
        }
        Ok(())
    }

    pub fn separator(&self) -> Result<&Arc<dyn Separator>> {
        self.model.get_or_try_init(|| {
            info!("initializing separation model");
            (self.loader)()
        })
    }

    /// Run the separation pipeline on an already-decoded buffer.
    pub fn isolate_audio(&self, audio: AudioBuffer) -> Result<IsolationOutcome> {
        let separator = self.separator()?;

        let normalized = normalize(audio, separator.sample_rate(), self.settings.resample_chunk)?;
        debug!(
            frames = normalized.num_frames(),
            sample_rate = normalized.sample_rate,
            "normalized input"
        );

        let started = Instant::now();
        let result = separator.separate(&normalized)?;
        debug!(
            stems = result.stems.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "separation finished"
        );

        mix_down(result, &normalized, &self.settings.vocals_stem)
    }

    pub fn isolate_bytes(&self, bytes: Vec<u8>) -> Result<IsolationOutcome> {
        let audio = decode_audio(bytes)?;
        self.isolate_audio(audio)
    }

    /// Full request path: base64 audio in, base64 WAV stems out.
    pub fn isolate_base64(&self, payload: &str, with_accompaniment: bool) -> Result<EncodedIsolation> {
        let bytes = decode_base64(payload)?;
        let outcome = self.isolate_bytes(bytes)?;

        let vocals_base64 = encode_wav_base64(&outcome.vocals)?;
        let accompaniment_base64 = if with_accompaniment {
            Some(encode_wav_base64(&outcome.accompaniment)?)
        } else {
            None
        };

        Ok(EncodedIsolation {
            vocals_base64,
            accompaniment_base64,
            sample_rate: outcome.sample_rate,
            duration_seconds: outcome.duration_seconds(),
        })
    }
}
