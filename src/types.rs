use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Planar audio: a `channels × frames` sample matrix paired with its rate.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    pub samples: Array2<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Array2<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Build a buffer from interleaved frames (`L R L R ...` for stereo).
    pub fn from_interleaved(interleaved: &[f32], channels: usize, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let frames = interleaved.len() / channels;
        let samples = Array2::from_shape_fn((channels, frames), |(c, i)| {
            interleaved[i * channels + c]
        });
        Self::new(samples, sample_rate)
    }

    pub fn num_channels(&self) -> usize {
        self.samples.nrows()
    }

    pub fn num_frames(&self) -> usize {
        self.samples.ncols()
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.num_frames() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, idx: usize) -> Vec<f32> {
        self.samples.index_axis(Axis(0), idx).to_vec()
    }

    pub fn to_interleaved(&self) -> Vec<f32> {
        // Transposed view walks frame-major, which is interleaved order.
        self.samples.t().iter().copied().collect()
    }
}

/// A named source recovered by the separation model.
#[derive(Clone, Debug)]
pub struct Stem {
    pub name: String,
    pub audio: AudioBuffer,
}

/// Every stem the model produced, in the model's own order.
#[derive(Clone, Debug)]
pub struct SeparationResult {
    pub stems: Vec<Stem>,
}

impl SeparationResult {
    pub fn position(&self, name: &str) -> Option<usize> {
        self.stems
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Clone, Debug)]
pub struct IsolationOutcome {
    pub vocals: AudioBuffer,
    pub accompaniment: AudioBuffer,
    pub sample_rate: u32,
}

impl IsolationOutcome {
    pub fn duration_seconds(&self) -> f64 {
        self.vocals.duration_seconds()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub file: String,
    pub url: String,
    pub sha256: String,
    #[serde(default)]
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    pub name: String,
    pub version: String,
    pub backend: String,
    pub sample_rate: u32,
    pub window: usize,
    pub hop: usize,
    pub stems: Vec<String>,
    pub input_layout: String,
    pub output_layout: String,
    pub artifacts: Vec<ModelArtifact>,
}

impl ModelManifest {
    /// The weights file to load: the first `.onnx` artifact, else the first one listed.
    pub fn resolve_primary_artifact(&self) -> std::result::Result<&ModelArtifact, String> {
        if self.artifacts.is_empty() {
            return Err(format!("Manifest `{}` lists no artifacts", self.name));
        }
        let a = self
            .artifacts
            .iter()
            .find(|a| a.file.to_ascii_lowercase().ends_with(".onnx"))
            .unwrap_or(&self.artifacts[0]);
        if a.sha256.len() < 8 {
            return Err(format!("Artifact `{}` has an invalid sha256", a.file));
        }
        Ok(a)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelOptions {
    pub model_name: String,
    pub manifest_url_override: Option<String>,
    pub cache_dir_override: Option<String>,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            model_name: "htdemucs_ort_v1".into(),
            manifest_url_override: None,
            cache_dir_override: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn interleaved_round_trip_keeps_frame_order() {
        let inter = vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        let buf = AudioBuffer::from_interleaved(&inter, 2, 44_100);
        assert_eq!(buf.num_channels(), 2);
        assert_eq!(buf.num_frames(), 3);
        assert_eq!(buf.channel(0), vec![0.1, 0.3, 0.5]);
        assert_eq!(buf.to_interleaved(), inter);
    }

    #[test]
    fn duration_is_frames_over_rate() {
        let buf = AudioBuffer::new(Array2::zeros((2, 22_050)), 44_100);
        assert_eq!(buf.duration_seconds(), 0.5);
    }

    #[test]
    fn primary_artifact_prefers_onnx() {
        let a = |file: &str| ModelArtifact {
            file: file.into(),
            url: format!("http://x/{file}"),
            sha256: "0123456789abcdef".into(),
            size_bytes: 0,
        };
        let mf = ModelManifest {
            name: "m".into(),
            version: "1".into(),
            backend: "onnx".into(),
            sample_rate: 44_100,
            window: 10,
            hop: 5,
            stems: vec![],
            input_layout: "BCT".into(),
            output_layout: "BSCT".into(),
            artifacts: vec![a("readme.txt"), a("model.ONNX")],
        };
        assert_eq!(mf.resolve_primary_artifact().unwrap().file, "model.ONNX");
    }

    #[test]
    fn stem_lookup_ignores_case() {
        let stem = |name: &str| Stem {
            name: name.into(),
            audio: AudioBuffer::new(array![[0.0f32]], 44_100),
        };
        let res = SeparationResult {
            stems: vec![stem("drums"), stem("Vocals")],
        };
        assert_eq!(res.position("vocals"), Some(1));
        assert_eq!(res.position("bass"), None);
    }
}
