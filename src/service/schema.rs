use serde::{Deserialize, Serialize};

use crate::{
    core::isolator::EncodedIsolation,
    error::{IsolationError, Result},
};

pub const MISSING_AUDIO: &str = "audio_base64 is required";

/// Body of `POST /isolate`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IsolateRequest {
    #[serde(default)]
    pub audio_base64: Option<String>,
    /// `null` and absent both mean `false`.
    #[serde(default)]
    pub return_accompaniment: Option<bool>,
}

impl IsolateRequest {
    /// Parse a raw body. Malformed JSON and wrong field types are
    /// validation failures, not transport errors.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body)
            .map_err(|e| IsolationError::Validation(format!("invalid request body: {e}")))
    }

    /// The audio payload, rejecting an absent or empty field.
    pub fn audio(&self) -> Result<&str> {
        match self.audio_base64.as_deref() {
            Some(a) if !a.trim().is_empty() => Ok(a),
            _ => Err(IsolationError::Validation(MISSING_AUDIO.into())),
        }
    }

    pub fn wants_accompaniment(&self) -> bool {
        self.return_accompaniment.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IsolateSuccess {
    pub success: bool,
    pub vocals_base64: String,
    pub sample_rate: u32,
    pub duration_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub accompaniment_base64: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IsolateFailure {
    pub success: bool,
    pub error: String,
}

/// Every request gets one of these back with HTTP 200; callers branch on
/// `success`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum IsolateResponse {
    Success(IsolateSuccess),
    Failure(IsolateFailure),
}

impl IsolateResponse {
    pub fn failure(error: impl Into<String>) -> Self {
        IsolateResponse::Failure(IsolateFailure {
            success: false,
            error: error.into(),
        })
    }
}

impl From<EncodedIsolation> for IsolateResponse {
    fn from(out: EncodedIsolation) -> Self {
        IsolateResponse::Success(IsolateSuccess {
            success: true,
            vocals_base64: out.vocals_base64,
            sample_rate: out.sample_rate,
            duration_seconds: out.duration_seconds,
            accompaniment_base64: out.accompaniment_base64,
        })
    }
}

impl From<IsolationError> for IsolateResponse {
    fn from(err: IsolationError) -> Self {
        IsolateResponse::failure(err.to_string())
    }
}

impl From<Result<EncodedIsolation>> for IsolateResponse {
    fn from(res: Result<EncodedIsolation>) -> Self {
        match res {
            Ok(out) => out.into(),
            Err(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_audio_is_reported_verbatim() {
        let req = IsolateRequest::from_slice(br#"{"return_accompaniment": true}"#).unwrap();
        let resp: IsolateResponse = req.audio().unwrap_err().into();
        assert_eq!(
            serde_json::to_value(resp).unwrap(),
            json!({"success": false, "error": "audio_base64 is required"})
        );
    }

    #[test]
    fn empty_audio_counts_as_missing() {
        let req = IsolateRequest::from_slice(br#"{"audio_base64": ""}"#).unwrap();
        assert_eq!(req.audio().unwrap_err().to_string(), MISSING_AUDIO);
    }

    #[test]
    fn accompaniment_defaults_to_false() {
        let req = IsolateRequest::from_slice(br#"{"audio_base64": "AAAA"}"#).unwrap();
        assert!(!req.wants_accompaniment());
        assert_eq!(req.audio().unwrap(), "AAAA");
    }

    #[test]
    fn null_accompaniment_flag_means_false() {
        let req =
            IsolateRequest::from_slice(br#"{"audio_base64": "AAAA", "return_accompaniment": null}"#)
                .unwrap();
        assert!(!req.wants_accompaniment());
    }

    #[test]
    fn wrong_field_type_is_a_validation_error() {
        let err = IsolateRequest::from_slice(br#"{"audio_base64": 12}"#).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn success_omits_absent_accompaniment() {
        let resp: IsolateResponse = EncodedIsolation {
            vocals_base64: "UklG".into(),
            accompaniment_base64: None,
            sample_rate: 44_100,
            duration_seconds: 2.0,
        }
        .into();
        let v = serde_json::to_value(resp).unwrap();
        assert_eq!(v, json!({
                "success": true,
                "vocals_base64": "UklG",
                "sample_rate": 44_100,
                "duration_seconds": 2.0
            }));
    }
}
