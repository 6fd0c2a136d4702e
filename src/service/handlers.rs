use actix_web::{web, HttpResponse};
use serde_json::json;
use std::time::Instant;
use tracing::{info, warn};

use crate::{
    core::isolator::EncodedIsolation,
    error::{IsolationError, Result},
    service::{
        schema::{IsolateRequest, IsolateResponse},
        AppState,
    },
};

/// `POST /` and `POST /isolate`.
///
/// Always answers 200; failures are carried in the body as
/// `{"success": false, "error": ...}`, including bodies over the size limit.
pub async fn isolate(state: web::Data<AppState>, payload: web::Payload) -> HttpResponse {
    let started = Instant::now();
    let elapsed_ms = || started.elapsed().as_millis() as u64;

    let result = match read_body(payload, state.payload_limit).await {
        Ok(body) => run_isolation(&state, &body).await,
        Err(err) => Err(err),
    };

    match &result {
        Ok(out) => info!(
            duration_seconds = out.duration_seconds,
            with_accompaniment = out.accompaniment_base64.is_some(),
            elapsed_ms = elapsed_ms(),
            "isolation succeeded"
        ),
        Err(err) => warn!(
            kind = err.kind(),
            error = %err,
            elapsed_ms = elapsed_ms(),
            "isolation failed"
        ),
    }

    HttpResponse::Ok().json(IsolateResponse::from(result))
}

async fn read_body(payload: web::Payload, limit: usize) -> Result<web::Bytes> {
    match payload.to_bytes_limited(limit).await {
        Ok(Ok(body)) => Ok(body),
        Ok(Err(e)) => Err(IsolationError::Validation(format!(
            "failed to read request body: {e}"
        ))),
        Err(_) => Err(IsolationError::Validation(format!(
            "request body exceeds the {limit} byte limit"
        ))),
    }
}

async fn run_isolation(state: &AppState, body: &[u8]) -> Result<EncodedIsolation> {
    let request = IsolateRequest::from_slice(body)?;
    let audio = request.audio()?.to_owned();
    let with_accompaniment = request.wants_accompaniment();

    let service = state.service.clone();
    let job = web::block(move || service.isolate_base64(&audio, with_accompaniment));

    let joined = match state.inference_timeout {
        Some(limit) => tokio::time::timeout(limit, job)
            .await
            .map_err(|_| IsolationError::Timeout {
                secs: limit.as_secs(),
            })?,
        None => job.await,
    };

    joined.map_err(|e| IsolationError::Inference(format!("worker failed: {e}")))?
}

/// `GET /health`: 200 once the model is loaded, 503 before.
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    match state.service.loaded() {
        Some(sep) => HttpResponse::Ok().json(json!({
            "status": "ready",
            "model": state.model_name,
            "sample_rate": sep.sample_rate(),
            "stems": sep.stem_names(),
        })),
        None => HttpResponse::ServiceUnavailable().json(json!({
            "status": "loading",
            "model": state.model_name,
        })),
    }
}
