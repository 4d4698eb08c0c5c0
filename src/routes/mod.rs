//! HTTP routes for Podium

pub mod admin;
pub mod decisions;
pub mod health;
pub mod leaderboard;

pub use admin::{handle_create_snapshot, handle_refresh_scores};
pub use decisions::{handle_get_decision, handle_put_decision};
pub use health::health_check;
pub use leaderboard::{handle_leaderboard, handle_snapshot, handle_standing};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{header, Response, StatusCode};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, error, warn};

use crate::types::PodiumError;

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: &'static str,
    pub retryable: bool,
}

/// Build a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(body) {
        Ok(data) => build(status, data),
        Err(e) => {
            error!(error = %e, "Failed to serialize response body");
            build(
                StatusCode::INTERNAL_SERVER_ERROR,
                br#"{"error":"Internal error","code":"INTERNAL_ERROR","retryable":false}"#.to_vec(),
            )
        }
    }
}

/// ETag of a response body (SHA-256, quoted)
pub fn etag_for(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("\"{}\"", hex::encode(&hash[..16]))
}

/// Whether an `If-None-Match` value names `etag`
fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    if_none_match
        .split(',')
        .map(|candidate| candidate.trim().trim_start_matches("W/"))
        .any(|candidate| candidate == "*" || candidate == etag)
}

/// 200 JSON response carrying an ETag, or `304 Not Modified` if the client
/// already holds that body
pub fn etag_response<T: Serialize>(body: &T, if_none_match: Option<&str>) -> Response<Full<Bytes>> {
    let data = match serde_json::to_vec(body) {
        Ok(data) => data,
        Err(e) => return error_response(PodiumError::Internal(format!("failed to serialize response: {}", e))),
    };
    let etag = etag_for(&data);

    if let Some(candidates) = if_none_match {
        if etag_matches(candidates, &etag) {
            debug!(etag = %etag, "ETag match, returning 304");
            return Response::builder()
                .status(StatusCode::NOT_MODIFIED)
                .header(header::ETAG, &etag)
                .header(header::CACHE_CONTROL, "no-cache")
                .header("Access-Control-Allow-Origin", "*")
                .body(Full::new(Bytes::new()))
                .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())));
        }
    }

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::ETAG, &etag)
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(data)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from_static(br#"{"error":"Internal error"}"#))))
}

/// Map an error to its status code and JSON body
pub fn error_response(err: PodiumError) -> Response<Full<Bytes>> {
    let status = err.status_code();
    if status.is_server_error() {
        warn!(code = err.code(), error = %err, "Request failed");
    }
    let body = ApiError {
        code: err.code(),
        retryable: err.is_retryable(),
        error: err.to_string(),
    };
    json_response(status, &body)
}

fn build(status: StatusCode, data: Vec<u8>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Cache-Control", "no-store")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(data)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from_static(br#"{"error":"Internal error"}"#))))
}
