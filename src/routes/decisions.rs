//! Decision endpoints (authenticated key)
//!
//! - `GET /decisions/{id}`
//! - `PUT /decisions/{id}` with `{ "decision": "...", "primaryWalletAddress": "..." }`

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;

use super::{error_response, json_response};
use crate::decisions::{parse_identity, DecisionRequest};
use crate::server::AppState;
use crate::types::PodiumError;

/// Largest accepted request body
const MAX_BODY_BYTES: usize = 16 * 1024;

pub async fn handle_get_decision(state: Arc<AppState>, raw_id: &str) -> Response<Full<Bytes>> {
    let identity = match parse_identity(raw_id) {
        Ok(id) => id,
        Err(e) => return error_response(e),
    };

    match state.podium.decision(identity).await {
        Ok(record) => json_response(StatusCode::OK, &record),
        Err(e) => error_response(e),
    }
}

pub async fn handle_put_decision(
    state: Arc<AppState>,
    req: Request<Incoming>,
    raw_id: &str,
) -> Response<Full<Bytes>> {
    let identity = match parse_identity(raw_id) {
        Ok(id) => id,
        Err(e) => return error_response(e),
    };

    let body_bytes = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
        Ok(b) => b.to_bytes(),
        Err(e) => {
            return error_response(PodiumError::Validation(format!("unreadable request body: {}", e)))
        }
    };

    let request = match parse_body(&body_bytes) {
        Ok(r) => r,
        Err(e) => return error_response(e),
    };

    match state.podium.submit_decision(identity, request).await {
        Ok(record) => json_response(StatusCode::OK, &record),
        Err(e) => error_response(e),
    }
}

/// Decode a PUT body; malformed JSON is the caller's fault
fn parse_body(bytes: &[u8]) -> Result<DecisionRequest, PodiumError> {
    serde_json::from_slice(bytes).map_err(|e| PodiumError::Validation(format!("invalid request body: {}", e)))
}
